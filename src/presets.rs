//! Named process presets.
//!
//! Thin `ProcessConfig` factories for the common auxiliary workers of a
//! web project. They add no engine behavior; callers pass the result to
//! `Supervisor::add_process` and tweak fields as needed.

use crate::config::ProcessConfig;

/// Queue worker: long-running job consumer, relaunched on crash.
pub fn queue_worker(name: &str) -> ProcessConfig {
    let mut cfg = ProcessConfig::new(name, "php artisan queue:work");
    cfg.autorestart = true;
    cfg
}

/// Scheduled-task runner: keeps the project's scheduler loop alive.
pub fn scheduler(name: &str) -> ProcessConfig {
    let mut cfg = ProcessConfig::new(name, "php artisan schedule:work");
    cfg.autorestart = true;
    cfg
}
