//! Durable data model plus engine tuning knobs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted status of a supervised process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Stopped,
    Running,
    /// Spawn-time failure (missing binary, permission denied) or exhausted
    /// respawn attempts. Never set by a crash that auto-restart handles.
    Error,
}

impl Default for ProcessStatus {
    fn default() -> Self {
        Self::Stopped
    }
}

/// Durable configuration of one auxiliary worker process, owned by a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Unique within the owning project
    pub name: String,
    /// argv0 plus arguments, whitespace-separated (no shell)
    pub command: String,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Start this process when the daemon boots the project
    #[serde(default)]
    pub autostart: bool,
    /// Relaunch the whole group after a crash
    #[serde(default)]
    pub autorestart: bool,
    #[serde(default = "default_instance_count")]
    pub instance_count: u32,
    #[serde(default)]
    pub status: ProcessStatus,
    /// Last known PID of instance 0
    #[serde(default)]
    pub pid: Option<u32>,
    /// Unix timestamp (seconds) of the last successful start
    #[serde(default)]
    pub started_at: Option<u64>,
}

fn default_instance_count() -> u32 {
    1
}

impl ProcessConfig {
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            working_directory: None,
            environment: HashMap::new(),
            autostart: false,
            autorestart: false,
            instance_count: 1,
            status: ProcessStatus::Stopped,
            pid: None,
            started_at: None,
        }
    }
}

/// A development project that owns worker processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Project-level environment, applied to every process (the process's
    /// own environment wins on key conflicts)
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub processes: Vec<ProcessConfig>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            environment: HashMap::new(),
            processes: Vec::new(),
        }
    }
}

// ─── Engine settings ─────────────────────────────────────────

/// Engine tuning knobs, loadable from `config/global.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSettings {
    /// Fixed delay before an auto-restart respawn
    #[serde(default = "default_backoff_ms")]
    pub restart_backoff_ms: u64,
    /// Debounce between the stop and start halves of an explicit restart
    #[serde(default = "default_debounce_ms")]
    pub restart_debounce_ms: u64,
    /// Ceiling on consecutive failed respawn attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_restart_attempts: u32,
    /// Send SIGKILL instead of SIGTERM when stopping
    #[serde(default)]
    pub force_stop: bool,
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            restart_backoff_ms: default_backoff_ms(),
            restart_debounce_ms: default_debounce_ms(),
            max_restart_attempts: default_max_attempts(),
            force_stop: false,
        }
    }
}

impl SupervisorSettings {
    /// Load settings from `config/global.toml`, falling back to defaults
    /// when the file is missing or malformed.
    pub fn load() -> Self {
        let s = std::fs::read_to_string("config/global.toml").unwrap_or_default();
        match toml::from_str::<Self>(&s) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("Invalid config/global.toml ({}), using defaults", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_config_defaults() {
        let cfg = ProcessConfig::new("queue-worker", "php artisan queue:work");
        assert_eq!(cfg.instance_count, 1);
        assert_eq!(cfg.status, ProcessStatus::Stopped);
        assert!(!cfg.autorestart);
        assert!(cfg.pid.is_none());
    }

    #[test]
    fn test_process_config_deserializes_sparse_json() {
        // only name + command present; everything else defaulted
        let cfg: ProcessConfig =
            serde_json::from_str(r#"{"name":"w","command":"run-worker"}"#).unwrap();
        assert_eq!(cfg.instance_count, 1);
        assert_eq!(cfg.status, ProcessStatus::Stopped);
        assert!(cfg.environment.is_empty());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProcessStatus::Running).unwrap(),
            r#""running""#
        );
    }

    #[test]
    fn test_settings_defaults() {
        let settings = SupervisorSettings::default();
        assert_eq!(settings.restart_backoff_ms, 1_000);
        assert_eq!(settings.max_restart_attempts, 5);
        assert!(!settings.force_stop);
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: SupervisorSettings =
            toml::from_str("restart_backoff_ms = 50\nforce_stop = true").unwrap();
        assert_eq!(settings.restart_backoff_ms, 50);
        assert!(settings.force_stop);
        // unspecified keys keep their defaults
        assert_eq!(settings.restart_debounce_ms, 250);
    }

    #[test]
    fn test_project_ids_are_unique() {
        let a = Project::new("site-a");
        let b = Project::new("site-a");
        assert_ne!(a.id, b.id);
    }
}
