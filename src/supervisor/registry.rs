//! In-memory table of live process groups.
//!
//! Purely ephemeral: rebuilt empty whenever the engine restarts, destroyed
//! entries are gone for good. The registry is injected into the supervisor
//! rather than being a module-level singleton, so independent supervisors
//! can coexist (one per test, for instance).

use crate::supervisor::state_machine::StateMachine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Flags shared between a group and the exit monitors of its instances.
#[derive(Debug, Default)]
pub struct GroupFlags {
    stopping: AtomicBool,
    exit_claimed: AtomicBool,
}

impl GroupFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the group as intentionally stopping; subsequent instance exits
    /// are clean and must not trigger the restart policy.
    pub fn mark_stopping(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// First caller wins; sibling exit monitors after a crash get `false`
    /// so only one restart is ever scheduled per group.
    pub fn claim_exit(&self) -> bool {
        !self.exit_claimed.swap(true, Ordering::SeqCst)
    }
}

/// One live OS process within a group.
pub struct InstanceHandle {
    pub instance_name: String,
    pub pid: u32,
    pub exit_watch: watch::Receiver<bool>,
}

/// The live instances spawned for one `ProcessConfig`.
pub struct RunningGroup {
    pub name: String,
    /// Unix timestamp (seconds) of the spawn
    pub started_at: u64,
    pub instances: Vec<InstanceHandle>,
    pub flags: Arc<GroupFlags>,
    pub state: StateMachine,
}

/// Read-only view of a group for status reporting.
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
    pub instance_count: u32,
    pub started_at: u64,
    pub pids: Vec<u32>,
}

/// project id → process name → live group.
pub struct ProcessGroupRegistry {
    groups: Mutex<HashMap<String, HashMap<String, RunningGroup>>>,
}

impl ProcessGroupRegistry {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Register a group under (project, name). Replacing a live entry is a
    /// supervisor bug; it is logged rather than panicked on.
    pub async fn set(&self, project_id: &str, group: RunningGroup) {
        let mut groups = self.groups.lock().await;
        let by_name = groups.entry(project_id.to_string()).or_default();
        if by_name.insert(group.name.clone(), group).is_some() {
            tracing::warn!("Replaced a live process group that was still registered");
        }
    }

    pub async fn contains(&self, project_id: &str, name: &str) -> bool {
        let groups = self.groups.lock().await;
        groups
            .get(project_id)
            .map_or(false, |by_name| by_name.contains_key(name))
    }

    pub async fn remove(&self, project_id: &str, name: &str) -> Option<RunningGroup> {
        let mut groups = self.groups.lock().await;
        let by_name = groups.get_mut(project_id)?;
        let group = by_name.remove(name);
        if by_name.is_empty() {
            groups.remove(project_id);
        }
        group
    }

    pub async fn snapshot(&self, project_id: &str, name: &str) -> Option<GroupSnapshot> {
        let groups = self.groups.lock().await;
        let group = groups.get(project_id)?.get(name)?;
        Some(GroupSnapshot {
            instance_count: group.instances.len() as u32,
            started_at: group.started_at,
            pids: group.instances.iter().map(|i| i.pid).collect(),
        })
    }

    pub async fn list_names(&self, project_id: &str) -> Vec<String> {
        let groups = self.groups.lock().await;
        groups
            .get(project_id)
            .map(|by_name| by_name.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for ProcessGroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}
