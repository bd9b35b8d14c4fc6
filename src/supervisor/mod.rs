//! The supervision engine.
//!
//! Orchestrates add/remove/start/stop/restart of auxiliary worker
//! processes, owns the auto-restart policy and aggregates status from the
//! in-memory registry and the persisted configs. All platform specifics
//! live behind the [`spawner::ProcessSpawner`] and
//! [`terminate::ProcessTerminator`] seams.

pub mod error;
pub mod output;
pub mod registry;
pub mod spawner;
pub mod state_machine;
pub mod terminate;

use crate::config::{ProcessConfig, ProcessStatus, SupervisorSettings};
use crate::store::ConfigStore;
use crate::utils;
use error::SupervisorError;
use output::{LogSink, OutputRouter, StreamKind};
use registry::{GroupFlags, InstanceHandle, ProcessGroupRegistry, RunningGroup};
use serde::Serialize;
use spawner::{NativeSpawner, ProcessSpawner, SpawnRequest};
use state_machine::{State, StateMachine};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use terminate::{ProcessTerminator, TreeKiller};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

/// Result of a stop request. `was_running` is `false` when there was
/// nothing to stop; that is not an error.
#[derive(Debug, Clone, Serialize)]
pub struct StopOutcome {
    pub was_running: bool,
    pub instances_stopped: usize,
}

/// Persisted config merged with live registry state.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOverview {
    #[serde(flatten)]
    pub config: ProcessConfig,
    pub is_running: bool,
    /// Live instance count (0 when not running)
    pub live_instance_count: u32,
    pub uptime_secs: Option<u64>,
}

/// Point-in-time status of one process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatusSnapshot {
    pub status: ProcessStatus,
    pub is_running: bool,
    /// Live instance count (0 when not running)
    pub instance_count: u32,
    pub uptime_secs: Option<u64>,
    pub pids: Vec<u32>,
}

type Key = (String, String);

pub struct Supervisor {
    /// Handle to our own Arc, for the detached exit-monitor and restart
    /// tasks. Set once by `with_components` via `Arc::new_cyclic`.
    self_ref: std::sync::Weak<Supervisor>,
    store: Arc<dyn ConfigStore>,
    spawner: Arc<dyn ProcessSpawner>,
    terminator: Arc<dyn ProcessTerminator>,
    registry: Arc<ProcessGroupRegistry>,
    router: OutputRouter,
    settings: SupervisorSettings,
    /// Cancellable scheduled auto-restarts, one at most per key.
    pending_restarts: Mutex<HashMap<Key, CancellationToken>>,
    /// Per-(project, name) locks serializing start/stop/restart/remove.
    op_locks: Mutex<HashMap<Key, Arc<Mutex<()>>>>,
}

impl Supervisor {
    /// Build an engine with the native platform spawner and terminator.
    /// Must be called from within a tokio runtime (the output router
    /// spawns its drain task immediately).
    pub fn new(
        store: Arc<dyn ConfigStore>,
        sink: Arc<dyn LogSink>,
        settings: SupervisorSettings,
    ) -> Arc<Self> {
        Self::with_components(
            store,
            Arc::new(NativeSpawner),
            Arc::new(TreeKiller),
            Arc::new(ProcessGroupRegistry::new()),
            sink,
            settings,
        )
    }

    pub fn with_components(
        store: Arc<dyn ConfigStore>,
        spawner: Arc<dyn ProcessSpawner>,
        terminator: Arc<dyn ProcessTerminator>,
        registry: Arc<ProcessGroupRegistry>,
        sink: Arc<dyn LogSink>,
        settings: SupervisorSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            store,
            spawner,
            terminator,
            registry,
            router: OutputRouter::new(sink),
            settings,
            pending_restarts: Mutex::new(HashMap::new()),
            op_locks: Mutex::new(HashMap::new()),
        })
    }

    // ─── Operations ──────────────────────────────────────────

    /// Validate and persist a new process config for a project.
    pub fn add_process(
        &self,
        project_id: &str,
        config: ProcessConfig,
    ) -> Result<ProcessConfig, SupervisorError> {
        if config.name.trim().is_empty() {
            return Err(SupervisorError::Validation(
                "process name must not be empty".into(),
            ));
        }
        if config.instance_count < 1 {
            return Err(SupervisorError::Validation(format!(
                "instance_count must be at least 1, got {}",
                config.instance_count
            )));
        }

        let project = self.store.get_project(project_id)?;
        if project.processes.iter().any(|c| c.name == config.name) {
            return Err(SupervisorError::Validation(format!(
                "a process named '{}' already exists",
                config.name
            )));
        }

        // runtime fields are engine-owned; never trust caller-supplied ones
        let mut stored = config;
        stored.status = ProcessStatus::Stopped;
        stored.pid = None;
        stored.started_at = None;

        let mut processes = project.processes;
        processes.push(stored.clone());
        self.store.save_processes(project_id, processes)?;
        tracing::info!("Added process '{}' to project {}", stored.name, project_id);
        Ok(stored)
    }

    /// Stop (idempotently) and delete a process config. The absence of the
    /// named process is not an error; an unknown project is.
    pub async fn remove_process(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<(), SupervisorError> {
        let guard = self.lock_key(project_id, name).await;
        self.stop_locked(project_id, name).await?;

        let project = self.store.get_project(project_id)?;
        let processes: Vec<ProcessConfig> = project
            .processes
            .into_iter()
            .filter(|c| c.name != name)
            .collect();
        self.store.save_processes(project_id, processes)?;
        tracing::info!("Removed process '{}' from project {}", name, project_id);

        drop(guard);
        self.prune_key_lock(project_id, name).await;
        Ok(())
    }

    /// Start a process by name; returns the number of instances started.
    pub async fn start_process(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<usize, SupervisorError> {
        let _guard = self.lock_key(project_id, name).await;
        self.cancel_pending(project_id, name).await;

        let project = self.store.get_project(project_id)?;
        let cfg = project
            .processes
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| SupervisorError::ConfigNotFound(name.to_string()))?;
        self.start_locked(project_id, &project.environment, &cfg).await
    }

    /// Start from a caller-supplied config instead of a name lookup.
    pub async fn start_process_config(
        &self,
        project_id: &str,
        cfg: ProcessConfig,
    ) -> Result<usize, SupervisorError> {
        let _guard = self.lock_key(project_id, &cfg.name).await;
        self.cancel_pending(project_id, &cfg.name).await;

        let project = self.store.get_project(project_id)?;
        self.start_locked(project_id, &project.environment, &cfg).await
    }

    /// Stop a process. Idempotent: stopping something that is not running
    /// returns `was_running: false` and never errors.
    pub async fn stop_process(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<StopOutcome, SupervisorError> {
        let _guard = self.lock_key(project_id, name).await;
        self.stop_locked(project_id, name).await
    }

    /// Stop then start after a short debounce, from the persisted config.
    pub async fn restart_process(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<usize, SupervisorError> {
        let _guard = self.lock_key(project_id, name).await;
        self.stop_locked(project_id, name).await?;
        tokio::time::sleep(Duration::from_millis(self.settings.restart_debounce_ms)).await;

        let project = self.store.get_project(project_id)?;
        let cfg = project
            .processes
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| SupervisorError::ConfigNotFound(name.to_string()))?;
        self.start_locked(project_id, &project.environment, &cfg).await
    }

    /// Stop every tracked group (and pending restart) of a project.
    /// Returns the number of processes that were actually running.
    pub async fn stop_all_processes(
        &self,
        project_id: &str,
    ) -> Result<usize, SupervisorError> {
        let mut names = self.registry.list_names(project_id).await;
        {
            let pending = self.pending_restarts.lock().await;
            for (project, name) in pending.keys() {
                if project == project_id && !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }

        let mut stopped = 0;
        for name in names {
            if self.stop_process(project_id, &name).await?.was_running {
                stopped += 1;
            }
        }
        tracing::info!("Stopped {} process group(s) for project {}", stopped, project_id);
        Ok(stopped)
    }

    /// All persisted configs merged with live registry state.
    pub async fn get_processes(
        &self,
        project_id: &str,
    ) -> Result<Vec<ProcessOverview>, SupervisorError> {
        let project = self.store.get_project(project_id)?;
        let now = utils::current_timestamp();
        let mut out = Vec::with_capacity(project.processes.len());
        for cfg in project.processes {
            let snap = self.registry.snapshot(project_id, &cfg.name).await;
            out.push(ProcessOverview {
                is_running: snap.is_some(),
                live_instance_count: snap.as_ref().map_or(0, |s| s.instance_count),
                uptime_secs: snap.as_ref().map(|s| now.saturating_sub(s.started_at)),
                config: cfg,
            });
        }
        Ok(out)
    }

    /// Point-in-time status for one process.
    pub async fn get_process_status(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<ProcessStatusSnapshot, SupervisorError> {
        let project = self.store.get_project(project_id)?;
        let cfg = project
            .processes
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SupervisorError::ConfigNotFound(name.to_string()))?;

        let snap = self.registry.snapshot(project_id, name).await;
        let now = utils::current_timestamp();
        Ok(ProcessStatusSnapshot {
            status: cfg.status,
            is_running: snap.is_some(),
            instance_count: snap.as_ref().map_or(0, |s| s.instance_count),
            uptime_secs: snap.as_ref().map(|s| now.saturating_sub(s.started_at)),
            pids: snap.map(|s| s.pids).unwrap_or_default(),
        })
    }

    // ─── Internals ───────────────────────────────────────────

    async fn lock_key(&self, project_id: &str, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.op_locks.lock().await;
            locks
                .entry((project_id.to_string(), name.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Forget the per-key lock of a removed process. Only prunes when no
    /// other task holds a clone, so a concurrent operation keeps its lock.
    async fn prune_key_lock(&self, project_id: &str, name: &str) {
        let mut locks = self.op_locks.lock().await;
        let key = (project_id.to_string(), name.to_string());
        if locks.get(&key).map_or(false, |l| Arc::strong_count(l) == 1) {
            locks.remove(&key);
        }
    }

    /// Cancel a scheduled auto-restart, if any. Returns whether one existed.
    async fn cancel_pending(&self, project_id: &str, name: &str) -> bool {
        let mut pending = self.pending_restarts.lock().await;
        if let Some(token) = pending.remove(&(project_id.to_string(), name.to_string())) {
            token.cancel();
            tracing::info!("Cancelled pending restart of '{}'", name);
            true
        } else {
            false
        }
    }

    /// Start half, assuming the key lock is held.
    async fn start_locked(
        &self,
        project_id: &str,
        project_env: &HashMap<String, String>,
        cfg: &ProcessConfig,
    ) -> Result<usize, SupervisorError> {
        if self.registry.contains(project_id, &cfg.name).await {
            return Err(SupervisorError::AlreadyRunning(cfg.name.clone()));
        }
        match self.spawn_group(project_id, project_env, cfg).await {
            Ok(count) => Ok(count),
            Err(e) => {
                // never started: distinct error status, no auto-restart
                if matches!(e, SupervisorError::Spawn { .. }) {
                    self.persist_status(project_id, &cfg.name, ProcessStatus::Error, None, None);
                }
                Err(e)
            }
        }
    }

    /// Stop half, assuming the key lock is held.
    async fn stop_locked(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<StopOutcome, SupervisorError> {
        let had_pending = self.cancel_pending(project_id, name).await;

        let group = self.registry.remove(project_id, name).await;
        let Some(mut group) = group else {
            if had_pending {
                // the process was between crash and respawn; keep it down
                self.persist_status(project_id, name, ProcessStatus::Stopped, None, None);
                return Ok(StopOutcome {
                    was_running: true,
                    instances_stopped: 0,
                });
            }
            return Ok(StopOutcome {
                was_running: false,
                instances_stopped: 0,
            });
        };

        group.flags.mark_stopping();
        let _ = group.state.transition(State::Stopping);

        // every instance tree gets the signal, even ones whose leader has
        // already exited: a wrapper's descendants can outlive the leader in
        // its process group, and dead trees absorb the signal harmlessly
        for inst in &group.instances {
            if let Err(e) = self
                .terminator
                .terminate_tree(inst.pid, self.settings.force_stop)
            {
                // best effort; stop never fails on signal delivery
                tracing::warn!("Failed to terminate instance '{}': {}", inst.instance_name, e);
            }
        }
        let _ = group.state.transition(State::Stopped);

        self.persist_status(project_id, name, ProcessStatus::Stopped, None, None);
        tracing::info!(
            "Stopped process '{}' ({} instance(s))",
            name,
            group.instances.len()
        );
        Ok(StopOutcome {
            was_running: true,
            instances_stopped: group.instances.len(),
        })
    }

    /// Fan out `instance_count` spawns, wire output, register the group and
    /// persist `running`. Fire-and-forget: no readiness wait per instance.
    ///
    /// Boxed: the exit monitors spawned here re-enter this function through
    /// the restart task, so the recursive future needs a named type.
    fn spawn_group<'a>(
        &'a self,
        project_id: &'a str,
        project_env: &'a HashMap<String, String>,
        cfg: &'a ProcessConfig,
    ) -> Pin<Box<dyn Future<Output = Result<usize, SupervisorError>> + Send + 'a>> {
        Box::pin(self.spawn_group_inner(project_id, project_env, cfg))
    }

    async fn spawn_group_inner(
        &self,
        project_id: &str,
        project_env: &HashMap<String, String>,
        cfg: &ProcessConfig,
    ) -> Result<usize, SupervisorError> {
        let (program, args) = utils::split_command(&cfg.command).ok_or_else(|| {
            SupervisorError::Validation(format!("process '{}' has an empty command", cfg.name))
        })?;

        // ambient env is inherited by the child; this overlay applies the
        // project env, then the per-process env on top
        let mut env = project_env.clone();
        env.extend(cfg.environment.clone());

        let count = cfg.instance_count;
        let flags = Arc::new(GroupFlags::new());
        let mut state = StateMachine::new();
        let _ = state.transition(State::Starting);

        let mut instances: Vec<InstanceHandle> = Vec::with_capacity(count as usize);
        for i in 0..count {
            let instance_name = if count == 1 {
                cfg.name.clone()
            } else {
                format!("{}_{}", cfg.name, i + 1)
            };
            let req = SpawnRequest {
                program: &program,
                args: &args,
                cwd: cfg.working_directory.as_deref(),
                env: &env,
                background: true,
                instance_name: &instance_name,
            };
            match self.spawner.spawn(&req) {
                Ok(mut spawned) => {
                    if let Some(stdout) = spawned.stdout.take() {
                        self.router
                            .attach(project_id, &instance_name, StreamKind::Stdout, stdout);
                    }
                    if let Some(stderr) = spawned.stderr.take() {
                        self.router
                            .attach(project_id, &instance_name, StreamKind::Stderr, stderr);
                    }
                    instances.push(InstanceHandle {
                        instance_name,
                        pid: spawned.pid,
                        exit_watch: spawned.exit_watch(),
                    });
                }
                Err(e) => {
                    // keep the group-size invariant: no ragged groups
                    flags.mark_stopping();
                    for inst in &instances {
                        if let Err(te) = self.terminator.terminate_tree(inst.pid, true) {
                            tracing::warn!(
                                "Failed to clean up partially started instance '{}': {}",
                                inst.instance_name,
                                te
                            );
                        }
                    }
                    return Err(SupervisorError::Spawn {
                        name: cfg.name.clone(),
                        source: e,
                    });
                }
            }
        }
        let _ = state.transition(State::Running);

        // exit monitors feed the restart policy
        for inst in &instances {
            let Some(sup) = self.self_ref.upgrade() else {
                break;
            };
            let flags = flags.clone();
            let rx = inst.exit_watch.clone();
            let project_id = project_id.to_string();
            let name = cfg.name.clone();
            let instance_name = inst.instance_name.clone();
            let pid = inst.pid;
            tokio::spawn(async move {
                spawner::wait_exit(rx).await;
                sup.on_instance_exit(project_id, name, instance_name, pid, flags)
                    .await;
            });
        }

        let started_at = utils::current_timestamp();
        let first_pid = instances.first().map(|i| i.pid);
        self.registry
            .set(
                project_id,
                RunningGroup {
                    name: cfg.name.clone(),
                    started_at,
                    instances,
                    flags,
                    state,
                },
            )
            .await;
        self.persist_status(
            project_id,
            &cfg.name,
            ProcessStatus::Running,
            first_pid,
            Some(started_at),
        );
        tracing::info!(
            "Started process '{}' with {} instance(s)",
            cfg.name,
            count
        );
        Ok(count as usize)
    }

    /// Restart policy entry point, run by each instance's exit monitor.
    async fn on_instance_exit(
        &self,
        project_id: String,
        name: String,
        instance_name: String,
        pid: u32,
        flags: Arc<GroupFlags>,
    ) {
        if flags.is_stopping() {
            // clean intentional stop (or a crash already being handled)
            return;
        }
        if !flags.claim_exit() {
            return;
        }
        tracing::warn!(
            "Instance '{}' (pid {}) exited unexpectedly",
            instance_name,
            pid
        );

        let autorestart = self
            .store
            .get_project(&project_id)
            .ok()
            .and_then(|p| p.processes.into_iter().find(|c| c.name == name))
            .map(|c| c.autorestart)
            .unwrap_or(false);

        if autorestart {
            let _guard = self.lock_key(&project_id, &name).await;
            if flags.is_stopping() {
                // an explicit stop won the race while we waited for the lock
                return;
            }
            self.schedule_restart(&project_id, &name).await;
        } else {
            let _guard = self.lock_key(&project_id, &name).await;
            if flags.is_stopping() {
                // an explicit stop won the race while we waited for the lock
                return;
            }
            if let Some(group) = self.registry.remove(&project_id, &name).await {
                group.flags.mark_stopping();
                // the exited instance's tree included: descendants of a dead
                // leader can linger in its process group
                for inst in &group.instances {
                    if let Err(e) = self.terminator.terminate_tree(inst.pid, true) {
                        tracing::warn!(
                            "Failed to terminate instance tree '{}': {}",
                            inst.instance_name,
                            e
                        );
                    }
                }
            }
            self.persist_status(&project_id, &name, ProcessStatus::Stopped, None, None);
        }
    }

    /// Schedule exactly one whole-group respawn after the fixed backoff.
    /// The pending task is cancellable, so an explicit stop during the
    /// backoff window cannot be undone by the restart firing later.
    /// Consecutive respawn failures retry up to `max_restart_attempts`,
    /// then surface as a persisted `error` status.
    async fn schedule_restart(&self, project_id: &str, name: &str) {
        let key = (project_id.to_string(), name.to_string());
        let token = CancellationToken::new();
        self.pending_restarts
            .lock()
            .await
            .insert(key.clone(), token.clone());

        let Some(sup) = self.self_ref.upgrade() else {
            return;
        };
        let backoff = Duration::from_millis(self.settings.restart_backoff_ms);
        let (project_id, name) = (project_id.to_string(), name.to_string());
        tracing::info!("Scheduling restart of '{}' in {}ms", name, backoff.as_millis());

        tokio::spawn(async move {
            // retire the crashed group right away; the whole group restarts
            // together even if only one instance died
            {
                let _guard = sup.lock_key(&project_id, &name).await;
                if token.is_cancelled() {
                    return;
                }
                if let Some(mut group) = sup.registry.remove(&project_id, &name).await {
                    let _ = group.state.transition(State::Crashed);
                    group.flags.mark_stopping();
                    // include the crashed leader's own tree: its descendants
                    // may still be alive inside its process group
                    for inst in &group.instances {
                        if let Err(e) = sup.terminator.terminate_tree(inst.pid, true) {
                            tracing::warn!(
                                "Failed to terminate instance tree '{}': {}",
                                inst.instance_name,
                                e
                            );
                        }
                    }
                }
            }

            let mut attempt: u32 = 0;
            loop {
                tokio::time::sleep(backoff).await;

                let _guard = sup.lock_key(&project_id, &name).await;
                if token.is_cancelled() {
                    return;
                }

                let project = match sup.store.get_project(&project_id) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("Dropping restart of '{}': {}", name, e);
                        sup.pending_restarts.lock().await.remove(&key);
                        return;
                    }
                };
                let Some(cfg) = project.processes.iter().find(|c| c.name == name).cloned()
                else {
                    tracing::warn!(
                        "Config '{}' was removed during backoff, dropping restart",
                        name
                    );
                    sup.pending_restarts.lock().await.remove(&key);
                    return;
                };

                match sup.spawn_group(&project_id, &project.environment, &cfg).await {
                    Ok(count) => {
                        tracing::info!("Auto-restarted '{}' with {} instance(s)", name, count);
                        sup.pending_restarts.lock().await.remove(&key);
                        return;
                    }
                    Err(e) => {
                        attempt += 1;
                        if attempt >= sup.settings.max_restart_attempts {
                            tracing::error!(
                                "Giving up on '{}' after {} failed respawn attempt(s): {}",
                                name,
                                attempt,
                                e
                            );
                            sup.persist_status(
                                &project_id,
                                &name,
                                ProcessStatus::Error,
                                None,
                                None,
                            );
                            sup.pending_restarts.lock().await.remove(&key);
                            return;
                        }
                        tracing::warn!(
                            "Respawn of '{}' failed (attempt {}): {}",
                            name,
                            attempt,
                            e
                        );
                    }
                }
            }
        });
    }

    /// Internal status mutation: status/pid/started_at only, all other
    /// config fields untouched. Persistence failures are logged; the
    /// lifecycle operation that triggered the update has already happened.
    fn persist_status(
        &self,
        project_id: &str,
        name: &str,
        status: ProcessStatus,
        pid: Option<u32>,
        started_at: Option<u64>,
    ) {
        let project = match self.store.get_project(project_id) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!("Skipping status update for '{}': {}", name, e);
                return;
            }
        };
        let mut processes = project.processes;
        match processes.iter_mut().find(|c| c.name == name) {
            Some(cfg) => {
                cfg.status = status;
                cfg.pid = pid;
                cfg.started_at = started_at;
            }
            None => {
                tracing::debug!("Config '{}' vanished before status update", name);
                return;
            }
        }
        if let Err(e) = self.store.save_processes(project_id, processes) {
            tracing::warn!("Failed to persist status of '{}': {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Project;
    use crate::store::JsonConfigStore;
    use output::TracingSink;

    fn test_supervisor() -> (tempfile::TempDir, Arc<Supervisor>, String) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonConfigStore::open(dir.path().join("projects.json")).unwrap());
        let project_id = store.create_project(Project::new("test-site")).unwrap();
        let settings = SupervisorSettings {
            restart_backoff_ms: 50,
            restart_debounce_ms: 10,
            ..SupervisorSettings::default()
        };
        let sup = Supervisor::new(store, Arc::new(TracingSink), settings);
        (dir, sup, project_id)
    }

    #[tokio::test]
    async fn test_add_process_round_trip() {
        let (_dir, sup, project) = test_supervisor();
        let mut cfg = ProcessConfig::new("queue-worker", "run-worker");
        cfg.instance_count = 2;
        cfg.autorestart = true;

        let stored = sup.add_process(&project, cfg).unwrap();
        assert_eq!(stored.status, ProcessStatus::Stopped);

        let listed = sup.get_processes(&project).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].config.name, "queue-worker");
        assert_eq!(listed[0].config.command, "run-worker");
        assert_eq!(listed[0].config.instance_count, 2);
        assert!(listed[0].config.autorestart);
        assert!(!listed[0].is_running);
    }

    #[tokio::test]
    async fn test_add_process_validation() {
        let (_dir, sup, project) = test_supervisor();

        let empty = ProcessConfig::new("", "run-worker");
        assert!(matches!(
            sup.add_process(&project, empty),
            Err(SupervisorError::Validation(_))
        ));

        let mut zero = ProcessConfig::new("w", "run-worker");
        zero.instance_count = 0;
        assert!(matches!(
            sup.add_process(&project, zero),
            Err(SupervisorError::Validation(_))
        ));

        sup.add_process(&project, ProcessConfig::new("w", "run-worker"))
            .unwrap();
        assert!(matches!(
            sup.add_process(&project, ProcessConfig::new("w", "other")),
            Err(SupervisorError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_add_process_unknown_project() {
        let (_dir, sup, _project) = test_supervisor();
        assert!(matches!(
            sup.add_process("ghost", ProcessConfig::new("w", "run-worker")),
            Err(SupervisorError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (_dir, sup, project) = test_supervisor();
        sup.add_process(&project, ProcessConfig::new("w", "run-worker"))
            .unwrap();

        let first = sup.stop_process(&project, "w").await.unwrap();
        assert!(!first.was_running);
        let second = sup.stop_process(&project, "w").await.unwrap();
        assert!(!second.was_running);
    }

    #[tokio::test]
    async fn test_start_unknown_config() {
        let (_dir, sup, project) = test_supervisor();
        assert!(matches!(
            sup.start_process(&project, "ghost").await,
            Err(SupervisorError::ConfigNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_spawn_failure_sets_error_status() {
        let (_dir, sup, project) = test_supervisor();
        sup.add_process(
            &project,
            ProcessConfig::new("broken", "definitely-not-a-real-binary-xyz"),
        )
        .unwrap();

        let err = sup.start_process(&project, "broken").await.unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { .. }));

        let status = sup.get_process_status(&project, "broken").await.unwrap();
        assert_eq!(status.status, ProcessStatus::Error);
        assert!(!status.is_running);
        assert!(status.pids.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_project() {
        let (_dir, sup, _project) = test_supervisor();
        assert!(matches!(
            sup.remove_process("ghost", "w").await,
            Err(SupervisorError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_absent_process_is_ok() {
        let (_dir, sup, project) = test_supervisor();
        // absence of the named process is not an error
        sup.remove_process(&project, "never-added").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_prunes_the_key_lock() {
        let (_dir, sup, project) = test_supervisor();
        sup.add_process(&project, ProcessConfig::new("w", "run-worker"))
            .unwrap();
        sup.stop_process(&project, "w").await.unwrap();

        let key = (project.clone(), "w".to_string());
        assert!(sup.op_locks.lock().await.contains_key(&key));

        sup.remove_process(&project, "w").await.unwrap();
        assert!(!sup.op_locks.lock().await.contains_key(&key));
    }

    #[tokio::test]
    async fn test_status_for_unknown_process() {
        let (_dir, sup, project) = test_supervisor();
        assert!(matches!(
            sup.get_process_status(&project, "ghost").await,
            Err(SupervisorError::ConfigNotFound(_))
        ));
    }
}
