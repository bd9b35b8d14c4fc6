//! Platform abstraction for launching supervised child processes.
//!
//! On POSIX platforms every child becomes the leader of its own process
//! group with piped stdio, which gives us both output capture and
//! whole-tree termination. On Windows, hidden execution goes through
//! creation flags and tree termination through the `taskkill` host
//! wrapper; a backgrounded child there loses direct output capture. That
//! asymmetry is a platform property, not a defect.

use std::collections::HashMap;
use tokio::process::{ChildStderr, ChildStdout, Command as TokioCommand};
use tokio::sync::watch;

/// What to launch, and how.
pub struct SpawnRequest<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub cwd: Option<&'a str>,
    /// Environment overlay on top of the ambient process environment.
    pub env: &'a HashMap<String, String>,
    /// Hidden/backgrounded execution (no console window on Windows).
    pub background: bool,
    /// Label used in spawn logging.
    pub instance_name: &'a str,
}

/// Handle to one launched OS process.
///
/// The child itself is owned by a detached waiter task; the handle exposes
/// the pid, the captured stdio streams (taken once by the caller) and a
/// watch subscription that flips to `false` on exit.
#[derive(Debug)]
pub struct SpawnedInstance {
    pub pid: u32,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
    running_rx: watch::Receiver<bool>,
}

impl SpawnedInstance {
    pub fn is_running(&self) -> bool {
        *self.running_rx.borrow()
    }

    /// Exit-notification subscription; resolves via [`wait_exit`].
    pub fn exit_watch(&self) -> watch::Receiver<bool> {
        self.running_rx.clone()
    }
}

/// Suspend until a spawned instance's running flag flips to `false`.
pub async fn wait_exit(mut rx: watch::Receiver<bool>) {
    while *rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Strategy seam for the supervisor; one implementation per platform family.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, req: &SpawnRequest<'_>) -> std::io::Result<SpawnedInstance>;
}

/// Spawner backed by `tokio::process` on the host OS.
pub struct NativeSpawner;

impl ProcessSpawner for NativeSpawner {
    fn spawn(&self, req: &SpawnRequest<'_>) -> std::io::Result<SpawnedInstance> {
        let mut cmd = TokioCommand::new(req.program);
        cmd.args(req.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(false);

        // Windows background children run detached from stdio; everywhere
        // else we pipe for the OutputRouter.
        if cfg!(windows) && req.background {
            cmd.stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null());
        } else {
            cmd.stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped());
        }

        if let Some(dir) = req.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in req.env {
            cmd.env(key, value);
        }

        // Own process group: killpg on the child's pid reaches wrapper
        // scripts and their descendants.
        #[cfg(unix)]
        cmd.process_group(0);

        crate::utils::apply_creation_flags(&mut cmd);

        let mut child = cmd.spawn()?;
        let pid = child.id().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                "spawned process exited before a PID could be read",
            )
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (running_tx, running_rx) = watch::channel(true);

        let name = req.instance_name.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::info!("Instance '{}' (pid {}) exited with {}", name, pid, status),
                Err(e) => tracing::error!("Failed to wait for instance '{}' (pid {}): {}", name, pid, e),
            }
            let _ = running_tx.send(false);
        });

        tracing::info!("Spawned instance '{}' with pid {}", req.instance_name, pid);
        Ok(SpawnedInstance {
            pid,
            stdout,
            stderr,
            running_rx,
        })
    }
}
