//! Cross-platform termination of a process and its descendants.
//!
//! The launched command is often a wrapper (version-manager shim, shell
//! script), so signalling the top pid alone would leave the real worker
//! running. Unix children are spawned as process-group leaders, so
//! `killpg` on the child pid takes the whole tree; Windows delegates to
//! `taskkill /T`.

use crate::supervisor::error::SupervisorError;

/// Collaborator seam for delivering termination requests.
pub trait ProcessTerminator: Send + Sync {
    /// Request termination of `pid` and its descendants. `force` selects
    /// SIGKILL-equivalent delivery instead of a graceful signal.
    fn terminate_tree(&self, pid: u32, force: bool) -> Result<(), SupervisorError>;
}

pub struct TreeKiller;

impl ProcessTerminator for TreeKiller {
    #[cfg(unix)]
    fn terminate_tree(&self, pid: u32, force: bool) -> Result<(), SupervisorError> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        tracing::info!("Sending {} to process group {}", signal, pid);

        // The spawner made the child a group leader, so its pgid == pid.
        match signal::killpg(Pid::from_raw(pid as i32), signal) {
            Ok(()) => Ok(()),
            // Group already gone; fall back to the single pid in case the
            // process was re-parented out of its group.
            Err(nix::errno::Errno::ESRCH) => {
                match signal::kill(Pid::from_raw(pid as i32), signal) {
                    Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
                    Err(e) => Err(SupervisorError::Termination {
                        pid,
                        reason: e.to_string(),
                    }),
                }
            }
            Err(e) => Err(SupervisorError::Termination {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    #[cfg(windows)]
    fn terminate_tree(&self, pid: u32, force: bool) -> Result<(), SupervisorError> {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;

        tracing::info!("Terminating process tree {} via taskkill (force: {})", pid, force);
        let mut cmd = std::process::Command::new("taskkill");
        cmd.args(["/PID", &pid.to_string(), "/T"]);
        if force {
            cmd.arg("/F");
        }
        let output = cmd
            .creation_flags(CREATE_NO_WINDOW)
            .output()
            .map_err(|e| SupervisorError::Termination {
                pid,
                reason: e.to_string(),
            })?;
        // taskkill reports "not found" for already-dead trees; stop must
        // stay idempotent, so only surface real delivery failures.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.contains("not found") {
                return Err(SupervisorError::Termination {
                    pid,
                    reason: stderr.trim().to_string(),
                });
            }
        }
        Ok(())
    }
}
