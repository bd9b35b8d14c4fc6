//! PID liveness probing.
//!
//! sysinfo scans the OS process table synchronously; calling it on a tokio
//! worker thread would block the runtime, so the async wrappers run on the
//! blocking pool.

use sysinfo::{Pid, System};

/// Whether a PID is currently alive (cross-platform).
pub fn is_running(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes();
    sys.process(Pid::from_u32(pid)).is_some()
}

/// Async wrapper for [`is_running`].
pub async fn is_running_async(pid: u32) -> bool {
    tokio::task::spawn_blocking(move || is_running(pid))
        .await
        .unwrap_or(false)
}

/// Filter a PID set down to the ones still alive, in one process-table scan.
pub fn alive_pids(pids: &[u32]) -> Vec<u32> {
    let mut sys = System::new();
    sys.refresh_processes();
    pids.iter()
        .copied()
        .filter(|pid| sys.process(Pid::from_u32(*pid)).is_some())
        .collect()
}

/// Async wrapper for [`alive_pids`].
pub async fn alive_pids_async(pids: Vec<u32>) -> Vec<u32> {
    tokio::task::spawn_blocking(move || alive_pids(&pids))
        .await
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_pid_is_running() {
        assert!(is_running(std::process::id()));
    }

    #[test]
    fn test_bogus_pid_is_not_running() {
        // PID near the top of the default pid space; overwhelmingly unlikely
        // to be in use on a test machine
        assert!(!is_running(4_000_000));
    }

    #[test]
    fn test_alive_pids_filters() {
        let own = std::process::id();
        let alive = alive_pids(&[own, 4_000_000]);
        assert_eq!(alive, vec![own]);
    }

    #[tokio::test]
    async fn test_async_wrapper() {
        assert!(is_running_async(std::process::id()).await);
    }
}
