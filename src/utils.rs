//! Shared utility functions for the auxd core engine.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::process::Command;

/// Apply platform-specific flags to hide the console window on Windows.
/// On non-Windows platforms, this is a no-op.
#[cfg(target_os = "windows")]
pub fn apply_creation_flags(cmd: &mut Command) -> &mut Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x08000000;
    cmd.creation_flags(CREATE_NO_WINDOW)
}

#[cfg(not(target_os = "windows"))]
pub fn apply_creation_flags(cmd: &mut Command) -> &mut Command {
    cmd
}

/// Split a command string into (program, args) without invoking a shell.
///
/// Whitespace-separated tokens only; no quoting or expansion. Commands that
/// need shell features should name the shell explicitly (e.g. store
/// `sh -c 'foo | bar'` as the command with the pipeline as one argument
/// the caller pre-tokenized).
pub fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut tokens = command.split_whitespace();
    let program = tokens.next()?.to_string();
    let args = tokens.map(String::from).collect();
    Some((program, args))
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
