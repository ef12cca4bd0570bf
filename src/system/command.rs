//! External command helpers
//!
//! Thin wrappers around `std::process::Command` shared by the service
//! control, validation and benchmark adapters.

use crate::error::{Result, TuneError};
use std::env;
use std::path::PathBuf;
use std::process::{Command, Output};

/// Locate an executable on `PATH`
pub fn which(cmd: &str) -> Option<PathBuf> {
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths).find_map(|dir| {
            let full_path = dir.join(cmd);
            if full_path.is_file() {
                Some(full_path)
            } else {
                None
            }
        })
    })
}

/// Run a command to completion and capture its output
///
/// Fails if the command cannot be spawned. A non-zero exit is not an error
/// here; callers inspect the status and use [`failure_message`].
pub fn run_command(program: &str, args: &[&str]) -> Result<Output> {
    tracing::debug!(program, ?args, "Running command");
    Command::new(program)
        .args(args)
        .output()
        .map_err(|e| TuneError::command(display_command(program, args), e.to_string()))
}

/// Best description of why a command failed: stderr, then stdout, then status
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else if !stdout.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        format!("exited with {}", output.status)
    }
}

fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_which_missing() {
        assert!(which("hwtune-definitely-not-installed").is_none());
    }

    #[test]
    fn test_spawn_failure_is_command_error() {
        let err = run_command("hwtune-definitely-not-installed", &["-t"]).unwrap_err();
        match err {
            TuneError::Command { command, .. } => {
                assert_eq!(command, "hwtune-definitely-not-installed -t")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_message_prefers_stderr() {
        let output = run_command("sh", &["-c", "echo partial; echo broken >&2; exit 3"]).unwrap();
        assert!(!output.status.success());
        assert_eq!(failure_message(&output), "broken");
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_message_falls_back_to_status() {
        let output = run_command("sh", &["-c", "exit 4"]).unwrap();
        assert!(failure_message(&output).contains('4'));
    }
}
