/// External command execution
///
/// Every collaborator (docker compose, git) goes through here so exit
/// status handling and logging are uniform.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}{}", stderr_suffix(.stderr))]
    NonZeroExit {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Captured output of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

pub struct CommandRunner;

impl CommandRunner {
    fn display(program: &str, args: &[&str]) -> String {
        std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run a command with stdout/stderr attached to the terminal.
    /// Returns an error on spawn failure or non-zero exit.
    pub async fn run_inherited(
        program: &str,
        args: &[&str],
        work_dir: &Path,
    ) -> Result<(), CommandError> {
        let command = Self::display(program, args);
        debug!(%command, dir = %work_dir.display(), "Running command");

        let status = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| CommandError::SpawnFailed {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            warn!(%command, %status, "Command failed");
            return Err(CommandError::NonZeroExit {
                command,
                status,
                stderr: String::new(),
            });
        }

        Ok(())
    }

    /// Run a command and capture its output
    pub async fn run_captured(
        program: &str,
        args: &[&str],
        work_dir: &Path,
    ) -> Result<CommandOutput, CommandError> {
        let command = Self::display(program, args);
        debug!(%command, dir = %work_dir.display(), "Running command (captured)");

        let output = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| CommandError::SpawnFailed {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            warn!(%command, status = %output.status, "Command failed");
            return Err(CommandError::NonZeroExit {
                command,
                status: output.status,
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captured_success() {
        let dir = tempfile::tempdir().unwrap();
        let output = CommandRunner::run_captured("sh", &["-c", "echo hello"], dir.path())
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_captured_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandRunner::run_captured("sh", &["-c", "echo boom >&2; exit 3"], dir.path())
            .await
            .unwrap_err();
        match &err {
            CommandError::NonZeroExit { stderr, .. } => assert_eq!(stderr.trim(), "boom"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_inherited_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandRunner::run_inherited("sh", &["-c", "exit 1"], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandRunner::run_captured("definitely-not-a-real-binary-xyz", &[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::SpawnFailed { .. }));
    }
}
