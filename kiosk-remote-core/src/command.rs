//! Host command execution with a hard timeout.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::error::{RemoteError, RemoteResult};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Converts a non-zero exit into an execution error carrying the output.
    pub fn into_result(self, what: &str) -> RemoteResult<CommandOutput> {
        if self.success() {
            return Ok(self);
        }
        Err(RemoteError::Execution {
            message: match self.status {
                Some(code) => format!("{} failed with exit status {}", what, code),
                None => format!("{} was terminated", what),
            },
            stdout: Some(self.stdout),
            stderr: Some(self.stderr),
        })
    }
}

/// Quotes `arg` for `sh`.
pub fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[mockall::automock]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a shell command line. A command that outlives `timeout` is killed
    /// and reported as [`RemoteError::CommandTimeout`].
    async fn run(
        &self,
        command: &str,
        cwd: Option<PathBuf>,
        timeout: Duration,
    ) -> RemoteResult<CommandOutput>;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    pub async fn run_in(
        &self,
        command: &str,
        dir: &Path,
        timeout: Duration,
    ) -> RemoteResult<CommandOutput> {
        self.run(command, Some(dir.to_path_buf()), timeout).await
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    #[instrument(skip(self), level = "debug")]
    async fn run(
        &self,
        command: &str,
        cwd: Option<PathBuf>,
        timeout: Duration,
    ) -> RemoteResult<CommandOutput> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                error!(command, "Command timed out after {}ms", timeout.as_millis());
                return Err(RemoteError::CommandTimeout {
                    command: command.to_string(),
                    timeout,
                });
            }
        };

        let output = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!(command, status = ?output.status, "Command finished");
        Ok(output)
    }
}
