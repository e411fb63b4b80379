//! External command execution
//!
//! Every call into occtl or ocpasswd goes through a [`CommandRunner`]. The
//! default [`ShellRunner`] hands the composed command line to `sh -c`, so any
//! caller-supplied piece of that line must pass [`crate::validation`] first.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::context::OpContext;
use crate::error::{OcError, OcResult};
use crate::validation;

/// Runs a command line under a cancellation context and returns its stdout
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command`, returning captured stdout on exit status 0
    async fn run(&self, ctx: &OpContext, command: &str) -> OcResult<Vec<u8>>;

    /// Same as [`CommandRunner::run`] with `input` written to the child's stdin
    async fn run_with_input(&self, ctx: &OpContext, command: &str, input: &[u8]) -> OcResult<Vec<u8>>;
}

/// Runs commands through a shell
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }

    async fn execute(&self, ctx: &OpContext, command: &str, input: Option<Vec<u8>>) -> OcResult<Vec<u8>> {
        if let Some(reason) = ctx.err() {
            return Err(OcError::Cancelled(reason));
        }

        debug!("Executing: {} -c {:?}", self.shell, command);

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcError::CommandSpawn {
                cmd: command.to_string(),
                source: e,
            })?;

        let stdin = child.stdin.take();
        let completion = async move {
            if let (Some(data), Some(mut stdin)) = (input, stdin) {
                match stdin.write_all(&data).await {
                    Ok(()) => {}
                    // Child exited without reading; its status tells the rest
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(e),
                }
                drop(stdin);
            }
            child.wait_with_output().await
        };

        // Dropping `completion` drops the child, which kills it
        let output = tokio::select! {
            output = completion => output.map_err(|e| OcError::io(format!("Failed to run '{}'", command), e))?,
            reason = ctx.done() => {
                warn!("Command '{}' cancelled: {}", command, reason);
                return Err(OcError::Cancelled(reason));
            }
        };

        if !output.status.success() {
            return Err(OcError::CommandFailed {
                cmd: command.to_string(),
                code: output.status.code(),
                stderr: validation::sanitize_error_message(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(output.stdout)
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, ctx: &OpContext, command: &str) -> OcResult<Vec<u8>> {
        self.execute(ctx, command, None).await
    }

    async fn run_with_input(&self, ctx: &OpContext, command: &str, input: &[u8]) -> OcResult<Vec<u8>> {
        self.execute(ctx, command, Some(input.to_vec())).await
    }
}
