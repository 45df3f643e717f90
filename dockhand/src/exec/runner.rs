//! Command runner

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::exec::command::{CommandOutput, CommandSpec, STATUS_NOT_STARTED};

/// Executes commands and captures their exit status and output.
///
/// A nonzero status is the only failure signal; implementations never
/// interpret the output. Secret arguments are redacted from the output
/// before it is returned or logged.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> CommandOutput;
}

/// Runs commands as local child processes
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    async fn spawn(&self, command: &CommandSpec) -> std::io::Result<CommandOutput> {
        let mut cmd = Command::new(command.program());
        cmd.args(command.exposed_args())
            .stdin(if command.stdin_payload().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in command.env_vars() {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;
        if let Some(payload) = command.stdin_payload() {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(payload.as_bytes()).await?;
                stdin.shutdown().await?;
            }
        }

        let output = child.wait_with_output().await?;
        Ok(CommandOutput {
            // Killed by a signal: no code, report as generic failure
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandSpec) -> CommandOutput {
        debug!("$ {}", command);
        if let Some(payload) = command.stdin_payload() {
            debug!("stdin:\n{}", payload.trim_end());
        }

        let output = match self.spawn(command).await {
            Ok(output) => CommandOutput {
                status: output.status,
                stdout: command.redact(&output.stdout),
                stderr: command.redact(&output.stderr),
            },
            Err(e) => {
                warn!("Failed to run {}: {}", command.program(), e);
                CommandOutput::new(STATUS_NOT_STARTED, "", e.to_string())
            }
        };

        let combined = output.combined();
        if !combined.is_empty() {
            debug!("output:\n{}", combined);
        }
        debug!("exit status: {}", output.status);
        output
    }
}
