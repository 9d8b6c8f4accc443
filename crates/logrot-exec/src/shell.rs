//! Executor backed by `sh -c`

use async_trait::async_trait;
use logrot_core::{Error, Result};
use std::ffi::OsStr;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use crate::traits::{CommandExecutor, CommandOutput};

/// Runs commands as child processes, capturing stdout and stderr
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new<S: Into<String>>(shell: S) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new("sh")
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run_shell(&self, script: &str, env: &[(&str, String)]) -> Result<CommandOutput> {
        debug!("Running shell command: {}", script);

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(script);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::CommandFailed {
                command: script.to_string(),
                reason: e.to_string(),
            })?;

        Ok(to_command_output(output))
    }

    async fn run_program(&self, program: &str, args: &[&OsStr]) -> Result<CommandOutput> {
        debug!("Running {} {:?}", program, args);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::CommandFailed {
                command: program.to_string(),
                reason: e.to_string(),
            })?;

        Ok(to_command_output(output))
    }
}

fn to_command_output(output: Output) -> CommandOutput {
    CommandOutput {
        code: exit_code(output.status),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

/// Exit code, or `128 + signal` for processes killed by a signal
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(1)
}
