//! Executor trait and common types

use async_trait::async_trait;
use logrot_core::Result;
use std::ffi::OsStr;

/// Exit code and captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new<O: Into<String>, E: Into<String>>(code: i32, stdout: O, stderr: E) -> Self {
        Self {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs commands to completion and reports how they ended.
///
/// A non-zero exit is not an error at this level; callers decide what a
/// failure means. `Err` is reserved for commands that could not be started.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a script through the shell with extra environment variables
    async fn run_shell(&self, script: &str, env: &[(&str, String)]) -> Result<CommandOutput>;

    /// Run a program directly, without shell interpretation of its arguments
    async fn run_program(&self, program: &str, args: &[&OsStr]) -> Result<CommandOutput>;
}
