//! Pre- and post-rotation hooks
//!
//! Hooks run in the order they are listed. The first command that exits
//! non-zero stops the chain with [`Error::HookFailed`], carrying the captured
//! output so the caller can surface it and exit with the same code.
//!
//! Each command sees:
//! - `LOGROT_PHASE`: `prerotate` or `postrotate`
//! - `LOGROT_GROUP`: the rotation group name
//! - `LOGROT_FILE`: the file being rotated (per-file hooks only)

use logrot_core::{Error, Result, ENV_HOOK_FILE, ENV_HOOK_GROUP, ENV_HOOK_PHASE};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::traits::CommandExecutor;

/// When a hook list runs relative to the rename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreRotate,
    PostRotate,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::PreRotate => "prerotate",
            HookPhase::PostRotate => "postrotate",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runs hook command lists through a [`CommandExecutor`], failing fast
#[derive(Clone)]
pub struct HookRunner {
    executor: Arc<dyn CommandExecutor>,
}

impl HookRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Run every command of `commands` in order
    pub async fn run(
        &self,
        phase: HookPhase,
        commands: &[String],
        group: &str,
        file: Option<&Path>,
    ) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }

        let mut env = vec![
            (ENV_HOOK_PHASE, phase.as_str().to_string()),
            (ENV_HOOK_GROUP, group.to_string()),
        ];
        if let Some(file) = file {
            env.push((ENV_HOOK_FILE, file.display().to_string()));
        }

        for command in commands {
            info!("Running {} hook for {}: {}", phase, group, command);
            let output = self.executor.run_shell(command, &env).await?;

            if !output.success() {
                error!(
                    "{} hook failed for {} with code {}: {}",
                    phase,
                    group,
                    output.code,
                    output.stderr.trim()
                );
                return Err(Error::HookFailed {
                    command: command.clone(),
                    code: output.code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
            }

            if !output.stdout.is_empty() {
                debug!("Hook output for {} ({}): {}", group, phase, output.stdout.trim());
            }
        }

        Ok(())
    }
}
