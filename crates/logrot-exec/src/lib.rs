//! logrot Exec - Shell command execution and rotation hooks

pub mod hooks;
pub mod shell;
pub mod traits;

pub use hooks::{HookPhase, HookRunner};
pub use shell::ShellExecutor;
pub use traits::{CommandExecutor, CommandOutput};

use std::sync::Arc;

/// Executor used when nothing else is configured
pub fn default_executor() -> Arc<dyn CommandExecutor> {
    Arc::new(ShellExecutor::default())
}
