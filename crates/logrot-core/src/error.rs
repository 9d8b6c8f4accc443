//! Error types for logrot

use std::path::PathBuf;

/// logrot error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Hook command failed with exit code {code}: {command}")]
    HookFailed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to run command '{command}': {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Compression failed for {path}: {reason}")]
    CompressFailed { path: PathBuf, reason: String },

    #[error("Queue error: {0}")]
    QueueError(String),

    #[error("Queue full: no free slot after {timeout_secs}s")]
    QueueFull { timeout_secs: u64 },

    #[error("Remote error: {0}")]
    RemoteError(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for logrot
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn queue<S: Into<String>>(msg: S) -> Self {
        Error::QueueError(msg.into())
    }

    pub fn template<S: Into<String>>(msg: S) -> Self {
        Error::InvalidTemplate(msg.into())
    }

    /// Exit code the process should terminate with for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::HookFailed { code, .. } => *code,
            _ => 1,
        }
    }
}
