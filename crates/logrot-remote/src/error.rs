//! Error types for remote storage

/// Remote storage error type
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Remote rejected {op} with status {status}: {message}")]
    Rejected {
        op: &'static str,
        status: u16,
        message: String,
    },

    #[error("Name node did not redirect CREATE to a data node")]
    MissingRedirect,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for remote operations
pub type Result<T> = std::result::Result<T, RemoteError>;

impl From<RemoteError> for logrot_core::Error {
    fn from(err: RemoteError) -> Self {
        logrot_core::Error::RemoteError(err.to_string())
    }
}
