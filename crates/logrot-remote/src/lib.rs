//! logrot Remote - Upload targets for rotated files
//!
//! Provides the [`RemoteStore`] seam and a WebHDFS implementation.

mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod webhdfs;

pub use error::{RemoteError, Result};
pub use webhdfs::WebHdfsClient;

use async_trait::async_trait;
use logrot_core::RemoteConfig;
use std::path::Path;
use std::sync::Arc;

/// Trait for remote storage backends
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload `local_path` to `remote_path`, replacing any existing object when `overwrite` is set
    async fn upload(&self, remote_path: &str, local_path: &Path, overwrite: bool) -> Result<()>;

    /// Human readable endpoint, for logs
    fn endpoint(&self) -> String;
}

/// Build the store described by a group's remote settings
pub fn connect(config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>> {
    Ok(Arc::new(WebHdfsClient::new(config)?))
}
