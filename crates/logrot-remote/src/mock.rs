//! Mock implementations for testing

use crate::error::{RemoteError, Result};
use crate::RemoteStore;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A recorded upload: remote path and the bytes read from the local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub remote_path: String,
    pub contents: Vec<u8>,
}

/// A mock store that records every upload in memory
#[derive(Default, Clone)]
pub struct MockRemoteStore {
    uploads: Arc<Mutex<Vec<Upload>>>,
    call_count: Arc<AtomicUsize>,
    should_fail: bool,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store that rejects every upload
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Number of times upload was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All successful uploads, in order
    pub async fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().await.clone()
    }

    /// Whether anything was uploaded to `remote_path`
    pub async fn was_uploaded(&self, remote_path: &str) -> bool {
        self.uploads
            .lock()
            .await
            .iter()
            .any(|u| u.remote_path == remote_path)
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn upload(&self, remote_path: &str, local_path: &Path, _overwrite: bool) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(RemoteError::Rejected {
                op: "CREATE",
                status: 500,
                message: "Mock failure".to_string(),
            });
        }

        let contents = tokio::fs::read(local_path).await?;
        self.uploads.lock().await.push(Upload {
            remote_path: remote_path.to_string(),
            contents,
        });
        Ok(())
    }

    fn endpoint(&self) -> String {
        "mock://".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mock_records_uploads() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("a.gz");
        std::fs::write(&local, b"payload").unwrap();

        let store = MockRemoteStore::new();
        store.upload("/logs/a.gz", &local, true).await.unwrap();

        assert_eq!(store.call_count(), 1);
        assert!(store.was_uploaded("/logs/a.gz").await);
        assert_eq!(store.uploads().await[0].contents, b"payload");
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("a.gz");
        std::fs::write(&local, b"payload").unwrap();

        let store = MockRemoteStore::failing();
        assert!(store.upload("/logs/a.gz", &local, true).await.is_err());
        assert_eq!(store.call_count(), 1);
        assert!(store.uploads().await.is_empty());
    }
}
