//! Post-processing of rotated files
//!
//! Each queued record is compressed, mirrored to local copy targets, uploaded
//! to the remote store and stripped of its uncompressed intermediate. A record
//! is acknowledged only after all of that succeeded; a failing record is
//! released back to the queue and the drain moves on.

use logrot_core::fs::{copy_preserving, ensure_dir};
use logrot_core::{Result, RotatedFileRecord, RotationGroup, ARCHIVE_DIR_MODE};
use logrot_exec::CommandExecutor;
use logrot_queue::WorkQueue;
use logrot_remote::RemoteStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::compress::Compressor;

/// Result of processing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Fully processed; carries the final local file
    Processed(PathBuf),
    /// The rotated file no longer exists
    Skipped,
}

/// Counters for one drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Distinct original paths whose records were processed, in first-seen order
    pub touched: Vec<PathBuf>,
}

impl DrainStats {
    fn touch(&mut self, original: &Path) {
        if !self.touched.iter().any(|p| p == original) {
            self.touched.push(original.to_path_buf());
        }
    }
}

/// Applies a group's compression, copy and upload settings to queued records
pub struct PostProcessor {
    group: RotationGroup,
    compressor: Compressor,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl PostProcessor {
    pub fn new(
        group: &RotationGroup,
        executor: Arc<dyn CommandExecutor>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        Self {
            group: group.clone(),
            compressor: Compressor::new(executor, group.compression.clone()),
            remote,
        }
    }

    /// Process a single rotated file
    pub async fn process_record(&self, record: &RotatedFileRecord) -> Result<Outcome> {
        let rotated = &record.rotated;
        if !rotated.exists() {
            info!("Rotated file {} is gone, skipping", rotated.display());
            return Ok(Outcome::Skipped);
        }

        let current = if self.group.compress {
            self.compressor.compress(rotated).await?
        } else {
            rotated.clone()
        };

        for rule in &self.group.copy {
            if let Some(dest) = rule.destination(&current) {
                self.mirror(&current, &dest)?;
            }
        }

        if let Some(remote) = &self.remote {
            for rule in &self.group.copy_to_remote {
                if let Some(dest) = rule.destination(&current) {
                    let dest = dest.to_string_lossy();
                    debug!("Uploading {} to {}{}", current.display(), remote.endpoint(), dest);
                    remote.upload(&dest, &current, true).await?;
                }
            }
        }

        if self.group.compress {
            std::fs::remove_file(rotated)?;
        }

        info!("Processed {}", current.display());
        Ok(Outcome::Processed(current))
    }

    fn mirror(&self, file: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            ensure_dir(parent, ARCHIVE_DIR_MODE, self.group.ownership)?;
        }
        copy_preserving(file, dest)?;
        debug!("Copied {} -> {}", file.display(), dest.display());
        Ok(())
    }

    /// Drain every pending record of the queue once.
    ///
    /// Records queued under another group name are processed with this
    /// group's settings. Item failures are logged and released for
    /// redelivery; only queue storage errors end the drain early.
    pub async fn drain(&self, queue: &WorkQueue) -> Result<DrainStats> {
        let mut stats = DrainStats::default();
        let mut drain = queue.drain();

        while let Some(delivery) = drain.next().await? {
            if delivery.group != self.group.name {
                debug!(
                    "Adopting {} queued by group {}",
                    delivery.record.rotated.display(),
                    delivery.group
                );
            }
            match self.process_record(&delivery.record).await {
                Ok(Outcome::Processed(_)) => {
                    queue.ack(&delivery).await?;
                    stats.processed += 1;
                    stats.touch(&delivery.record.original);
                }
                Ok(Outcome::Skipped) => {
                    queue.ack(&delivery).await?;
                    stats.skipped += 1;
                }
                Err(e) => {
                    error!(
                        "Failed to process {} (attempt {}): {}",
                        delivery.record.rotated.display(),
                        delivery.attempts + 1,
                        e
                    );
                    queue.release(&delivery, &e.to_string()).await?;
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use logrot_core::CopyRule;
    use logrot_exec::default_executor;
    use logrot_remote::mock::MockRemoteStore;
    use std::fs;
    use tempfile::TempDir;

    fn rotated_file(root: &Path, contents: &[u8]) -> RotatedFileRecord {
        let archive = root.join("logs/a.log-rotates");
        fs::create_dir_all(&archive).unwrap();
        let rotated = archive.join("a.log-20171113112233");
        fs::write(&rotated, contents).unwrap();
        RotatedFileRecord::new(root.join("logs/a.log"), rotated)
    }

    #[tokio::test]
    async fn test_missing_rotated_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let group = testing::group(dir.path());
        let processor = PostProcessor::new(&group, default_executor(), None);

        let record = RotatedFileRecord::new("/var/log/a.log", dir.path().join("gone"));
        assert_eq!(processor.process_record(&record).await.unwrap(), Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_compress_removes_intermediate() {
        let dir = TempDir::new().unwrap();
        let mut group = testing::group(dir.path());
        group.compress = true;
        let processor = PostProcessor::new(&group, default_executor(), None);

        let record = rotated_file(dir.path(), b"line\n");
        let outcome = processor.process_record(&record).await.unwrap();

        let mut expected = record.rotated.clone().into_os_string();
        expected.push(".gz");
        assert_eq!(outcome, Outcome::Processed(PathBuf::from(expected.clone())));
        assert!(Path::new(&expected).exists());
        assert!(!record.rotated.exists());
    }

    #[tokio::test]
    async fn test_copy_rules_mirror_the_file() {
        let dir = TempDir::new().unwrap();
        let mut group = testing::group(dir.path());
        let logs = dir.path().join("logs").display().to_string();
        let mirror = dir.path().join("mirror").display().to_string();
        group.copy = vec![
            CopyRule::new(logs.clone(), mirror.clone()),
            CopyRule::new("/elsewhere", "/nowhere"),
            CopyRule {
                from: logs,
                to: None,
            },
        ];
        let processor = PostProcessor::new(&group, default_executor(), None);

        let record = rotated_file(dir.path(), b"line\n");
        processor.process_record(&record).await.unwrap();

        let copied = dir
            .path()
            .join("mirror/a.log-rotates/a.log-20171113112233");
        assert_eq!(fs::read(&copied).unwrap(), b"line\n");
        assert!(record.rotated.exists());
        assert!(!Path::new("/nowhere").exists());
    }

    #[tokio::test]
    async fn test_remote_uploads() {
        let dir = TempDir::new().unwrap();
        let mut group = testing::group(dir.path());
        let logs = dir.path().join("logs").display().to_string();
        group.copy_to_remote = vec![CopyRule::new(logs, "/logs/web1")];
        let remote = MockRemoteStore::new();
        let processor =
            PostProcessor::new(&group, default_executor(), Some(Arc::new(remote.clone())));

        let record = rotated_file(dir.path(), b"line\n");
        processor.process_record(&record).await.unwrap();

        let uploads = remote.uploads().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(
            uploads[0].remote_path,
            "/logs/web1/a.log-rotates/a.log-20171113112233"
        );
        assert_eq!(uploads[0].contents, b"line\n");
    }

    #[tokio::test]
    async fn test_drain_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let mut group = testing::group(dir.path());
        let logs = dir.path().join("logs").display().to_string();
        group.copy_to_remote = vec![CopyRule::new(logs, "/logs")];
        let remote = MockRemoteStore::failing();
        let processor =
            PostProcessor::new(&group, default_executor(), Some(Arc::new(remote.clone())));

        let queue = WorkQueue::open(&group.queue).await.unwrap();
        let record = rotated_file(dir.path(), b"line\n");
        queue.enqueue(&group.name, &record).await.unwrap();
        queue
            .enqueue(
                &group.name,
                &RotatedFileRecord::new("/var/log/b.log", dir.path().join("gone")),
            )
            .await
            .unwrap();

        let stats = processor.drain(&queue).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.processed, 0);
        assert!(stats.touched.is_empty());

        // The failed record stays queued for the next run
        assert_eq!(queue.pending(&group.name).await.unwrap(), 1);
        let mut again = queue.drain();
        let delivery = again.next().await.unwrap().unwrap();
        assert_eq!(delivery.record, record);
        assert_eq!(delivery.attempts, 1);
    }

    #[tokio::test]
    async fn test_drain_acks_and_touches_once_per_source() {
        let dir = TempDir::new().unwrap();
        let group = testing::group(dir.path());
        let processor = PostProcessor::new(&group, default_executor(), None);

        let queue = WorkQueue::open(&group.queue).await.unwrap();
        let first = rotated_file(dir.path(), b"one\n");
        let second_path = first.rotated.with_file_name("a.log-20171113112234");
        fs::write(&second_path, b"two\n").unwrap();
        let second = RotatedFileRecord::new(first.original.clone(), second_path);
        queue.enqueue(&group.name, &first).await.unwrap();
        queue.enqueue(&group.name, &second).await.unwrap();

        let stats = processor.drain(&queue).await.unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.touched, vec![first.original.clone()]);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_drain_adopts_records_of_renamed_groups() {
        let dir = TempDir::new().unwrap();
        let group = testing::group(dir.path());
        let processor = PostProcessor::new(&group, default_executor(), None);

        let queue = WorkQueue::open(&group.queue).await.unwrap();
        let stranded = rotated_file(dir.path(), b"old\n");
        let current_path = stranded.rotated.with_file_name("a.log-20171113112234");
        fs::write(&current_path, b"new\n").unwrap();
        let current = RotatedFileRecord::new(stranded.original.clone(), current_path);
        // Left behind by a run whose group was named after its pattern
        queue.enqueue("/old/pattern/*.log", &stranded).await.unwrap();
        queue.enqueue(&group.name, &current).await.unwrap();

        let stats = processor.drain(&queue).await.unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(queue.len().await.unwrap(), 0);
        assert_eq!(queue.pending("/old/pattern/*.log").await.unwrap(), 0);
    }
}
