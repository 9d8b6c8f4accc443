//! Rotation of one group

use chrono::{Local, NaiveDateTime};
use logrot_core::fs::{chown_best_effort, ensure_dir, is_empty_file, move_file, set_mode};
use logrot_core::{
    Error, PathNamer, Result, RotatedFileRecord, RotationGroup, ARCHIVE_DIR_MODE,
};
use logrot_exec::{default_executor, CommandExecutor, HookPhase, HookRunner};
use logrot_queue::WorkQueue;
use logrot_remote::RemoteStore;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::discovery::expand_paths;
use crate::pipeline::PostProcessor;
use crate::retention::RetentionPruner;

/// Summary of one group run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    pub group: String,
    /// Files renamed into their archive directory
    pub rotated: usize,
    /// Empty or vanished files left alone plus queued records whose file had vanished
    pub skipped: usize,
    /// Queued records fully post-processed
    pub processed: usize,
    /// Queued records released after a processing failure
    pub failed: usize,
    /// Rotated copies deleted by retention
    pub pruned: usize,
}

impl RotationReport {
    pub fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            ..Default::default()
        }
    }
}

impl fmt::Display for RotationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: rotated {}, skipped {}, processed {}, failed {}, pruned {}",
            self.group, self.rotated, self.skipped, self.processed, self.failed, self.pruned
        )
    }
}

/// Runs a rotation group end to end.
///
/// The rotation timestamp is fixed when the rotator is built, so every file
/// of the run lands in the same archive directory.
pub struct Rotator {
    group: RotationGroup,
    namer: PathNamer,
    executor: Arc<dyn CommandExecutor>,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl Rotator {
    /// Create a rotator stamped with the current local time
    pub fn new(group: RotationGroup) -> Result<Self> {
        Self::with_clock(group, Local::now().naive_local())
    }

    /// Create a rotator stamped with `now`
    pub fn with_clock(group: RotationGroup, now: NaiveDateTime) -> Result<Self> {
        let namer = PathNamer::for_local_host(&group.naming, now)?;
        let remote = match &group.remote {
            Some(config) if group.uploads_enabled() => Some(logrot_remote::connect(config)?),
            _ => None,
        };

        Ok(Self {
            group,
            namer,
            executor: default_executor(),
            remote,
        })
    }

    /// Use a different executor for hooks and compression
    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Use a different remote store for uploads
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn group(&self) -> &RotationGroup {
        &self.group
    }

    pub fn namer(&self) -> &PathNamer {
        &self.namer
    }

    /// Rotate every matching file, then post-process and prune
    pub async fn rotate(&self) -> Result<RotationReport> {
        let queue = WorkQueue::open(&self.group.queue).await?;
        let result = self.run(&queue).await;
        queue.close().await;
        result
    }

    async fn run(&self, queue: &WorkQueue) -> Result<RotationReport> {
        let group = &self.group;
        let hooks = HookRunner::new(self.executor.clone());
        let mut report = RotationReport::new(&group.name);

        info!("Rotating group {} at {}", group.name, self.namer.timestamp());

        if group.shared_scripts {
            hooks
                .run(HookPhase::PreRotate, &group.prerotate, &group.name, None)
                .await?;
        }

        for path in expand_paths(&group.paths)? {
            if is_empty_file(&path) {
                debug!("Skipping empty file {}", path.display());
                report.skipped += 1;
                continue;
            }

            if !group.shared_scripts {
                hooks
                    .run(
                        HookPhase::PreRotate,
                        &group.prerotate,
                        &group.name,
                        Some(path.as_path()),
                    )
                    .await?;
            }

            if self.rotate_file(queue, &path).await?.is_none() {
                report.skipped += 1;
                continue;
            }
            report.rotated += 1;

            if !group.shared_scripts {
                hooks
                    .run(
                        HookPhase::PostRotate,
                        &group.postrotate,
                        &group.name,
                        Some(path.as_path()),
                    )
                    .await?;
            }
        }

        if group.shared_scripts {
            hooks
                .run(HookPhase::PostRotate, &group.postrotate, &group.name, None)
                .await?;
        }

        let processor = PostProcessor::new(group, self.executor.clone(), self.remote.clone());
        let stats = processor.drain(queue).await?;
        report.processed = stats.processed;
        report.skipped += stats.skipped;
        report.failed = stats.failed;

        if let Some(keep) = group.keep {
            let pruner = RetentionPruner::new(
                &self.namer,
                keep,
                Some(group.compression.extension.clone()),
            );
            for source in &stats.touched {
                report.pruned += pruner.prune(source)?.len();
            }
        }

        Ok(report)
    }

    /// Move one file into its archive directory and enqueue it.
    ///
    /// A failed move only skips this file and returns `None`; a source matched
    /// by two patterns is already gone on its second visit.
    async fn rotate_file(
        &self,
        queue: &WorkQueue,
        source: &Path,
    ) -> Result<Option<RotatedFileRecord>> {
        let group = &self.group;

        ensure_dir(&self.namer.archive_dir(source), ARCHIVE_DIR_MODE, group.ownership)?;

        let dest = self.namer.dest_path(source);
        match move_file(source, &dest) {
            Ok(()) => {}
            Err(Error::FileNotFound(_)) => {
                warn!("{} disappeared before it could be rotated, skipping", source.display());
                return Ok(None);
            }
            Err(e) => {
                error!("Failed to move {} to {}: {}", source.display(), dest.display(), e);
                return Ok(None);
            }
        }
        set_mode(&dest, group.mode)?;
        chown_best_effort(&dest, group.ownership)?;

        let record = RotatedFileRecord::new(source, &dest);
        queue.enqueue(&group.name, &record).await?;

        info!("Rotated {} -> {}", source.display(), dest.display());
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::NaiveDate;
    use logrot_core::{CopyRule, Ownership, RemoteConfig};
    use logrot_remote::mock::MockRemoteStore;
    use nix::unistd::{Gid, Uid};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn frozen() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 11, 13)
            .unwrap()
            .and_hms_opt(11, 22, 33)
            .unwrap()
    }

    fn write_log(root: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let logs = root.join("logs");
        fs::create_dir_all(&logs).unwrap();
        let path = logs.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn archived(root: &Path, name: &str) -> PathBuf {
        root.join(format!("logs/{}-rotates/201711/13/{}-20171113112233", name, name))
    }

    #[tokio::test]
    async fn test_rotate_without_compression() {
        let dir = TempDir::new().unwrap();
        let source = write_log(dir.path(), "access.log", b"GET /\n");
        let mut group = testing::group(dir.path());
        group.ownership = Ownership::new(Uid::effective().as_raw(), Gid::effective().as_raw());

        let report = Rotator::with_clock(group, frozen())
            .unwrap()
            .rotate()
            .await
            .unwrap();

        let dest = archived(dir.path(), "access.log");
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"GET /\n");
        assert_eq!(fs::metadata(&dest).unwrap().permissions().mode() & 0o777, 0o640);
        assert_eq!(report.rotated, 1);
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn test_rotate_and_gzip() {
        let dir = TempDir::new().unwrap();
        let source = write_log(dir.path(), "access.log", b"GET /\n");
        let mut group = testing::group(dir.path());
        group.compress = true;

        Rotator::with_clock(group, frozen())
            .unwrap()
            .rotate()
            .await
            .unwrap();

        let dest = archived(dir.path(), "access.log");
        let mut gz = dest.clone().into_os_string();
        gz.push(".gz");
        assert!(!source.exists());
        assert!(!dest.exists());
        assert!(PathBuf::from(gz).exists());
    }

    #[tokio::test]
    async fn test_empty_files_are_untouched() {
        let dir = TempDir::new().unwrap();
        let empty = write_log(dir.path(), "empty.log", b"");
        let marker = dir.path().join("hook-ran");
        let mut group = testing::group(dir.path());
        group.shared_scripts = false;
        group.prerotate = vec![format!("touch {}", marker.display())];

        let report = Rotator::with_clock(group, frozen())
            .unwrap()
            .rotate()
            .await
            .unwrap();

        assert!(empty.exists());
        assert!(!dir.path().join("logs/empty.log-rotates").exists());
        assert!(!marker.exists());
        assert_eq!(report.rotated, 0);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_failing_prerotate_rotates_nothing() {
        let dir = TempDir::new().unwrap();
        let source = write_log(dir.path(), "access.log", b"GET /\n");
        let mut group = testing::group(dir.path());
        group.prerotate = vec!["echo prerotate && [ 0 -eq 1 ]".to_string()];

        let err = Rotator::with_clock(group, frozen())
            .unwrap()
            .rotate()
            .await
            .unwrap_err();

        match err {
            Error::HookFailed { code, stdout, .. } => {
                assert_ne!(code, 0);
                assert!(stdout.contains("prerotate"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(source.exists());
        assert!(!dir.path().join("logs/access.log-rotates").exists());
    }

    #[tokio::test]
    async fn test_per_file_hooks_see_the_file() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), "a.log", b"a\n");
        write_log(dir.path(), "b.log", b"b\n");
        let out = dir.path().join("hooks.out");
        let mut group = testing::group(dir.path());
        group.shared_scripts = false;
        group.prerotate = vec![format!(
            "echo \"pre $(basename $LOGROT_FILE)\" >> {}",
            out.display()
        )];
        group.postrotate = vec![format!(
            "echo \"post $(basename $LOGROT_FILE)\" >> {}",
            out.display()
        )];

        Rotator::with_clock(group, frozen())
            .unwrap()
            .rotate()
            .await
            .unwrap();

        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "pre a.log\npost a.log\npre b.log\npost b.log\n"
        );
    }

    #[tokio::test]
    async fn test_overlapping_patterns_rotate_once_and_finish_the_run() {
        let dir = TempDir::new().unwrap();
        let source = write_log(dir.path(), "access.log", b"GET /\n");
        let marker = dir.path().join("postrotate-ran");
        let mut group = testing::group(dir.path());
        group.paths.push(source.display().to_string());
        group.postrotate = vec![format!("touch {}", marker.display())];

        let report = Rotator::with_clock(group.clone(), frozen())
            .unwrap()
            .rotate()
            .await
            .unwrap();

        assert_eq!(report.rotated, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 1);
        assert!(marker.exists());
        assert!(archived(dir.path(), "access.log").exists());

        let queue = WorkQueue::open(&group.queue).await.unwrap();
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_later_files_reuse_the_run_timestamp() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), "a.log", b"a\n");
        write_log(dir.path(), "b.log", b"b\n");
        let mut group = testing::group(dir.path());
        group.shared_scripts = false;
        // Wall-clock time moves on between the two files
        group.prerotate = vec!["sleep 1".to_string()];

        let rotator = Rotator::new(group).unwrap();
        let stamp = rotator.namer().timestamp().to_string();
        let archive = rotator.namer().archive_dir(&dir.path().join("logs/b.log"));
        rotator.rotate().await.unwrap();

        let a_archive = rotator.namer().archive_dir(&dir.path().join("logs/a.log"));
        assert!(a_archive.join(format!("a.log-{}", stamp)).exists());
        assert!(archive.join(format!("b.log-{}", stamp)).exists());
    }

    #[tokio::test]
    async fn test_shared_hooks_run_once() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), "a.log", b"a\n");
        write_log(dir.path(), "b.log", b"b\n");
        let out = dir.path().join("hooks.out");
        let mut group = testing::group(dir.path());
        group.prerotate = vec![format!("echo pre >> {}", out.display())];
        group.postrotate = vec![format!("echo post >> {}", out.display())];

        let report = Rotator::with_clock(group, frozen())
            .unwrap()
            .rotate()
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), "pre\npost\n");
        assert_eq!(report.rotated, 2);
    }

    #[tokio::test]
    async fn test_copy_and_upload() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), "access.log", b"GET /\n");
        let logs = dir.path().join("logs").display().to_string();
        let mut group = testing::group(dir.path());
        group.copy = vec![CopyRule::new(
            logs.clone(),
            dir.path().join("mirror").display().to_string(),
        )];
        group.copy_to_remote = vec![CopyRule::new(logs, "/logs/web1")];
        let remote = MockRemoteStore::new();

        Rotator::with_clock(group, frozen())
            .unwrap()
            .with_remote(Arc::new(remote.clone()))
            .rotate()
            .await
            .unwrap();

        let mirrored = dir
            .path()
            .join("mirror/access.log-rotates/201711/13/access.log-20171113112233");
        assert_eq!(fs::read(&mirrored).unwrap(), b"GET /\n");
        assert!(
            remote
                .was_uploaded("/logs/web1/access.log-rotates/201711/13/access.log-20171113112233")
                .await
        );
    }

    #[tokio::test]
    async fn test_leftover_records_are_processed() {
        let dir = TempDir::new().unwrap();
        let group = testing::group(dir.path());

        // A previous run renamed a file and crashed before post-processing
        let leftover = dir.path().join("logs/old.log-rotates/old.log-20171112000000");
        fs::create_dir_all(leftover.parent().unwrap()).unwrap();
        fs::write(&leftover, b"old\n").unwrap();
        let queue = WorkQueue::open(&group.queue).await.unwrap();
        queue
            .enqueue(
                &group.name,
                &RotatedFileRecord::new(dir.path().join("logs/old.log"), &leftover),
            )
            .await
            .unwrap();
        queue.close().await;

        let mut group = group;
        group.compress = true;
        let report = Rotator::with_clock(group.clone(), frozen())
            .unwrap()
            .rotate()
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert!(!leftover.exists());
        let mut gz = leftover.into_os_string();
        gz.push(".gz");
        assert!(PathBuf::from(gz).exists());

        let queue = WorkQueue::open(&group.queue).await.unwrap();
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_retention_after_rotation() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), "access.log", b"GET /\n");
        let mut group = testing::group(dir.path());
        group.keep = Some(2);

        let archive = dir.path().join("logs/access.log-rotates/201711/13");
        fs::create_dir_all(&archive).unwrap();
        for name in [
            "access.log-20171113000001",
            "access.log-20171113000002",
            "access.log-20171113000003",
            "access.log-unparseable",
        ] {
            fs::write(archive.join(name), b"x").unwrap();
        }

        let report = Rotator::with_clock(group, frozen())
            .unwrap()
            .rotate()
            .await
            .unwrap();

        assert_eq!(report.pruned, 2);
        assert!(archive.join("access.log-20171113112233").exists());
        assert!(archive.join("access.log-20171113000003").exists());
        assert!(!archive.join("access.log-20171113000002").exists());
        assert!(!archive.join("access.log-20171113000001").exists());
        assert!(archive.join("access.log-unparseable").exists());
    }

    #[test]
    fn test_remote_requires_rules() {
        let dir = TempDir::new().unwrap();
        let mut group = testing::group(dir.path());
        group.remote = Some(RemoteConfig {
            url: "http://namenode:50070".to_string(),
            user: None,
            timeout_secs: 5,
        });

        let rotator = Rotator::with_clock(group.clone(), frozen()).unwrap();
        assert!(rotator.remote.is_none());

        group.copy_to_remote = vec![CopyRule::new("/var/log", "/logs")];
        let rotator = Rotator::with_clock(group, frozen()).unwrap();
        assert!(rotator.remote.is_some());
    }

    #[test]
    fn test_report_display() {
        let mut report = RotationReport::new("web");
        report.rotated = 3;
        report.pruned = 1;
        assert_eq!(
            report.to_string(),
            "web: rotated 3, skipped 0, processed 0, failed 0, pruned 1"
        );
    }
}
