//! logrot Queue - SQLite-backed durable work queue
//!
//! Rotated files are recorded here between the rename and the post-processing
//! stage. A record is deleted only when it is acknowledged, so anything left
//! behind by a crashed run is delivered again by the next drain.

pub mod schema;

use logrot_core::{Error, QueueSettings, Result, RotatedFileRecord, QUEUE_DB_FILE};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// How often a blocked enqueue re-checks for a free slot
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A record handed out by a drain, waiting to be acknowledged or released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: i64,
    /// Group that enqueued the record
    pub group: String,
    pub record: RotatedFileRecord,
    /// Failed processing attempts before this delivery
    pub attempts: u32,
}

/// Durable FIFO of rotated files awaiting post-processing
pub struct WorkQueue {
    pool: SqlitePool,
    capacity: usize,
    block_timeout: Duration,
}

impl WorkQueue {
    /// Open (or create) the queue stored under `settings.path`
    pub async fn open(settings: &QueueSettings) -> Result<Self> {
        std::fs::create_dir_all(&settings.path).map_err(|e| {
            Error::queue(format!(
                "Failed to create queue directory {}: {}",
                settings.path.display(),
                e
            ))
        })?;

        let db_path = settings.path.join(QUEUE_DB_FILE);
        debug!("Opening work queue: {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(settings.block_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::queue(e.to_string()))?;

        sqlx::query(schema::SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::queue(e.to_string()))?;

        Ok(Self {
            pool,
            capacity: settings.chunk_size,
            block_timeout: settings.block_timeout,
        })
    }

    /// Durably append a record for `group`.
    ///
    /// Blocks while the queue holds `chunk_size` or more records and fails with
    /// [`Error::QueueFull`] once the block timeout elapses.
    pub async fn enqueue(&self, group: &str, record: &RotatedFileRecord) -> Result<i64> {
        self.wait_for_slot().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (group_name, original_path, rotated_path)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(group)
        .bind(record.original.as_os_str().as_bytes())
        .bind(record.rotated.as_os_str().as_bytes())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::queue(e.to_string()))?;

        let id = result.last_insert_rowid();
        debug!("Enqueued job {} for {}", id, record.rotated.display());
        Ok(id)
    }

    async fn wait_for_slot(&self) -> Result<()> {
        let deadline = Instant::now() + self.block_timeout;
        loop {
            if (self.len().await? as usize) < self.capacity {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::QueueFull {
                    timeout_secs: self.block_timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Start draining every pending record, oldest first.
    ///
    /// Records are not filtered by group: a record left behind under a group
    /// name that no longer exists is still redelivered.
    pub fn drain(&self) -> Drain<'_> {
        Drain {
            queue: self,
            cursor: 0,
        }
    }

    /// Oldest record with an id greater than `cursor`
    pub async fn next_after(&self, cursor: i64) -> Result<Option<Delivery>> {
        let row = sqlx::query(
            r#"
            SELECT id, group_name, original_path, rotated_path, attempts
            FROM jobs
            WHERE id > ?
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(cursor)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::queue(e.to_string()))?;

        row.as_ref().map(row_to_delivery).transpose()
    }

    /// Mark a delivery as done, removing it from the queue
    pub async fn ack(&self, delivery: &Delivery) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(delivery.id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::queue(e.to_string()))?;
        Ok(())
    }

    /// Give a delivery back after a failed attempt; it is delivered again by a later drain
    pub async fn release(&self, delivery: &Delivery, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET attempts = attempts + 1,
                last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(delivery.id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::queue(e.to_string()))?;
        Ok(())
    }

    /// Number of records in the queue across all groups
    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::queue(e.to_string()))?;
        Ok(count as u64)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Number of records waiting for `group`
    pub async fn pending(&self, group: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE group_name = ?")
            .bind(group)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::queue(e.to_string()))?;
        Ok(count as u64)
    }

    /// Close the underlying connection
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Work queue closed");
    }
}

/// Non-blocking, single pass over the queued records.
///
/// Each record is yielded at most once per drain, so a released record waits
/// for the next run instead of spinning.
pub struct Drain<'a> {
    queue: &'a WorkQueue,
    cursor: i64,
}

impl Drain<'_> {
    /// Next record, or `None` once the queue holds nothing newer
    pub async fn next(&mut self) -> Result<Option<Delivery>> {
        let delivery = self.queue.next_after(self.cursor).await?;
        if let Some(d) = &delivery {
            self.cursor = d.id;
        }
        Ok(delivery)
    }
}

fn row_to_delivery(row: &SqliteRow) -> Result<Delivery> {
    let id: i64 = row.try_get("id").map_err(|e| Error::queue(e.to_string()))?;
    let group: String = row
        .try_get("group_name")
        .map_err(|e| Error::queue(e.to_string()))?;
    let original: Vec<u8> = row
        .try_get("original_path")
        .map_err(|e| Error::queue(e.to_string()))?;
    let rotated: Vec<u8> = row
        .try_get("rotated_path")
        .map_err(|e| Error::queue(e.to_string()))?;
    let attempts: i64 = row
        .try_get("attempts")
        .map_err(|e| Error::queue(e.to_string()))?;

    Ok(Delivery {
        id,
        group,
        record: RotatedFileRecord {
            original: PathBuf::from(OsString::from_vec(original)),
            rotated: PathBuf::from(OsString::from_vec(rotated)),
        },
        attempts: attempts as u32,
    })
}
