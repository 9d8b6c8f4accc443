//! Database schema for the durable work queue

/// SQLite schema initialization
///
/// Paths are stored as raw bytes so non-UTF-8 file names survive the round trip.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_name TEXT NOT NULL,
    original_path BLOB NOT NULL,
    rotated_path BLOB NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    enqueued_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_jobs_group ON jobs(group_name);
"#;
