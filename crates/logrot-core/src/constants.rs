//! Constants and default values for logrot

/// Default permission mode applied to rotated files
pub const DEFAULT_MODE: &str = "0o644";

/// Default owner of rotated files and archive directories
pub const DEFAULT_USER: &str = "root";

/// Default group of rotated files and archive directories
pub const DEFAULT_GROUP: &str = "root";

/// Default compressor program
pub const DEFAULT_COMPRESS_CMD: &str = "gzip";

/// Default suffix produced by the compressor
pub const DEFAULT_COMPRESS_EXT: &str = ".gz";

/// Default strftime pattern for the `{timestamp}` field
pub const DEFAULT_DATEFORMAT: &str = "%Y%m%d";

/// Default archive directory template, appended to the source path
pub const DEFAULT_DESTEXT: &str = "rotates/%Y%m/%d";

/// Default rotated filename template
pub const DEFAULT_FNFORMAT: &str = "{logname}-{timestamp}";

/// Default durable queue directory
pub const DEFAULT_QUEUE_PATH: &str = "/tmp/logrot-queue";

/// Queue database file name inside the queue directory
pub const QUEUE_DB_FILE: &str = "queue.db";

/// Default number of pending records before enqueue blocks
pub const DEFAULT_QUEUE_CHUNKSIZE: usize = 1000;

/// Default enqueue block timeout in seconds
pub const DEFAULT_QUEUE_TIMEOUT_SECS: u64 = 30;

/// Mode of created archive and mirror directories (rwxr-xr-x)
pub const ARCHIVE_DIR_MODE: u32 = 0o755;

/// Default WebHDFS request timeout in seconds
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 60;

/// Environment variable exported to hooks with the hook phase
pub const ENV_HOOK_PHASE: &str = "LOGROT_PHASE";

/// Environment variable exported to hooks with the group name
pub const ENV_HOOK_GROUP: &str = "LOGROT_GROUP";

/// Environment variable exported to per-file hooks with the source path
pub const ENV_HOOK_FILE: &str = "LOGROT_FILE";
