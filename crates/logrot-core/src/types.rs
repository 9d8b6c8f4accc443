//! Core types for logrot

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Resolved numeric ownership applied to rotated files and directories.
///
/// `None` leaves the corresponding id unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ownership {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl Ownership {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid: Some(uid),
            gid: Some(gid),
        }
    }

    /// Ownership that never changes anything
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn is_unchanged(&self) -> bool {
        self.uid.is_none() && self.gid.is_none()
    }
}

/// A prefix substitution rule used for local mirrors and remote uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRule {
    /// Prefix a path must start with to be eligible
    #[serde(default)]
    pub from: String,
    /// Replacement prefix; a rule without one does nothing
    #[serde(default)]
    pub to: Option<String>,
}

impl CopyRule {
    pub fn new<F: Into<String>, T: Into<String>>(from: F, to: T) -> Self {
        Self {
            from: from.into(),
            to: Some(to.into()),
        }
    }

    /// Compute the destination for `path`, or `None` if the rule does not apply
    pub fn destination(&self, path: &Path) -> Option<PathBuf> {
        let to = self.to.as_deref().filter(|t| !t.is_empty())?;
        let path = path.to_str()?;
        let rest = path.strip_prefix(self.from.as_str())?;
        Some(normalize_path(Path::new(&format!("{}{}", to, rest))))
    }
}

/// Lexically normalize a path: drop `.` segments, resolve `..`, collapse separators
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Compression settings for a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compression {
    /// Compressor program, invoked as `<command> -kf <file>`
    pub command: String,
    /// Suffix the compressor appends
    pub extension: String,
}

impl Compression {
    pub fn compressed_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(&self.extension);
        PathBuf::from(name)
    }
}

/// WebHDFS connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Name node base URL, e.g. `http://namenode:50070`
    pub url: String,
    /// User name passed as `user.name`
    #[serde(default)]
    pub user: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

fn default_remote_timeout() -> u64 {
    crate::constants::DEFAULT_REMOTE_TIMEOUT_SECS
}

/// Naming templates for archive directories and rotated files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplates {
    pub dateformat: String,
    pub destext: String,
    pub fnformat: String,
}

/// Durable queue settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Directory holding the queue database
    pub path: PathBuf,
    /// Pending records allowed before enqueue blocks
    pub chunk_size: usize,
    /// How long enqueue may block
    pub block_timeout: Duration,
}

/// One fully resolved rotation group
#[derive(Debug, Clone)]
pub struct RotationGroup {
    pub name: String,
    pub paths: Vec<String>,
    pub mode: u32,
    pub user: String,
    pub group: String,
    pub ownership: Ownership,
    pub compress: bool,
    pub compression: Compression,
    pub copy: Vec<CopyRule>,
    pub copy_to_remote: Vec<CopyRule>,
    pub remote: Option<RemoteConfig>,
    pub naming: NamingTemplates,
    pub shared_scripts: bool,
    pub prerotate: Vec<String>,
    pub postrotate: Vec<String>,
    pub queue: QueueSettings,
    /// Number of rotated copies to keep; `None` disables pruning
    pub keep: Option<usize>,
}

impl RotationGroup {
    /// Whether remote uploads can happen for this group
    pub fn uploads_enabled(&self) -> bool {
        self.remote.is_some() && !self.copy_to_remote.is_empty()
    }
}

/// A rotated file waiting for post-processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedFileRecord {
    /// Where the log lived before rotation
    pub original: PathBuf,
    /// Where it was moved to
    pub rotated: PathBuf,
}

impl RotatedFileRecord {
    pub fn new<O: Into<PathBuf>, R: Into<PathBuf>>(original: O, rotated: R) -> Self {
        Self {
            original: original.into(),
            rotated: rotated.into(),
        }
    }
}
