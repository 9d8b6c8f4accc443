//! Glob expansion of a group's path patterns

use logrot_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Expand every pattern in order and return the matching regular files.
///
/// Results are absolute and not deduplicated: a file matched by two patterns
/// appears twice. Unreadable entries are logged and skipped.
pub fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let cwd = std::env::current_dir().ok();
    let mut files = Vec::new();

    for pattern in patterns {
        let entries = glob::glob(pattern)
            .map_err(|e| Error::config(format!("Invalid path pattern '{}': {}", pattern, e)))?;

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable entry for '{}': {}", pattern, e);
                    continue;
                }
            };

            if !is_regular_file(&path) {
                debug!("Ignoring non-regular file {}", path.display());
                continue;
            }

            files.push(absolute(path, cwd.as_deref()));
        }
    }

    Ok(files)
}

fn absolute(path: PathBuf, cwd: Option<&Path>) -> PathBuf {
    match cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path,
    }
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
