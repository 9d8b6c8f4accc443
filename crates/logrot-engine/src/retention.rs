//! Retention pruning of rotated siblings

use logrot_core::{PathNamer, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Deletes rotated copies of a source beyond the newest `keep`.
///
/// Only entries of the current archive directory named `<basename>-<marker>`
/// whose marker parses with the group's date format take part; anything else
/// is neither counted nor deleted.
pub struct RetentionPruner<'a> {
    namer: &'a PathNamer,
    keep: usize,
    suffix: Option<String>,
}

impl<'a> RetentionPruner<'a> {
    /// `suffix` is the compressed extension stripped before parsing markers
    pub fn new(namer: &'a PathNamer, keep: usize, suffix: Option<String>) -> Self {
        Self {
            namer,
            keep,
            suffix,
        }
    }

    /// Prune the siblings of `source` and return the deleted paths
    pub fn prune(&self, source: &Path) -> Result<Vec<PathBuf>> {
        let archive = self.namer.archive_dir(source);
        if !archive.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = match source.file_name().and_then(|n| n.to_str()) {
            Some(name) => format!("{}-", name),
            None => return Ok(Vec::new()),
        };

        let mut names: Vec<PathBuf> = fs::read_dir(&archive)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(&prefix))
            })
            .collect();
        names.sort();

        let mut dated: Vec<_> = names
            .into_iter()
            .filter_map(|path| {
                let time = self.namer.rotated_time(&path, self.suffix.as_deref());
                if time.is_none() {
                    debug!("Ignoring {} for retention, no parseable marker", path.display());
                }
                time.map(|t| (t, path))
            })
            .collect();

        // Newest first; sort_by is stable so equal markers keep listing order
        dated.sort_by(|a, b| b.0.cmp(&a.0));

        let mut removed = Vec::new();
        for (_, path) in dated.into_iter().skip(self.keep) {
            fs::remove_file(&path)?;
            info!("Pruned {}", path.display());
            removed.push(path);
        }

        Ok(removed)
    }
}
