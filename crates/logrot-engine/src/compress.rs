//! Compression of rotated files through an external compressor

use logrot_core::{Compression, Error, Result};
use logrot_exec::CommandExecutor;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Runs `<command> -kf <file>`, keeping the input and producing `<file><extension>`
#[derive(Clone)]
pub struct Compressor {
    executor: Arc<dyn CommandExecutor>,
    compression: Compression,
}

impl Compressor {
    pub fn new(executor: Arc<dyn CommandExecutor>, compression: Compression) -> Self {
        Self {
            executor,
            compression,
        }
    }

    /// Compress `path` and return the compressed file's path
    pub async fn compress(&self, path: &Path) -> Result<PathBuf> {
        let mut parts = self.compression.command.split_whitespace();
        let program = parts.next().ok_or_else(|| Error::CompressFailed {
            path: path.to_path_buf(),
            reason: "empty compressor command".to_string(),
        })?;

        let mut args: Vec<&OsStr> = parts.map(OsStr::new).collect();
        args.push(OsStr::new("-kf"));
        args.push(path.as_os_str());

        let output = self.executor.run_program(program, &args).await?;
        if !output.success() {
            return Err(Error::CompressFailed {
                path: path.to_path_buf(),
                reason: format!("{} exited with {}: {}", program, output.code, output.stderr.trim()),
            });
        }

        let compressed = self.compression.compressed_path(path);
        if !compressed.exists() {
            return Err(Error::CompressFailed {
                path: path.to_path_buf(),
                reason: format!("{} did not produce {}", program, compressed.display()),
            });
        }

        debug!("Compressed {} -> {}", path.display(), compressed.display());
        Ok(compressed)
    }
}
