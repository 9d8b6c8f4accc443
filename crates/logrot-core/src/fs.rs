//! Filesystem and identity helpers shared by the rotation stages

use nix::errno::Errno;
use nix::unistd::{Gid, Group, Uid, User};
use std::fs::{self, FileTimes};
use std::io::ErrorKind;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::Ownership;

/// Look up a user name and return its uid
pub fn resolve_user(name: &str) -> Result<u32> {
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(Error::config(format!("Unknown user: {}", name))),
        Err(e) => Err(Error::config(format!("Failed to look up user {}: {}", name, e))),
    }
}

/// Look up a group name and return its gid
pub fn resolve_group(name: &str) -> Result<u32> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(Error::config(format!("Unknown group: {}", name))),
        Err(e) => Err(Error::config(format!("Failed to look up group {}: {}", name, e))),
    }
}

/// Local host name, falling back to `localhost`
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Change ownership, tolerating missing privileges.
///
/// EPERM and EACCES are logged and discarded; any other failure is returned.
pub fn chown_best_effort(path: &Path, ownership: Ownership) -> Result<()> {
    if ownership.is_unchanged() {
        return Ok(());
    }

    let uid = ownership.uid.map(Uid::from_raw);
    let gid = ownership.gid.map(Gid::from_raw);
    match nix::unistd::chown(path, uid, gid) {
        Ok(()) => Ok(()),
        Err(errno @ (Errno::EPERM | Errno::EACCES)) => {
            warn!("Ignoring chown failure on {}: {}", path.display(), errno);
            Ok(())
        }
        Err(errno) => Err(Error::IoError(std::io::Error::from(errno))),
    }
}

/// Apply an octal permission mode
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Create a directory tree if missing, applying mode and ownership to the leaf
pub fn ensure_dir(path: &Path, mode: u32, ownership: Ownership) -> Result<()> {
    if !path.is_dir() {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        builder.mode(mode);
        builder.create(path)?;
        debug!("Created directory {}", path.display());
    }
    chown_best_effort(path, ownership)
}

/// Move a file, falling back to copy and remove across filesystems
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(Errno::EXDEV as i32) => {
            debug!("Cross-device move of {}, copying instead", from.display());
            copy_preserving(from, to)?;
            fs::remove_file(from)?;
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::FileNotFound(from.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}

/// Copy a file keeping its permissions and access/modification times
pub fn copy_preserving(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)?;
    let meta = fs::metadata(from)?;
    let times = FileTimes::new()
        .set_accessed(meta.accessed()?)
        .set_modified(meta.modified()?);
    fs::File::options().write(true).open(to)?.set_times(times)?;
    Ok(())
}

/// Whether the path is a regular file of zero length
pub fn is_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() == 0)
        .unwrap_or(false)
}
