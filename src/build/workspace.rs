//! Run-scoped working directories

use crate::core::error::PublishError;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Remove `path` and everything below it
///
/// Read-only files and directories are made writable first so the recursive
/// delete cannot be blocked by them. Returns `false` when `path` did not exist.
pub fn clear_directory(path: &Path) -> Result<bool, PublishError> {
    if !path.exists() {
        return Ok(false);
    }

    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| PublishError::io(path, e))?;
        make_writable(entry.path())?;
    }

    fs::remove_dir_all(path).map_err(|e| PublishError::io(path, e))?;
    info!(path = %path.display(), "cleared working directory");
    Ok(true)
}

fn make_writable(path: &Path) -> Result<(), PublishError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| PublishError::io(path, e))?;
    if metadata.file_type().is_symlink() {
        return Ok(());
    }

    let mut permissions = metadata.permissions();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = permissions.mode();
        let wanted = if metadata.is_dir() { mode | 0o700 } else { mode | 0o200 };
        if wanted == mode {
            return Ok(());
        }
        permissions.set_mode(wanted);
    }

    #[cfg(not(unix))]
    {
        if !permissions.readonly() {
            return Ok(());
        }
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
    }

    debug!(path = %path.display(), "resetting permissions");
    fs::set_permissions(path, permissions).map_err(|e| PublishError::io(path, e))
}
