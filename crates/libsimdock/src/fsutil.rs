//! Small filesystem helpers shared by session provisioning and snapshots.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::SimdockError;

/// Deep-copy a directory tree. The destination must not already contain
/// conflicting files; existing directories are reused.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<(), SimdockError> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            SimdockError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("walkdir loop")
            }))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under src");
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
        // Symlinks are intentionally not reproduced inside session roots.
    }
    Ok(())
}

/// Recursively delete a directory, reporting failure as a boolean instead of
/// an error. Used for cleanup paths that are advertised as best-effort.
pub fn remove_tree_best_effort(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove directory tree");
            false
        }
    }
}
