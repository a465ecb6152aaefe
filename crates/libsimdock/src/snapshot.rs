//! Named snapshots of session workspaces, plus the per-session backup slot
//! written just before a snapshot load replaces the live root.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};

use crate::error::SimdockError;
use crate::fsutil::{copy_tree, remove_tree_best_effort};

/// The single backup slot for a session root: a sibling directory with a
/// `.bak` suffix. Overwritten on every snapshot load; not versioned.
pub fn backup_slot(root: &Path) -> PathBuf {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    root.with_file_name(format!("{name}.bak"))
}

/// Strip path separators and control characters from a human-chosen
/// snapshot name; fall back to a default when nothing survives.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control() && *c != '/' && *c != '\\')
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "project".to_string()
    } else {
        cleaned
    }
}

/// Persistent store of named workspace snapshots.
pub struct SnapshotStore {
    saved_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(saved_dir: PathBuf) -> Result<Self, SimdockError> {
        fs::create_dir_all(&saved_dir)?;
        Ok(Self { saved_dir })
    }

    /// Resolve a snapshot name inside the saved area, rejecting anything
    /// that is not a single plain path component.
    fn resolve_name(&self, name: &str) -> Result<PathBuf, SimdockError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => {}
            _ => return Err(SimdockError::PathEscape(PathBuf::from(name))),
        }
        Ok(self.saved_dir.join(name))
    }

    /// Deep-copy a session root into the saved area under a sanitized name,
    /// replacing any snapshot that already carries it.
    pub fn save(&self, session_root: &Path, name: &str) -> Result<PathBuf, SimdockError> {
        if !session_root.is_dir() {
            return Err(SimdockError::NotFound(
                session_root.to_string_lossy().into_owned(),
            ));
        }
        let safe = sanitize_name(name);
        let dest = self.resolve_name(&safe)?;
        if dest.exists() {
            fs::remove_dir_all(&dest)?;
        }
        copy_tree(session_root, &dest)?;
        info!(snapshot = %safe, "workspace snapshot saved");
        Ok(dest)
    }

    /// Replace a session root with the named snapshot.
    ///
    /// Ordering matters: the live root is copied to the backup slot first,
    /// then deleted, then the snapshot is copied in. A failure between steps
    /// leaves either the original root or a recoverable backup, never a
    /// truncated root with nothing to fall back to.
    pub fn load(&self, session_root: &Path, name: &str) -> Result<(), SimdockError> {
        let src = self.resolve_name(name)?;
        if !src.is_dir() {
            return Err(SimdockError::SnapshotMissing(name.to_string()));
        }

        if session_root.exists() {
            let slot = backup_slot(session_root);
            if slot.exists() {
                fs::remove_dir_all(&slot)?;
            }
            copy_tree(session_root, &slot)?;
            fs::remove_dir_all(session_root)?;
        }
        copy_tree(&src, session_root)?;
        info!(snapshot = %name, root = %session_root.display(), "workspace snapshot loaded");
        Ok(())
    }

    /// Replace a session root with the contents of its backup slot, using
    /// the same backup-then-swap ordering as `load`.
    pub fn restore_backup(&self, session_root: &Path) -> Result<(), SimdockError> {
        let slot = backup_slot(session_root);
        if !slot.is_dir() {
            return Err(SimdockError::BackupMissing);
        }

        if session_root.exists() {
            fs::remove_dir_all(session_root)?;
        }
        copy_tree(&slot, session_root)?;
        info!(root = %session_root.display(), "workspace restored from backup slot");
        Ok(())
    }

    /// Delete a named snapshot. `Ok(false)` when it does not exist, so
    /// callers can tell "nothing to delete" apart from real I/O failures.
    pub fn delete(&self, name: &str) -> Result<bool, SimdockError> {
        let target = self.resolve_name(name)?;
        if !target.is_dir() {
            return Ok(false);
        }
        if !remove_tree_best_effort(&target) {
            warn!(snapshot = %name, "failed to delete snapshot");
            return Err(SimdockError::Io(std::io::Error::other(
                "snapshot delete failed",
            )));
        }
        info!(snapshot = %name, "snapshot deleted");
        Ok(true)
    }

    /// Sorted names of all saved snapshots.
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.saved_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::scan_files;
    use tempfile::TempDir;

    fn session_root(base: &TempDir) -> PathBuf {
        let root = base.path().join("sess-abcd1234");
        fs::create_dir_all(root.join("project/config")).unwrap();
        fs::write(root.join("project/config/base.yaml"), "a: 1\n").unwrap();
        root
    }

    fn store(base: &TempDir) -> SnapshotStore {
        SnapshotStore::new(base.path().join("saved")).unwrap()
    }

    #[test]
    fn sanitize_strips_controls_and_separators() {
        assert_eq!(sanitize_name("  demo\r\n  "), "demo");
        assert_eq!(sanitize_name("/demo/"), "demo");
        assert_eq!(sanitize_name("   "), "project");
        assert_eq!(sanitize_name(""), "project");
    }

    #[test]
    fn save_then_list_roundtrip() {
        let base = TempDir::new().unwrap();
        let root = session_root(&base);
        let snaps = store(&base);

        snaps.save(&root, "demo").unwrap();
        assert_eq!(snaps.list(), vec!["demo"]);
    }

    #[test]
    fn save_overwrites_existing_name() {
        let base = TempDir::new().unwrap();
        let root = session_root(&base);
        let snaps = store(&base);

        snaps.save(&root, "demo").unwrap();
        fs::write(root.join("extra.yaml"), "b: 2\n").unwrap();
        let dest = snaps.save(&root, "demo").unwrap();

        // Full replace, not a merge.
        assert!(dest.join("extra.yaml").is_file());
        assert_eq!(snaps.list(), vec!["demo"]);
    }

    #[test]
    fn load_restores_saved_state_and_backs_up_live_root() {
        let base = TempDir::new().unwrap();
        let root = session_root(&base);
        let snaps = store(&base);

        snaps.save(&root, "demo").unwrap();
        let saved_listing = scan_files(&root);

        // Mutate the live root after saving.
        fs::write(root.join("scratch.yaml"), "tmp: true\n").unwrap();
        let mutated_listing = scan_files(&root);

        snaps.load(&root, "demo").unwrap();
        assert_eq!(scan_files(&root), saved_listing);

        // The backup slot holds the pre-load state.
        snaps.restore_backup(&root).unwrap();
        assert_eq!(scan_files(&root), mutated_listing);
    }

    #[test]
    fn load_missing_snapshot_is_an_error() {
        let base = TempDir::new().unwrap();
        let root = session_root(&base);
        let snaps = store(&base);

        let result = snaps.load(&root, "never-saved");
        assert!(matches!(result, Err(SimdockError::SnapshotMissing(_))));
        // Live root untouched.
        assert!(root.join("project/config/base.yaml").is_file());
    }

    #[test]
    fn restore_without_backup_is_an_error() {
        let base = TempDir::new().unwrap();
        let root = session_root(&base);
        let snaps = store(&base);

        let result = snaps.restore_backup(&root);
        assert!(matches!(result, Err(SimdockError::BackupMissing)));
    }

    #[test]
    fn delete_missing_snapshot_returns_false() {
        let base = TempDir::new().unwrap();
        let snaps = store(&base);
        assert!(!snaps.delete("ghost").unwrap());
    }

    #[test]
    fn delete_does_not_touch_other_snapshots() {
        let base = TempDir::new().unwrap();
        let root = session_root(&base);
        let snaps = store(&base);

        snaps.save(&root, "keep").unwrap();
        snaps.save(&root, "drop").unwrap();
        assert!(snaps.delete("drop").unwrap());
        assert_eq!(snaps.list(), vec!["keep"]);
    }

    #[test]
    fn names_with_separators_or_dotdot_are_rejected() {
        let base = TempDir::new().unwrap();
        let snaps = store(&base);

        assert!(matches!(
            snaps.delete("../escape"),
            Err(SimdockError::PathEscape(_))
        ));
        assert!(matches!(
            snaps.delete("a/b"),
            Err(SimdockError::PathEscape(_))
        ));
        let root = session_root(&base);
        assert!(matches!(
            snaps.load(&root, ".."),
            Err(SimdockError::PathEscape(_))
        ));
    }
}
