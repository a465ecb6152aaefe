//! Orphan sweeper: reclaims session directories left behind by crashed or
//! abandoned clients.
//!
//! Race-tolerant by design: a session created concurrently with a sweep may
//! or may not survive depending on scheduling. Sweeps are maintenance
//! operations, not safety-critical ones.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::fsutil::remove_tree_best_effort;
use crate::session::SESSION_DIR_PREFIX;

/// Delete every directory in the temp area that follows the session naming
/// convention but does not belong to a live session. Backup slots
/// (`<name>.bak`) share the prefix and are swept by the same rule. Returns
/// the removed directory names.
pub fn sweep_unused(temp_dir: &Path, live_names: &HashSet<String>) -> Vec<String> {
    sweep_matching(temp_dir, |name| {
        let base = name.strip_suffix(".bak").unwrap_or(name);
        !live_names.contains(base)
    })
}

/// Delete every session-convention directory regardless of liveness.
pub fn sweep_all(temp_dir: &Path) -> Vec<String> {
    sweep_matching(temp_dir, |_| true)
}

fn sweep_matching(temp_dir: &Path, should_remove: impl Fn(&str) -> bool) -> Vec<String> {
    let Ok(entries) = fs::read_dir(temp_dir) else {
        return Vec::new();
    };

    let mut removed = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(SESSION_DIR_PREFIX) || !should_remove(&name) {
            continue;
        }
        if remove_tree_best_effort(&path) {
            removed.push(name);
        }
    }

    removed.sort();
    if !removed.is_empty() {
        info!(count = removed.len(), "swept orphaned session directories");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sweeps_only_orphaned_session_dirs() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sess-live0000")).unwrap();
        fs::create_dir(temp.path().join("sess-dead0000")).unwrap();
        fs::create_dir(temp.path().join("unrelated")).unwrap();

        let live: HashSet<String> = ["sess-live0000".to_string()].into();
        let removed = sweep_unused(temp.path(), &live);

        assert_eq!(removed, vec!["sess-dead0000"]);
        assert!(temp.path().join("sess-live0000").exists());
        assert!(temp.path().join("unrelated").exists());
    }

    #[test]
    fn backup_slot_follows_its_session() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sess-live0000")).unwrap();
        fs::create_dir(temp.path().join("sess-live0000.bak")).unwrap();
        fs::create_dir(temp.path().join("sess-dead0000.bak")).unwrap();

        let live: HashSet<String> = ["sess-live0000".to_string()].into();
        let removed = sweep_unused(temp.path(), &live);

        assert_eq!(removed, vec!["sess-dead0000.bak"]);
        assert!(temp.path().join("sess-live0000.bak").exists());
    }

    #[test]
    fn sweep_all_removes_every_session_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sess-a1b2c3d4")).unwrap();
        fs::create_dir(temp.path().join("sess-e5f6a7b8")).unwrap();
        fs::create_dir(temp.path().join("keepme")).unwrap();

        let removed = sweep_all(temp.path());
        assert_eq!(removed, vec!["sess-a1b2c3d4", "sess-e5f6a7b8"]);
        assert!(temp.path().join("keepme").exists());
    }

    #[test]
    fn missing_temp_dir_is_empty_sweep() {
        let removed = sweep_unused(Path::new("/nonexistent-simdock-temp"), &HashSet::new());
        assert!(removed.is_empty());
    }
}
