//! Path-safety helpers. Every file-touching operation in the crate routes
//! through [`resolve_inside`] before reaching the filesystem.

use std::path::{Component, Path, PathBuf};

use crate::error::SimdockError;

/// Normalize a relative path string to forward-slash form without leading
/// separators.
pub fn normalize_rel(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Resolve `rel` under `root` and ensure the result stays inside `root`.
///
/// The relative path is normalized lexically (`.` dropped, `..` popped) and
/// any `..` that would climb above `root` is rejected, never clamped. If the
/// resolved path already exists, its canonical form is checked again so that
/// a symlink inside the tree cannot point back out of it.
pub fn resolve_inside(root: &Path, rel: &str) -> Result<PathBuf, SimdockError> {
    let root = root.canonicalize()?;
    let rel = normalize_rel(rel);

    let mut resolved = root.clone();
    let mut depth = 0usize;
    for component in Path::new(&rel).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(SimdockError::PathEscape(PathBuf::from(rel)));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SimdockError::PathEscape(PathBuf::from(rel)));
            }
        }
    }

    // Re-check the nearest existing ancestor so symlinks resolve before the
    // containment decision.
    let mut probe = resolved.clone();
    while !probe.exists() {
        if !probe.pop() {
            break;
        }
    }
    if probe.exists() {
        let canonical = probe.canonicalize()?;
        if !canonical.starts_with(&root) {
            return Err(SimdockError::PathEscape(resolved));
        }
    }

    Ok(resolved)
}
