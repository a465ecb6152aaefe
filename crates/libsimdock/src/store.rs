//! Sandboxed file store: read/write/delete/list scoped to a session root.
//!
//! All operations resolve their target through [`paths::resolve_inside`]
//! first; nothing in this module touches a path that has not passed the
//! containment check.

use std::fs;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use simdock_protocol::{FileContent, FileListing};

use crate::error::SimdockError;
use crate::paths::{self, normalize_rel};

const BINARY_SUFFIXES: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "ico", "webp"];

fn suffix_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn is_yaml(suffix: &str) -> bool {
    suffix == "yaml" || suffix == "yml"
}

fn mime_hint(suffix: &str) -> &'static str {
    match suffix {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "html" => "text/html",
        "csv" => "text/csv",
        "yaml" | "yml" => "application/yaml",
        "json" => "application/json",
        _ => "text/plain",
    }
}

/// Read one file from a session root.
///
/// With `raw` unset, YAML documents are parsed and returned as structured
/// data and everything else comes back as text. With `raw` set, known binary
/// suffixes are base64-encoded and text files are returned verbatim, both
/// with a MIME hint.
pub fn read_file(root: &Path, rel: &str, raw: bool) -> Result<FileContent, SimdockError> {
    let target = paths::resolve_inside(root, rel)?;
    if !target.is_file() {
        return Err(SimdockError::NotFound(normalize_rel(rel)));
    }

    let display = normalize_rel(rel);
    let suffix = suffix_of(&target);

    if raw {
        if BINARY_SUFFIXES.contains(&suffix.as_str()) {
            let bytes = fs::read(&target)?;
            return Ok(FileContent::RawBinary {
                file: display,
                data_b64: BASE64.encode(bytes),
                mime: mime_hint(&suffix).to_string(),
                raw: true,
            });
        }
        let data = fs::read_to_string(&target)?;
        return Ok(FileContent::RawText {
            file: display,
            data,
            mime: mime_hint(&suffix).to_string(),
            raw: true,
        });
    }

    if is_yaml(&suffix) {
        let text = fs::read_to_string(&target)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&text)
            .map_err(|e| SimdockError::Serialize(e.to_string()))?;
        let data = serde_json::to_value(doc)
            .map_err(|e| SimdockError::Serialize(e.to_string()))?;
        return Ok(FileContent::Parsed { file: display, data });
    }

    let data = fs::read_to_string(&target)?;
    Ok(FileContent::Parsed {
        file: display,
        data: Value::String(data),
    })
}

/// Create or replace one file under a session root, creating parent
/// directories as needed.
///
/// String content is written verbatim; structured content is serialized
/// according to the target suffix (YAML for `.yaml`/`.yml`, JSON for
/// `.json`, stringified otherwise). Overwrites unconditionally: last writer
/// wins, there is no optimistic-concurrency check.
pub fn write_file(root: &Path, rel: &str, content: Option<&Value>) -> Result<(), SimdockError> {
    let target = paths::resolve_inside(root, rel)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let suffix = suffix_of(&target);
    let text = match content {
        Some(Value::String(s)) => s.clone(),
        Some(value) if is_yaml(&suffix) => {
            serde_yaml::to_string(value).map_err(|e| SimdockError::Serialize(e.to_string()))?
        }
        Some(value) if suffix == "json" => serde_json::to_string_pretty(value)
            .map_err(|e| SimdockError::Serialize(e.to_string()))?,
        Some(value) => value.to_string(),
        None if is_yaml(&suffix) => "{}\n".to_string(),
        None => String::new(),
    };

    fs::write(&target, text)?;
    info!(file = %normalize_rel(rel), "wrote workspace file");
    Ok(())
}

/// Delete one file under a session root. Returns `false` when the file does
/// not exist or the operation fails, so callers can probe for existence
/// without handling errors.
pub fn delete_file(root: &Path, rel: &str) -> bool {
    let target = match paths::resolve_inside(root, rel) {
        Ok(t) => t,
        Err(e) => {
            warn!(file = rel, error = %e, "refused to delete file");
            return false;
        }
    };
    if !target.is_file() {
        return false;
    }
    match fs::remove_file(&target) {
        Ok(()) => {
            info!(file = %normalize_rel(rel), "deleted workspace file");
            true
        }
        Err(e) => {
            warn!(file = rel, error = %e, "failed to delete file");
            false
        }
    }
}

/// Recursively scan a session root, grouping files by kind. Pure and
/// side-effect free: a single unreadable entry is skipped, never fatal.
pub fn scan_files(root: &Path) -> FileListing {
    let mut listing = FileListing::default();
    if !root.is_dir() {
        warn!(root = %root.display(), "scan target does not exist");
        return listing;
    }

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        match suffix_of(entry.path()).as_str() {
            "yaml" | "yml" => listing.yaml_files.push(rel),
            "csv" => listing.csv_files.push(rel),
            "html" => listing.html_files.push(rel),
            "png" => listing.png_files.push(rel),
            _ => continue,
        }
    }

    listing.yaml_files.sort();
    listing.csv_files.sort();
    listing.html_files.sort();
    listing.png_files.sort();
    listing.total_files = listing.yaml_files.len()
        + listing.csv_files.len()
        + listing.html_files.len()
        + listing.png_files.len();
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_yaml_roundtrips_structure() {
        let root = TempDir::new().unwrap();
        let content = json!({"a": 1, "nested": {"b": [1, 2]}});
        write_file(root.path(), "project/config/base.yaml", Some(&content)).unwrap();

        match read_file(root.path(), "project/config/base.yaml", false).unwrap() {
            FileContent::Parsed { data, .. } => assert_eq!(data, content),
            _ => panic!("expected parsed content"),
        }
    }

    #[test]
    fn string_content_is_written_verbatim() {
        let root = TempDir::new().unwrap();
        let text = "x: 1\n# a comment survives\n";
        write_file(
            root.path(),
            "notes.yaml",
            Some(&Value::String(text.to_string())),
        )
        .unwrap();
        assert_eq!(
            fs::read_to_string(root.path().join("notes.yaml")).unwrap(),
            text
        );
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let root = TempDir::new().unwrap();
        let result = read_file(root.path(), "absent.yaml", false);
        assert!(matches!(result, Err(SimdockError::NotFound(_))));
    }

    #[test]
    fn read_raw_binary_is_base64_with_mime() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("chart.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

        match read_file(root.path(), "chart.png", true).unwrap() {
            FileContent::RawBinary { data_b64, mime, .. } => {
                assert_eq!(mime, "image/png");
                assert_eq!(BASE64.decode(data_b64).unwrap(), vec![0x89, 0x50, 0x4e, 0x47]);
            }
            _ => panic!("expected raw binary"),
        }
    }

    #[test]
    fn read_raw_text_keeps_content() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("data.csv"), "h\n1\n").unwrap();

        match read_file(root.path(), "data.csv", true).unwrap() {
            FileContent::RawText { data, mime, .. } => {
                assert_eq!(data, "h\n1\n");
                assert_eq!(mime, "text/csv");
            }
            _ => panic!("expected raw text"),
        }
    }

    #[test]
    fn delete_missing_file_returns_false() {
        let root = TempDir::new().unwrap();
        assert!(!delete_file(root.path(), "nope.yaml"));
    }

    #[test]
    fn delete_tolerates_backslash_separators() {
        let root = TempDir::new().unwrap();
        write_file(root.path(), "a/b.yaml", None).unwrap();
        assert!(delete_file(root.path(), "a\\b.yaml"));
        assert!(!root.path().join("a/b.yaml").exists());
    }

    #[test]
    fn delete_refuses_escaping_path() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("victim.txt"), "keep me").unwrap();

        assert!(!delete_file(&root, "../victim.txt"));
        assert!(outer.path().join("victim.txt").exists());
    }

    #[test]
    fn scan_groups_and_sorts() {
        let root = TempDir::new().unwrap();
        write_file(root.path(), "b.yaml", None).unwrap();
        write_file(root.path(), "a.yaml", None).unwrap();
        write_file(root.path(), "data/events.csv", None).unwrap();
        write_file(root.path(), "report.html", None).unwrap();
        write_file(root.path(), "README.md", None).unwrap();

        let listing = scan_files(root.path());
        assert_eq!(listing.yaml_files, vec!["a.yaml", "b.yaml"]);
        assert_eq!(listing.csv_files, vec!["data/events.csv"]);
        assert_eq!(listing.html_files, vec!["report.html"]);
        // Ungrouped suffixes are not counted.
        assert_eq!(listing.total_files, 4);
    }

    #[test]
    fn scan_missing_root_is_empty() {
        let listing = scan_files(Path::new("/nonexistent-simdock-scan"));
        assert_eq!(listing.total_files, 0);
    }
}
