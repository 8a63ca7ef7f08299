//! Reading, normalizing, and writing configuration documents.
//!
//! Loading flow for one document:
//! 1. Read the file (missing or unreadable: empty mapping)
//! 2. Parse YAML into a [`ValueTree`] (malformed: empty mapping)
//! 3. Substitute `${NAME}` placeholders in string values
//! 4. For the global layer only, absolutize relative paths under `paths`

use std::io::{ErrorKind, Write};
use std::path::Path;

use archon_core::{ValueTree, expand_env_with};
use tracing::{debug, warn};

use crate::errors::{ConfigError, Result};

/// Top-level key of the global document whose strings are filesystem paths.
pub const PATHS_KEY: &str = "paths";

/// Parse YAML text into a document.
///
/// An empty or `null` document is an empty mapping.
pub fn parse_document(text: &str) -> std::result::Result<ValueTree, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(ValueTree::empty_mapping());
    }
    let value: ValueTree = serde_yaml::from_str(text)?;
    Ok(if value.is_null() { ValueTree::empty_mapping() } else { value })
}

/// Read and parse the document at `path`, failing soft.
///
/// A missing file is logged at debug level; unreadable files, parse errors,
/// and documents whose root is not a mapping are logged as warnings. All of
/// them yield an empty mapping.
pub fn read_document(path: &Path) -> ValueTree {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "config document not found, using empty mapping");
            return ValueTree::empty_mapping();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read config document");
            return ValueTree::empty_mapping();
        }
    };

    match parse_document(&text) {
        Ok(value) if value.is_mapping() => value,
        Ok(value) => {
            warn!(path = %path.display(), kind = value.kind(), "config document root is not a mapping, ignoring");
            ValueTree::empty_mapping()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config document");
            ValueTree::empty_mapping()
        }
    }
}

/// Substitute placeholders, then absolutize paths when `paths_root` is given.
pub fn normalize<F>(value: &mut ValueTree, lookup: &F, paths_root: Option<&Path>)
where
    F: Fn(&str) -> Option<String> + ?Sized,
{
    expand_env_with(value, lookup);
    if let Some(root) = paths_root {
        absolutize_paths(value, root);
    }
}

/// Rewrite every relative path string under the top-level `paths` key so it is
/// rooted at `root`. Absolute paths, empty strings, and non-strings are kept.
pub fn absolutize_paths(value: &mut ValueTree, root: &Path) {
    let Some(paths) = value.as_mapping_mut().and_then(|m| m.get_mut(PATHS_KEY)) else {
        return;
    };
    paths.visit_strings_mut(&mut |s: &mut String| {
        if s.is_empty() || Path::new(s.as_str()).is_absolute() {
            return;
        }
        *s = root.join(s.as_str()).to_string_lossy().into_owned();
    });
}

/// Serialize `value` to `path`, creating parent directories.
///
/// The document is written to a temporary file in the target directory and
/// renamed into place, so readers never observe a partial file.
pub fn write_document(path: &Path, value: &ValueTree) -> Result<()> {
    let io_err = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let text = serde_yaml::to_string(value)?;
    let parent = path
        .parent()
        .ok_or_else(|| io_err(std::io::Error::new(ErrorKind::InvalidInput, "path has no parent")))?;
    std::fs::create_dir_all(parent).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(text.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    let _ = tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parse_empty_and_null_documents() {
        assert!(parse_document("").unwrap().is_empty_mapping());
        assert!(parse_document("   \n").unwrap().is_empty_mapping());
        assert!(parse_document("~").unwrap().is_empty_mapping());
        assert!(parse_document("null").unwrap().is_empty_mapping());
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(parse_document("a: [unclosed").is_err());
    }

    #[test]
    fn read_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_document(&dir.path().join("nope.yaml")).is_empty_mapping());
    }

    #[test]
    fn read_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "key: [1, 2\nother: {").unwrap();
        assert!(read_document(&path).is_empty_mapping());
    }

    #[test]
    fn read_non_mapping_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.yaml");
        std::fs::write(&path, "- a\n- b\n").unwrap();
        assert!(read_document(&path).is_empty_mapping());
    }

    #[test]
    fn read_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_document(dir.path()).is_empty_mapping());
    }

    #[test]
    fn absolutize_rewrites_relative_paths_only() {
        let mut v = parse_document(
            "paths:\n  data: data/store\n  logs: /var/log/archon\n  nested: {cache: .cache}\n  extra: [tmp, /abs]\n  count: 3\nother: relative/not/touched\n",
        )
        .unwrap();
        absolutize_paths(&mut v, Path::new("/srv/archon"));

        let get = |p: &[&str]| v.get_path(p).and_then(ValueTree::as_str).map(PathBuf::from);
        assert_eq!(get(&["paths", "data"]), Some(PathBuf::from("/srv/archon/data/store")));
        assert_eq!(get(&["paths", "logs"]), Some(PathBuf::from("/var/log/archon")));
        assert_eq!(get(&["paths", "nested", "cache"]), Some(PathBuf::from("/srv/archon/.cache")));
        let extra = v.get_path(&["paths", "extra"]).unwrap().as_sequence().unwrap();
        assert_eq!(extra[0].as_str(), Some("/srv/archon/tmp"));
        assert_eq!(extra[1].as_str(), Some("/abs"));
        assert_eq!(v.get_path(&["paths", "count"]).and_then(ValueTree::as_i64), Some(3));
        assert_eq!(v.get_str("other"), Some("relative/not/touched"));
    }

    #[test]
    fn absolutize_without_paths_key_is_noop() {
        let mut v = parse_document("a: b").unwrap();
        let before = v.clone();
        absolutize_paths(&mut v, Path::new("/root"));
        assert_eq!(v, before);
    }

    #[test]
    fn normalize_substitutes_before_absolutizing() {
        let lookup = |name: &str| (name == "DATA_DIR").then(|| "store".to_owned());
        let mut v = parse_document("paths: {data: \"${DATA_DIR}/db\"}").unwrap();
        normalize(&mut v, &lookup, Some(Path::new("/fw")));
        assert_eq!(v.get_path(&["paths", "data"]).and_then(ValueTree::as_str), Some("/fw/store/db"));
    }

    #[test]
    fn normalize_without_root_skips_paths() {
        let mut v = parse_document("paths: {data: rel}").unwrap();
        normalize(&mut v, &no_env, None);
        assert_eq!(v.get_path(&["paths", "data"]).and_then(ValueTree::as_str), Some("rel"));
    }

    #[test]
    fn write_creates_parents_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/doc.yaml");
        let v = parse_document("name: demo\nlist: [1, 2]\n").unwrap();
        write_document(&path, &v).unwrap();
        assert_eq!(read_document(&path), v);
    }

    #[test]
    fn write_into_file_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let err = write_document(&blocker.join("doc.yaml"), &ValueTree::empty_mapping()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
