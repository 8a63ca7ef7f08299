//! Project and archive error types.

use std::path::PathBuf;

use archon_settings::ConfigError;
use thiserror::Error;

/// Errors produced while packing or unpacking a project archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The file is not a readable zip container.
    #[error("invalid archive: {0}")]
    Invalid(#[from] zip::result::ZipError),
    /// The extracted tree has no project entry point at its root.
    #[error("archive does not contain a project (no entry point under {})", root.display())]
    MissingEntryPoint {
        /// The directory that was checked.
        root: PathBuf,
    },
    /// Reading or writing a file failed.
    #[error("archive I/O error at {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Walking the source directory failed.
    #[error("failed to walk project directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Errors surfaced by project lifecycle operations.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// The name does not match `^[a-z0-9-]{3,40}$`.
    #[error("invalid project name '{name}': {reason}")]
    InvalidName {
        /// Rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A project directory with this name already exists.
    #[error("project '{0}' already exists")]
    AlreadyExists(String),
    /// A project, template, or archive was not found.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// What was looked up (`project`, `template`, `archive`).
        kind: &'static str,
        /// Its name or path.
        name: String,
    },
    /// A destructive operation was called without explicit confirmation.
    #[error("deleting project '{0}' requires confirmation")]
    NotConfirmed(String),
    /// The archive is corrupt or structurally invalid.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    /// Persisting a configuration document failed.
    #[error(transparent)]
    ConfigIo(#[from] ConfigError),
    /// The entry point could not be launched.
    #[error("failed to launch {}: {source}", script.display())]
    Spawn {
        /// Entry-point script.
        script: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },
    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ProjectError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Result type for project operations.
pub type Result<T> = std::result::Result<T, ProjectError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = ProjectError::not_found("template", "rag-template");
        assert_eq!(err.to_string(), "template 'rag-template' not found");
    }

    #[test]
    fn archive_error_is_transparent() {
        let err: ProjectError = ArchiveError::MissingEntryPoint {
            root: PathBuf::from("/tmp/x"),
        }
        .into();
        assert!(err.to_string().contains("no entry point under /tmp/x"));
        assert!(matches!(err, ProjectError::Archive(_)));
    }

    #[test]
    fn config_error_converts() {
        let err: ProjectError = ConfigError::InvalidLayer("bad".into()).into();
        assert!(matches!(err, ProjectError::ConfigIo(_)));
    }

    #[test]
    fn io_helper_keeps_path() {
        let make = ProjectError::io("/srv/projects/bot");
        let err = make(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        assert!(err.to_string().contains("/srv/projects/bot"));
    }

    #[test]
    fn zip_error_converts() {
        let err: ArchiveError = zip::result::ZipError::InvalidArchive("bad header".into()).into();
        assert!(err.to_string().starts_with("invalid archive"));
    }
}
