//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by configuration writes and layer parsing.
///
/// Reads never produce these: an unreadable document degrades to an empty
/// mapping instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Writing a document (or creating its directory) failed.
    #[error("failed to write config {}: {source}", path.display())]
    Io {
        /// Target document path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The value could not be serialized to YAML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
    /// The layer names a project that cannot map to a directory.
    #[error("invalid config layer: {0}")]
    InvalidLayer(String),
    /// A layer name did not match any known layer.
    #[error("unknown config layer '{0}' (expected global, agent_profiles, tool_registry, project, project_agent)")]
    UnknownLayer(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
