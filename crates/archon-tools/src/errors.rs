//! Tool error types.

use thiserror::Error;

/// Errors raised while building or executing tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under this id.
    #[error("tool not found: {id}")]
    NotFound {
        /// Requested tool id.
        id: String,
    },
    /// A declared tool names a factory nobody registered.
    #[error("unknown tool factory '{factory}' for tool '{id}'")]
    UnknownFactory {
        /// Tool id from the configuration.
        id: String,
        /// Factory identifier that was not found.
        factory: String,
    },
    /// A tool declaration is structurally invalid.
    #[error("invalid tool declaration '{id}': {message}")]
    InvalidSpec {
        /// Tool id from the configuration.
        id: String,
        /// What is wrong with it.
        message: String,
    },
    /// Arguments passed to a tool are invalid.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
    /// The tool ran and failed.
    #[error("tool execution failed: {message}")]
    Execution {
        /// Description of the failure.
        message: String,
    },
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;
