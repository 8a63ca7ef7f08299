//! # archon-settings
//!
//! Layered configuration documents for the Archon framework.
//!
//! Five layers are merged into the effective configuration of a project, lowest
//! precedence first:
//! 1. **Global** (`configs/global_settings.yaml`)
//! 2. **Agent profiles** (`configs/base_agent_profiles.yaml`)
//! 3. **Tool registry** (`configs/tool_registry.yaml`)
//! 4. **Project settings** (`projects/<name>/configs/project_settings.yaml`)
//! 5. **Project agent config** (`projects/<name>/configs/agent_config.yaml`)
//!
//! [`ConfigResolver`] owns the document cache. Reads fail soft (a missing or
//! malformed document is an empty mapping); writes surface [`ConfigError`].

#![deny(unsafe_code)]

pub mod errors;
pub mod layer;
pub mod loader;
pub mod resolver;

pub use errors::{ConfigError, Result};
pub use layer::{ConfigLayer, FrameworkLayout, LayerKind};
pub use resolver::ConfigResolver;
