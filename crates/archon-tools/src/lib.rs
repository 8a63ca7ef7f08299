//! # archon-tools
//!
//! Explicit tool registry for the Archon framework.
//!
//! Tools are never looked up by module path at runtime. Instead, each
//! implementation registers a [`ToolFactory`] under an identifier at startup,
//! and [`ToolRegistry::load_from_config`] instantiates the tools declared in the
//! tool registry document through those factories.

#![deny(unsafe_code)]

pub mod builtin;
pub mod errors;
pub mod registry;
pub mod traits;

pub use errors::{Result, ToolError};
pub use registry::{LoadReport, ToolRegistry};
pub use traits::{Tool, ToolFactory, ToolInfo, ToolSpec};
