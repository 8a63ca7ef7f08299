//! # archon-core
//!
//! Foundation types and utilities shared by every Archon crate.
//!
//! - **Value tree**: [`ValueTree`], the tagged representation of a configuration
//!   document (mapping, sequence, scalar), plus the layered [`merge`] rule
//! - **Environment substitution**: `${NAME}` placeholder expansion in [`env`]
//! - **Logging**: `tracing` subscriber setup in [`logging`]
//! - **Constants**: package name and version

#![deny(unsafe_code)]

pub mod constants;
pub mod env;
pub mod logging;
pub mod value;

pub use env::{expand_env, expand_env_with, substitute_placeholders};
pub use value::{Mapping, Number, ValueTree, merge, merge_all};
