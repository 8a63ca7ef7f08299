//! # archon-projects
//!
//! On-disk lifecycle of Archon projects.
//!
//! A project is a directory under `projects/` holding the entry-point script
//! [`ENTRY_POINT`], its two configuration documents, a README, and a fixed set
//! of working directories. [`ProjectManager`] creates, lists, deletes, exports,
//! imports, and runs them:
//!
//! - **Creation** is all-or-nothing: any failure before the project is valid
//!   removes the directory again
//! - **Archives** ([`ArchiveCodec`]) are zip files rooted at the project name
//! - **Running** ([`ProcessRunner`]) spawns the entry point and returns a
//!   [`ProcessHandle`] immediately

#![deny(unsafe_code)]

pub mod archive;
pub mod errors;
pub mod manager;
pub mod name;
pub mod process;
pub mod project;
pub mod scaffold;

pub use archive::ArchiveCodec;
pub use errors::{ArchiveError, ProjectError, Result};
pub use manager::ProjectManager;
pub use name::ProjectName;
pub use process::{ProcessHandle, ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use project::Project;
pub use scaffold::ENTRY_POINT;
