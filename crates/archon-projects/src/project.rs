//! Project descriptor.

use std::path::PathBuf;

use archon_core::ValueTree;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Placeholder values used when a settings document lacks a field.
#[derive(Clone, Copy, Debug)]
pub struct Fallbacks {
    /// Used for a missing `description`.
    pub description: &'static str,
    /// Used for missing `version` and `created`.
    pub unknown: &'static str,
    /// Used for a missing `status`.
    pub status: &'static str,
    /// Used for a missing `template`.
    pub template: &'static str,
}

impl Fallbacks {
    /// Placeholders shown when listing projects.
    pub const LIST: Self = Self {
        description: "No description.",
        unknown: "N/A",
        status: "unknown",
        template: "N/A",
    };

    /// Placeholders for a freshly imported project.
    pub const IMPORT: Self = Self {
        description: "No description.",
        unknown: "N/A",
        status: "imported",
        template: "imported",
    };
}

/// A named project directory and the metadata from its settings document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Project {
    /// Directory name under `projects/`.
    pub name: String,
    /// Absolute project directory.
    pub path: PathBuf,
    /// Free-text description.
    pub description: String,
    /// Project version.
    pub version: String,
    /// Free-form status, e.g. `development`.
    pub status: String,
    /// Creation timestamp as written (RFC 3339 for projects created here).
    pub created: String,
    /// Template the project was created from, or `custom`.
    pub template: String,
}

impl Project {
    /// Build a descriptor from a project settings document.
    ///
    /// Non-string scalars are rendered as text; missing fields use `fallbacks`.
    pub fn from_settings(name: &str, path: PathBuf, settings: &ValueTree, fallbacks: Fallbacks) -> Self {
        let field = |key: &str, fallback: &str| scalar_text(settings.get(key)).unwrap_or_else(|| fallback.to_owned());
        Self {
            name: name.to_owned(),
            path,
            description: field("description", fallbacks.description),
            version: field("version", fallbacks.unknown),
            status: field("status", fallbacks.status),
            created: field("created", fallbacks.unknown),
            template: field("template", fallbacks.template),
        }
    }

    /// The creation time, when `created` is a valid RFC 3339 timestamp.
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.created).ok()
    }
}

fn scalar_text(value: Option<&ValueTree>) -> Option<String> {
    match value? {
        ValueTree::String(s) => Some(s.clone()),
        ValueTree::Number(n) => Some(n.to_string()),
        ValueTree::Bool(b) => Some(b.to_string()),
        ValueTree::Null | ValueTree::Sequence(_) | ValueTree::Mapping(_) => None,
    }
}
