//! Tool capability trait and declaration types.

use std::sync::Arc;

use archon_core::ValueTree;
use serde::Serialize;

use crate::errors::{Result, ToolError};

/// A capability agents can invoke by id.
pub trait Tool: Send + Sync {
    /// Unique tool id.
    fn id(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Run the tool.
    fn execute(&self, args: ValueTree) -> Result<ValueTree>;
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("id", &self.id()).finish_non_exhaustive()
    }
}

/// Builds a tool instance from its declaration.
pub type ToolFactory = dyn Fn(&ToolSpec) -> Result<Arc<dyn Tool>> + Send + Sync;

/// One `tools.<id>` entry of the tool registry document.
///
/// ```yaml
/// tools:
///   echo:
///     name: Echo
///     description: Returns its arguments
///     implementation: echo          # or {factory: echo}
///     config: {prefix: ">"}
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    /// Key under `tools`.
    pub id: String,
    /// Display name, defaults to the id.
    pub name: String,
    /// Description, defaults to empty.
    pub description: String,
    /// Identifier of the factory that builds this tool.
    pub factory: String,
    /// Tool-specific configuration, defaults to an empty mapping.
    pub config: ValueTree,
}

impl ToolSpec {
    /// Parse one declaration.
    pub fn from_config(id: &str, entry: &ValueTree) -> Result<Self> {
        let invalid = |message: &str| ToolError::InvalidSpec {
            id: id.to_owned(),
            message: message.to_owned(),
        };

        if !entry.is_mapping() {
            return Err(invalid("declaration must be a mapping"));
        }

        let factory = match entry.get("implementation") {
            Some(ValueTree::String(factory)) => factory.clone(),
            Some(implementation @ ValueTree::Mapping(_)) => implementation
                .get_str("factory")
                .map(str::to_owned)
                .ok_or_else(|| invalid("implementation mapping needs a 'factory' string"))?,
            Some(_) => return Err(invalid("implementation must be a string or a mapping")),
            None => return Err(invalid("missing implementation")),
        };
        if factory.is_empty() {
            return Err(invalid("implementation is empty"));
        }

        Ok(Self {
            id: id.to_owned(),
            name: entry.get_str("name").unwrap_or(id).to_owned(),
            description: entry.get_str("description").unwrap_or_default().to_owned(),
            factory,
            config: entry
                .get("config")
                .filter(|c| !c.is_null())
                .cloned()
                .unwrap_or_else(ValueTree::empty_mapping),
        })
    }
}

/// Registry listing entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    /// Tool id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
}
