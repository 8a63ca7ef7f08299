//! Tools shipped with the framework.

use std::sync::Arc;

use archon_core::{ValueTree, merge};

use crate::errors::Result;
use crate::registry::ToolRegistry;
use crate::traits::{Tool, ToolSpec};

/// Factory id of [`EchoTool`].
pub const ECHO_FACTORY: &str = "echo";

/// Returns its arguments, merged over the configured `defaults` mapping.
#[derive(Debug)]
pub struct EchoTool {
    id: String,
    description: String,
    defaults: ValueTree,
}

impl EchoTool {
    /// Build from a declaration. `config.defaults` seeds every response.
    pub fn from_spec(spec: &ToolSpec) -> Self {
        Self {
            id: spec.id.clone(),
            description: spec.description.clone(),
            defaults: spec
                .config
                .get("defaults")
                .cloned()
                .unwrap_or_else(ValueTree::empty_mapping),
        }
    }
}

impl Tool for EchoTool {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn execute(&self, args: ValueTree) -> Result<ValueTree> {
        Ok(merge(self.defaults.clone(), args))
    }
}

/// Factory for [`EchoTool`].
pub fn echo_factory(spec: &ToolSpec) -> Result<Arc<dyn Tool>> {
    Ok(Arc::new(EchoTool::from_spec(spec)))
}

impl ToolRegistry {
    /// A registry with the built-in factories registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_factory(ECHO_FACTORY, echo_factory);
        registry
    }
}
