//! Tool registry: factories by identifier, instances by tool id.
//!
//! Factories are registered in code at startup. The tool registry document
//! then only names a factory per tool, so nothing is resolved dynamically.

use std::collections::HashMap;
use std::sync::Arc;

use archon_core::ValueTree;
use tracing::{debug, warn};

use crate::errors::{Result, ToolError};
use crate::traits::{Tool, ToolFactory, ToolInfo, ToolSpec};

struct Registered {
    tool: Arc<dyn Tool>,
    name: String,
    description: String,
}

/// Outcome of [`ToolRegistry::load_from_config`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Ids of tools that were instantiated, in document order.
    pub loaded: Vec<String>,
    /// Ids of declarations that were skipped, in document order.
    pub skipped: Vec<String>,
}

/// Central registry of tool factories and tool instances.
pub struct ToolRegistry {
    factories: HashMap<String, Arc<ToolFactory>>,
    tools: HashMap<String, Registered>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            tools: HashMap::new(),
        }
    }

    /// Register a factory. Overwrites any existing factory with the same id.
    pub fn register_factory<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&ToolSpec) -> Result<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        let id = id.into();
        debug!(factory = %id, "tool factory registered");
        let _ = self.factories.insert(id, Arc::new(factory));
    }

    /// Register a tool under its own id. Overwrites any existing tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let id = tool.id().to_owned();
        let description = tool.description().to_owned();
        self.insert(id.clone(), id, description, tool);
    }

    fn insert(&mut self, id: String, name: String, description: String, tool: Arc<dyn Tool>) {
        debug!(tool_id = %id, "tool registered");
        let _ = self.tools.insert(
            id,
            Registered {
                tool,
                name,
                description,
            },
        );
    }

    /// Instantiate one declaration through its factory and register it.
    pub fn instantiate(&mut self, spec: &ToolSpec) -> Result<Arc<dyn Tool>> {
        let factory = self
            .factories
            .get(&spec.factory)
            .cloned()
            .ok_or_else(|| ToolError::UnknownFactory {
                id: spec.id.clone(),
                factory: spec.factory.clone(),
            })?;
        let tool = factory(spec)?;
        self.insert(
            spec.id.clone(),
            spec.name.clone(),
            spec.description.clone(),
            Arc::clone(&tool),
        );
        Ok(tool)
    }

    /// Instantiate every tool declared under `tools` in `registry`.
    ///
    /// A missing or non-mapping `tools` section loads nothing. Invalid
    /// declarations, unknown factories and factory failures are logged and
    /// skipped; the remaining tools still load.
    pub fn load_from_config(&mut self, registry: &ValueTree) -> LoadReport {
        let mut report = LoadReport::default();
        let Some(entries) = registry.get("tools").and_then(ValueTree::as_mapping) else {
            debug!("no tools section in tool registry");
            return report;
        };

        for (id, entry) in entries {
            match ToolSpec::from_config(id, entry).and_then(|spec| self.instantiate(&spec)) {
                Ok(_) => report.loaded.push(id.clone()),
                Err(error) => {
                    warn!(tool_id = %id, %error, "skipping tool declaration");
                    report.skipped.push(id.clone());
                }
            }
        }
        debug!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "tool registry loaded"
        );
        report
    }

    /// Look up a tool by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(id).map(|r| Arc::clone(&r.tool))
    }

    /// Execute the tool registered under `id`.
    pub fn execute(&self, id: &str, args: ValueTree) -> Result<ValueTree> {
        let registered = self.tools.get(id).ok_or_else(|| ToolError::NotFound { id: id.to_owned() })?;
        debug!(tool_id = id, "executing tool");
        registered.tool.execute(args)
    }

    /// Listing entries for every registered tool, sorted by id.
    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .iter()
            .map(|(id, r)| ToolInfo {
                id: id.clone(),
                name: r.name.clone(),
                description: r.description.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Return all tool ids, sorted alphabetically.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether a tool with the given id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut factories: Vec<&String> = self.factories.keys().collect();
        factories.sort();
        f.debug_struct("ToolRegistry")
            .field("factories", &factories)
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct StubTool {
        id: String,
    }

    impl StubTool {
        fn new(id: &str) -> Arc<dyn Tool> {
            Arc::new(Self { id: id.into() })
        }
    }

    impl Tool for StubTool {
        fn id(&self) -> &str {
            &self.id
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn execute(&self, _args: ValueTree) -> Result<ValueTree> {
            Ok(ValueTree::from(self.id.as_str()))
        }
    }

    fn stub_factory(spec: &ToolSpec) -> Result<Arc<dyn Tool>> {
        Ok(StubTool::new(&spec.id))
    }

    fn doc(src: &str) -> ValueTree {
        serde_yaml::from_str(src).unwrap()
    }

    #[test]
    fn new_registry_is_empty() {
        let reg = ToolRegistry::new();
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool::new("alpha"));
        assert_eq!(reg.len(), 1);
        assert!(reg.contains("alpha"));
        assert_eq!(reg.get("alpha").unwrap().id(), "alpha");
        assert!(reg.get("beta").is_none());
    }

    #[test]
    fn register_overwrites() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool::new("dup"));
        reg.register(StubTool::new("dup"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn names_sorted() {
        let mut reg = ToolRegistry::new();
        for id in ["zulu", "alpha", "mike"] {
            reg.register(StubTool::new(id));
        }
        assert_eq!(reg.names(), vec!["alpha", "mike", "zulu"]);
    }

    #[test]
    fn execute_dispatches_by_id() {
        let mut reg = ToolRegistry::new();
        reg.register(StubTool::new("alpha"));
        assert_eq!(reg.execute("alpha", ValueTree::Null).unwrap(), ValueTree::from("alpha"));
        assert_matches!(
            reg.execute("missing", ValueTree::Null),
            Err(ToolError::NotFound { id }) if id == "missing"
        );
    }

    #[test]
    fn load_uses_declared_metadata() {
        let mut reg = ToolRegistry::new();
        reg.register_factory("stub", stub_factory);
        let report = reg.load_from_config(&doc(
            "tools:\n  web:\n    name: Web\n    description: Looks things up\n    implementation: stub\n",
        ));
        assert_eq!(report.loaded, vec!["web"]);
        assert!(report.skipped.is_empty());
        assert_eq!(
            reg.list(),
            vec![ToolInfo {
                id: "web".into(),
                name: "Web".into(),
                description: "Looks things up".into(),
            }]
        );
    }

    #[test]
    fn load_skips_failures_and_keeps_going() {
        let mut reg = ToolRegistry::new();
        reg.register_factory("stub", stub_factory);
        reg.register_factory("broken", |spec: &ToolSpec| {
            Err(ToolError::InvalidSpec {
                id: spec.id.clone(),
                message: "nope".into(),
            })
        });
        let report = reg.load_from_config(&doc(
            "tools:\n  a: {implementation: missing}\n  b: {implementation: broken}\n  c: {name: no impl}\n  d: {implementation: {factory: stub}}\n",
        ));
        assert_eq!(report.loaded, vec!["d"]);
        assert_eq!(report.skipped, vec!["a", "b", "c"]);
        assert_eq!(reg.names(), vec!["d"]);
    }

    #[test]
    fn load_without_tools_section() {
        let mut reg = ToolRegistry::new();
        assert_eq!(reg.load_from_config(&ValueTree::empty_mapping()), LoadReport::default());
        assert_eq!(reg.load_from_config(&doc("tools: [a, b]\n")), LoadReport::default());
        assert!(reg.is_empty());
    }

    #[test]
    fn instantiate_unknown_factory() {
        let mut reg = ToolRegistry::new();
        let spec = ToolSpec::from_config("x", &doc("implementation: nowhere\n")).unwrap();
        assert_matches!(
            reg.instantiate(&spec),
            Err(ToolError::UnknownFactory { factory, .. }) if factory == "nowhere"
        );
        assert!(!reg.contains("x"));
    }
}
