//! Configuration layers and the on-disk framework layout.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use archon_core::constants::CONFIG_EXTENSION;

use crate::errors::{ConfigError, Result};

/// Directory holding the framework-wide documents.
pub const CONFIGS_DIR: &str = "configs";
/// Directory holding one subdirectory per project.
pub const PROJECTS_DIR: &str = "projects";
/// Directory holding project templates.
pub const TEMPLATES_DIR: &str = "templates";
/// Default destination of exported archives.
pub const EXPORTS_DIR: &str = "exports";

/// One source document of the effective configuration.
///
/// Variants are declared in precedence order, lowest first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConfigLayer {
    /// Framework-wide settings.
    Global,
    /// Base agent profiles shared by all projects.
    AgentProfiles,
    /// Declared tools and their implementations.
    ToolRegistry,
    /// Settings of one project.
    ProjectSettings(String),
    /// Agent configuration of one project.
    ProjectAgentConfig(String),
}

impl ConfigLayer {
    /// All five layers of a project, lowest precedence first.
    pub fn stack(project: &str) -> [ConfigLayer; 5] {
        [
            Self::Global,
            Self::AgentProfiles,
            Self::ToolRegistry,
            Self::ProjectSettings(project.to_owned()),
            Self::ProjectAgentConfig(project.to_owned()),
        ]
    }

    /// Cache identity of this layer.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Global => "global_config".to_owned(),
            Self::AgentProfiles => "agent_profiles".to_owned(),
            Self::ToolRegistry => "tool_registry".to_owned(),
            Self::ProjectSettings(name) => format!("project_config_{name}"),
            Self::ProjectAgentConfig(name) => format!("project_agent_config_{name}"),
        }
    }

    /// The project this layer belongs to, if any.
    pub fn project(&self) -> Option<&str> {
        match self {
            Self::ProjectSettings(name) | Self::ProjectAgentConfig(name) => Some(name),
            _ => None,
        }
    }

    /// Which kind of layer this is.
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Global => LayerKind::Global,
            Self::AgentProfiles => LayerKind::AgentProfiles,
            Self::ToolRegistry => LayerKind::ToolRegistry,
            Self::ProjectSettings(_) => LayerKind::Project,
            Self::ProjectAgentConfig(_) => LayerKind::ProjectAgent,
        }
    }

    /// Checks that a project layer names a single directory component.
    pub fn validate(&self) -> Result<()> {
        match self.project() {
            Some(name) if !is_safe_component(name) => Err(ConfigError::InvalidLayer(format!(
                "project name '{name}' is not a directory name"
            ))),
            _ => Ok(()),
        }
    }

    /// File name of this layer's document inside its directory.
    pub fn file_name(&self) -> String {
        let stem = match self {
            Self::Global => "global_settings",
            Self::AgentProfiles => "base_agent_profiles",
            Self::ToolRegistry => "tool_registry",
            Self::ProjectSettings(_) => "project_settings",
            Self::ProjectAgentConfig(_) => "agent_config",
        };
        format!("{stem}.{CONFIG_EXTENSION}")
    }
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.project() {
            Some(name) => write!(f, "{}:{name}", self.kind()),
            None => write!(f, "{}", self.kind()),
        }
    }
}

fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

// ─────────────────────────────────────────────────────────────────────────────
// LayerKind
// ─────────────────────────────────────────────────────────────────────────────

/// A layer without its project name, as typed on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// `global`
    Global,
    /// `agent_profiles`
    AgentProfiles,
    /// `tool_registry`
    ToolRegistry,
    /// `project`
    Project,
    /// `project_agent`
    ProjectAgent,
}

impl LayerKind {
    /// Combine with an optional project name into a full layer.
    ///
    /// Project kinds require a name; the framework-wide kinds reject one.
    pub fn with_project(self, project: Option<&str>) -> Result<ConfigLayer> {
        let layer = match (self, project) {
            (Self::Global, None) => ConfigLayer::Global,
            (Self::AgentProfiles, None) => ConfigLayer::AgentProfiles,
            (Self::ToolRegistry, None) => ConfigLayer::ToolRegistry,
            (Self::Project, Some(name)) => ConfigLayer::ProjectSettings(name.to_owned()),
            (Self::ProjectAgent, Some(name)) => ConfigLayer::ProjectAgentConfig(name.to_owned()),
            (Self::Project | Self::ProjectAgent, None) => {
                return Err(ConfigError::InvalidLayer(format!("layer '{self}' needs a project name")));
            }
            (_, Some(_)) => {
                return Err(ConfigError::InvalidLayer(format!(
                    "layer '{self}' does not belong to a project"
                )));
            }
        };
        layer.validate()?;
        Ok(layer)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::AgentProfiles => "agent_profiles",
            Self::ToolRegistry => "tool_registry",
            Self::Project => "project",
            Self::ProjectAgent => "project_agent",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(Self::Global),
            "agent_profiles" => Ok(Self::AgentProfiles),
            "tool_registry" => Ok(Self::ToolRegistry),
            "project" => Ok(Self::Project),
            "project_agent" => Ok(Self::ProjectAgent),
            other => Err(ConfigError::UnknownLayer(other.to_owned())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameworkLayout
// ─────────────────────────────────────────────────────────────────────────────

/// Directory structure under a framework root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameworkLayout {
    root: PathBuf,
}

impl FrameworkLayout {
    /// Layout rooted at `root`, made absolute against the current directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    /// The framework root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `configs/`
    pub fn configs_dir(&self) -> PathBuf {
        self.root.join(CONFIGS_DIR)
    }

    /// `projects/`
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join(PROJECTS_DIR)
    }

    /// `templates/`
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    /// `exports/`
    pub fn exports_dir(&self) -> PathBuf {
        self.root.join(EXPORTS_DIR)
    }

    /// `projects/<name>/`
    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.projects_dir().join(name)
    }

    /// Storage location of a layer's document.
    ///
    /// Returns `None` for a project layer whose name is not a single directory
    /// component.
    pub fn layer_path(&self, layer: &ConfigLayer) -> Option<PathBuf> {
        let dir = match layer.project() {
            None => self.configs_dir(),
            Some(name) if is_safe_component(name) => self.project_dir(name).join(CONFIGS_DIR),
            Some(_) => return None,
        };
        Some(dir.join(layer.file_name()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
