//! Project lifecycle orchestration.
//!
//! [`ProjectManager`] drives every on-disk change to a project: scaffolding,
//! template application, default documents, deletion, export, import, and
//! launching. Configuration reads and writes go through the shared
//! [`ConfigResolver`] so its cache stays coherent.
//!
//! Creation is a rollback unit. The project directory is claimed with an
//! atomic `create_dir`; until the entry point has been written, any failure
//! removes the directory and drops the project's cache entries again.

use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use archon_core::constants::CONFIG_EXTENSION;
use archon_core::{ValueTree, merge};
use archon_settings::layer::CONFIGS_DIR;
use archon_settings::loader::read_document;
use archon_settings::{ConfigLayer, ConfigResolver, FrameworkLayout};
use chrono::Local;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::archive::ArchiveCodec;
use crate::errors::{ProjectError, Result};
use crate::name::ProjectName;
use crate::process::{ProcessHandle, ProcessRunner, TokioProcessRunner};
use crate::project::{Fallbacks, Project};
use crate::scaffold::{
    self, CUSTOM_TEMPLATE, ENTRY_POINT, FLOW_EXPORTS_DIR, PROJECT_DIRS, README,
};

/// Creates, lists, deletes, exports, imports, and runs projects.
pub struct ProjectManager {
    resolver: Arc<ConfigResolver>,
    runner: Arc<dyn ProcessRunner>,
}

impl ProjectManager {
    /// Manager launching entry points with [`TokioProcessRunner`].
    pub fn new(resolver: Arc<ConfigResolver>) -> Self {
        Self::with_runner(resolver, Arc::new(TokioProcessRunner::new()))
    }

    /// Manager with a custom process runner.
    pub fn with_runner(resolver: Arc<ConfigResolver>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { resolver, runner }
    }

    /// The shared configuration resolver.
    pub fn resolver(&self) -> &Arc<ConfigResolver> {
        &self.resolver
    }

    fn layout(&self) -> &FrameworkLayout {
        self.resolver.layout()
    }

    /// Whether `name` is a project: its directory holds the entry point.
    pub fn exists(&self, name: &str) -> bool {
        ProjectName::new(name).is_ok() && self.layout().project_dir(name).join(ENTRY_POINT).is_file()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Create
    // ─────────────────────────────────────────────────────────────────────

    /// Create a project, optionally from a template.
    ///
    /// Either a complete project exists afterwards or nothing does. README and
    /// permission failures after the entry point is written are only logged.
    pub fn create(&self, name: &str, template: Option<&str>, description: &str) -> Result<Project> {
        let name = ProjectName::new(name)?;
        let dir = self.claim_dir(&name)?;
        let rollback = Rollback {
            dir: &dir,
            name: name.as_str(),
            resolver: &self.resolver,
            armed: true,
        };

        for sub in PROJECT_DIRS {
            let path = dir.join(sub);
            fs::create_dir(&path).map_err(ProjectError::io(&path))?;
        }

        let overlay = match template {
            Some(template) => self.apply_template(template, &dir)?,
            None => ValueTree::empty_mapping(),
        };

        let settings = with_overlay(
            scaffold::default_settings(name.as_str(), description, template),
            &overlay,
            "project_settings",
        );
        let settings_layer = ConfigLayer::ProjectSettings(name.to_string());
        self.resolver.save(&settings_layer, settings.clone())?;

        let agent = with_overlay(scaffold::default_agent_config(name.as_str()), &overlay, "agent_config");
        if let Err(e) = self
            .resolver
            .save(&ConfigLayer::ProjectAgentConfig(name.to_string()), agent)
        {
            error!(project = %name, error = %e, "failed to save initial agent config, continuing");
        }

        let script = dir.join(ENTRY_POINT);
        fs::write(&script, scaffold::entry_point_script(name.as_str(), description))
            .map_err(ProjectError::io(&script))?;
        rollback.disarm();

        if let Err(e) = scaffold::make_executable(&script) {
            warn!(path = %script.display(), error = %e, "could not mark entry point executable");
        }
        let readme = dir.join(README);
        if let Err(e) = fs::write(&readme, scaffold::readme(name.as_str(), description, template)) {
            warn!(path = %readme.display(), error = %e, "failed to write project README");
        }

        // Saved documents are cached raw; reload them with placeholders resolved.
        self.resolver.invalidate_project(name.as_str());

        info!(project = %name, template = template.unwrap_or(CUSTOM_TEMPLATE), "project created");
        Ok(Project::from_settings(name.as_str(), dir, &settings, Fallbacks::LIST))
    }

    fn claim_dir(&self, name: &ProjectName) -> Result<PathBuf> {
        let projects = self.layout().projects_dir();
        fs::create_dir_all(&projects).map_err(ProjectError::io(&projects))?;
        let dir = projects.join(name.as_str());
        match fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(ProjectError::AlreadyExists(name.to_string()))
            }
            Err(source) => Err(ProjectError::Io { path: dir, source }),
        }
    }

    /// Copy the template flow into the project and return its overlay document.
    fn apply_template(&self, template: &str, dir: &Path) -> Result<ValueTree> {
        if !is_plain_file_stem(template) {
            return Err(ProjectError::not_found("template", template));
        }
        let templates = self.layout().templates_dir();
        let flow = templates.join(format!("{template}.flow.json"));
        if !flow.is_file() {
            return Err(ProjectError::not_found("template", template));
        }

        let dest = dir.join(FLOW_EXPORTS_DIR).join(format!("main_{template}.flow.json"));
        let _ = fs::copy(&flow, &dest).map_err(ProjectError::io(&dest))?;

        let overlay_path = templates.join(format!("{template}.config.{CONFIG_EXTENSION}"));
        let overlay = read_document(&overlay_path);
        debug!(template, overlay_keys = overlay.as_mapping().map_or(0, |m| m.len()), "template applied");
        Ok(overlay)
    }

    // ─────────────────────────────────────────────────────────────────────
    // List / get
    // ─────────────────────────────────────────────────────────────────────

    /// All projects, sorted by name.
    ///
    /// Only subdirectories holding the entry point are projects. A missing or
    /// unreadable projects directory yields an empty list.
    pub fn list(&self) -> Vec<Project> {
        let projects_dir = self.layout().projects_dir();
        let entries = match fs::read_dir(&projects_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %projects_dir.display(), error = %e, "failed to read projects directory");
                return Vec::new();
            }
        };

        let mut projects: Vec<Project> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(path = %projects_dir.display(), error = %e, "failed to read directory entry");
                    None
                }
            })
            .filter(|entry| entry.path().join(ENTRY_POINT).is_file())
            .filter_map(|entry| {
                let Ok(name) = entry.file_name().into_string() else {
                    warn!(path = %entry.path().display(), "skipping project with non UTF-8 name");
                    return None;
                };
                Some(self.describe(&name, entry.path(), Fallbacks::LIST))
            })
            .collect();

        projects.sort_by(|a, b| a.name.cmp(&b.name));
        projects
    }

    /// Descriptor of one project.
    pub fn get(&self, name: &str) -> Result<Project> {
        let name = ProjectName::new(name)?;
        let dir = self.require_project(&name)?;
        Ok(self.describe(name.as_str(), dir, Fallbacks::LIST))
    }

    fn describe(&self, name: &str, dir: PathBuf, fallbacks: Fallbacks) -> Project {
        let settings = self.resolver.load(&ConfigLayer::ProjectSettings(name.to_owned()));
        Project::from_settings(name, dir, &settings, fallbacks)
    }

    fn require_project(&self, name: &ProjectName) -> Result<PathBuf> {
        let dir = self.layout().project_dir(name.as_str());
        if dir.join(ENTRY_POINT).is_file() {
            Ok(dir)
        } else {
            Err(ProjectError::not_found("project", name.as_str()))
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Delete
    // ─────────────────────────────────────────────────────────────────────

    /// Remove a project directory and everything in it.
    ///
    /// Refuses unless `confirm` is true. Only the directory has to exist: one
    /// without an entry point is not listed as a project, but it can still be
    /// deleted, which is how leftovers of a broken project get cleaned up.
    pub fn delete(&self, name: &str, confirm: bool) -> Result<()> {
        let name = ProjectName::new(name)?;
        let dir = self.layout().project_dir(name.as_str());
        if !dir.is_dir() {
            return Err(ProjectError::not_found("project", name.as_str()));
        }
        if !confirm {
            return Err(ProjectError::NotConfirmed(name.into_inner()));
        }

        fs::remove_dir_all(&dir).map_err(ProjectError::io(&dir))?;
        self.resolver.invalidate_project(name.as_str());
        info!(project = %name, "project deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Export / import
    // ─────────────────────────────────────────────────────────────────────

    /// Pack a project into a zip archive and return its path.
    ///
    /// Without `output` the archive goes to `exports/<name>_<timestamp>.zip`.
    /// An explicit path without a `.zip` extension gets one appended.
    pub fn export(&self, name: &str, output: Option<&Path>) -> Result<PathBuf> {
        let name = ProjectName::new(name)?;
        let dir = self.require_project(&name)?;
        let dest = match output {
            Some(path) => with_zip_extension(path),
            None => {
                let stamp = Local::now().format("%Y%m%d_%H%M%S");
                self.layout().exports_dir().join(format!("{name}_{stamp}.zip"))
            }
        };

        ArchiveCodec::pack(&dir, name.as_str(), &dest)?;
        info!(project = %name, archive = %dest.display(), "project exported");
        Ok(dest)
    }

    /// Import a project archive, optionally under a new name.
    ///
    /// Never overwrites an existing project. When the name changes, the
    /// settings document's `name` field is updated on a best-effort basis.
    pub fn import(&self, archive: &Path, new_name: Option<&str>) -> Result<Project> {
        if !archive.is_file() {
            return Err(ProjectError::not_found("archive", archive.display().to_string()));
        }
        let new_name = new_name.map(ProjectName::new).transpose()?;

        let staging = tempfile::tempdir().map_err(ProjectError::io(std::env::temp_dir()))?;
        let root = ArchiveCodec::unpack(archive, staging.path())?;
        let original = archived_name(&root, staging.path());

        let name = match (new_name, original.as_deref()) {
            (Some(name), _) => name,
            (None, Some(original)) => ProjectName::new(original)?,
            (None, None) => {
                return Err(ProjectError::InvalidName {
                    name: String::new(),
                    reason: "the archive does not record a project name; provide a new name".to_owned(),
                });
            }
        };

        let target = self.claim_dir(&name)?;
        if let Err(e) = copy_tree(&root, &target) {
            if let Err(cleanup) = fs::remove_dir_all(&target) {
                error!(path = %target.display(), error = %cleanup, "failed to remove partial import");
            }
            return Err(ProjectError::Io { path: target, source: e });
        }
        self.resolver.invalidate_project(name.as_str());

        if original.as_deref() != Some(name.as_str()) {
            self.rename_settings(&name, &target);
        }

        info!(project = %name, archive = %archive.display(), "project imported");
        Ok(self.describe(name.as_str(), target, Fallbacks::IMPORT))
    }

    fn rename_settings(&self, name: &ProjectName, dir: &Path) {
        let layer = ConfigLayer::ProjectSettings(name.to_string());
        let mut settings = read_document(&dir.join(CONFIGS_DIR).join(layer.file_name()));
        let _ = settings.insert("name", name.as_str());
        match self.resolver.save(&layer, settings) {
            Ok(()) => self.resolver.invalidate(&layer),
            Err(e) => warn!(project = %name, error = %e, "failed to update imported project name"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Run
    // ─────────────────────────────────────────────────────────────────────

    /// Launch the project's entry point with the project directory as its
    /// working directory. Returns as soon as the process has started.
    pub fn run(&self, name: &str) -> Result<ProcessHandle> {
        let name = ProjectName::new(name)?;
        let dir = self.require_project(&name)?;
        let script = dir.join(ENTRY_POINT);
        let handle = self
            .runner
            .spawn(&script, &dir)
            .map_err(|source| ProjectError::Spawn {
                script: script.clone(),
                source,
            })?;
        info!(project = %name, pid = handle.id(), "project started");
        Ok(handle)
    }
}

impl fmt::Debug for ProjectManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectManager")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Removes a half-created project unless disarmed.
struct Rollback<'a> {
    dir: &'a Path,
    name: &'a str,
    resolver: &'a ConfigResolver,
    armed: bool,
}

impl Rollback<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_dir_all(self.dir) {
            Ok(()) => warn!(project = self.name, "project creation rolled back"),
            Err(e) => error!(project = self.name, path = %self.dir.display(), error = %e, "rollback failed"),
        }
        self.resolver.invalidate_project(self.name);
    }
}

/// Merge the mapping under `section` of a template overlay into `base`.
fn with_overlay(base: ValueTree, overlay: &ValueTree, section: &str) -> ValueTree {
    match overlay.get(section) {
        Some(part @ ValueTree::Mapping(_)) => merge(base, part.clone()),
        None | Some(ValueTree::Null) => base,
        Some(other) => {
            warn!(section, kind = other.kind(), "template overlay section is not a mapping, ignoring");
            base
        }
    }
}

/// The project name recorded by an extracted archive.
///
/// A nested root is named by its directory; a flat archive by the `name`
/// field of its settings document.
fn archived_name(root: &Path, staging: &Path) -> Option<String> {
    if root == staging {
        let settings_file = ConfigLayer::ProjectSettings(String::new()).file_name();
        read_document(&root.join(CONFIGS_DIR).join(settings_file))
            .get_str("name")
            .map(str::to_owned)
    } else {
        root.file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
    }
}

fn is_plain_file_stem(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn with_zip_extension(path: &Path) -> PathBuf {
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        path.to_path_buf()
    } else {
        let mut raw = path.as_os_str().to_owned();
        raw.push(".zip");
        PathBuf::from(raw)
    }
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            let _ = fs::copy(entry.path(), &target)?;
        } else {
            warn!(path = %entry.path().display(), "skipping non-regular file during import");
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
