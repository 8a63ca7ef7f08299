//! Subcommand handlers.

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use archon_projects::{ProcessHandle, ProjectManager};
use archon_settings::loader::parse_document;
use archon_settings::{ConfigLayer, ConfigResolver, LayerKind};
use archon_tools::ToolRegistry;
use serde::Serialize;
use tracing::{debug, info};

use crate::output::Format;
use crate::{ConfigCommand, ProjectCommand, ToolsCommand};

/// Shared state for one invocation.
pub struct App {
    pub manager: ProjectManager,
    pub format: Format,
}

impl App {
    pub fn new(root: &Path, format: Format) -> Self {
        let resolver = Arc::new(ConfigResolver::new(root));
        debug!(root = %resolver.layout().root().display(), "framework root");
        Self {
            manager: ProjectManager::new(resolver),
            format,
        }
    }

    fn resolver(&self) -> &ConfigResolver {
        self.manager.resolver()
    }
}

#[derive(Serialize)]
struct Exported<'a> {
    project: &'a str,
    archive: &'a Path,
}

#[derive(Serialize)]
struct Started<'a> {
    project: &'a str,
    pid: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// project
// ─────────────────────────────────────────────────────────────────────────────

pub async fn project(app: &App, command: ProjectCommand) -> Result<ExitCode> {
    match command {
        ProjectCommand::Create {
            name,
            template,
            description,
        } => {
            let project = app
                .manager
                .create(&name, template.as_deref(), &description)
                .with_context(|| format!("Failed to create project '{name}'"))?;
            info!(project = %project.name, "project created");
            app.format.print(&project)?;
        }
        ProjectCommand::List => {
            app.format.print(&app.manager.list())?;
        }
        ProjectCommand::Delete { name, yes } => {
            let confirmed = yes || confirm(&format!("Delete project '{name}' and all of its files?"))?;
            app.manager
                .delete(&name, confirmed)
                .with_context(|| format!("Failed to delete project '{name}'"))?;
            eprintln!("Deleted project '{name}'.");
        }
        ProjectCommand::Export { name, output } => {
            let archive = app
                .manager
                .export(&name, output.as_deref())
                .with_context(|| format!("Failed to export project '{name}'"))?;
            app.format.print(&Exported {
                project: &name,
                archive: &archive,
            })?;
        }
        ProjectCommand::Import { archive, name } => {
            let project = app
                .manager
                .import(&archive, name.as_deref())
                .with_context(|| format!("Failed to import '{}'", archive.display()))?;
            app.format.print(&project)?;
        }
        ProjectCommand::Run { name, detach } => {
            let handle = app
                .manager
                .run(&name)
                .with_context(|| format!("Failed to start project '{name}'"))?;
            if detach {
                app.format.print(&Started {
                    project: &name,
                    pid: handle.id(),
                })?;
            } else {
                let code = stream_to_completion(handle).await?;
                debug!(project = %name, exit_code = code, "project process finished");
                return Ok(exit_code(code));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Forward the child's output to ours until it exits.
async fn stream_to_completion(mut handle: ProcessHandle) -> Result<i32> {
    let stdout = handle.take_stdout();
    let stderr = handle.take_stderr();

    let out_task = tokio::spawn(async move {
        if let Some(mut pipe) = stdout {
            let _ = tokio::io::copy(&mut pipe, &mut tokio::io::stdout()).await;
        }
    });
    let err_task = tokio::spawn(async move {
        if let Some(mut pipe) = stderr {
            let _ = tokio::io::copy(&mut pipe, &mut tokio::io::stderr()).await;
        }
    });

    let status = handle.wait().await.context("Failed to wait for project process")?;
    let _ = out_task.await;
    let _ = err_task.await;
    Ok(status.code().unwrap_or(-1))
}

fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

/// Ask on the terminal. Non-interactive sessions never confirm.
fn confirm(question: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Ok(false);
    }
    eprint!("{question} [y/N] ");
    std::io::stderr().flush()?;
    let mut answer = String::new();
    let _ = stdin.lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

// ─────────────────────────────────────────────────────────────────────────────
// config
// ─────────────────────────────────────────────────────────────────────────────

pub fn config(app: &App, command: ConfigCommand) -> Result<ExitCode> {
    match command {
        ConfigCommand::Show { layer, project } => {
            let layer = layer.with_project(project.as_deref())?;
            let value = app.resolver().load(&layer);
            app.format.print(&*value)?;
        }
        ConfigCommand::Effective { project } => {
            if !app.manager.exists(&project) {
                bail!("Project '{project}' does not exist");
            }
            app.format.print(&app.resolver().effective_config(&project))?;
        }
        ConfigCommand::Save { layer, file, project } => {
            let layer = layer.with_project(project.as_deref())?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let value = parse_document(&text).with_context(|| format!("Invalid document {}", file.display()))?;
            if !value.is_mapping() {
                bail!("{} must contain a mapping at the top level", file.display());
            }
            save_layer(app.resolver(), &layer, value)?;
            eprintln!("Saved {layer}.");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn save_layer(resolver: &ConfigResolver, layer: &ConfigLayer, value: archon_core::ValueTree) -> Result<()> {
    resolver
        .save(layer, value)
        .with_context(|| format!("Failed to save layer {layer}"))?;
    // The cached copy is the raw document; the next load re-substitutes.
    resolver.invalidate(layer);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// tools
// ─────────────────────────────────────────────────────────────────────────────

pub fn tools(app: &App, command: ToolsCommand) -> Result<ExitCode> {
    match command {
        ToolsCommand::List => {
            let mut registry = ToolRegistry::with_builtins();
            let report = registry.load_from_config(&app.resolver().load(&ConfigLayer::ToolRegistry));
            if !report.skipped.is_empty() {
                eprintln!("Skipped tools: {}", report.skipped.join(", "));
            }
            app.format.print(&registry.list())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Parse a layer name given on the command line.
pub fn parse_layer(s: &str) -> Result<LayerKind> {
    s.parse().with_context(|| {
        format!("unknown layer '{s}' (expected global, agent_profiles, tool_registry, project, project_agent)")
    })
}
