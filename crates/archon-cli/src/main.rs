//! # archon
//!
//! Command-line front end: manages projects under a framework root and
//! inspects or edits its configuration layers.

#![deny(unsafe_code)]

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use archon_settings::LayerKind;
use clap::{Parser, Subcommand, ValueEnum};

use crate::commands::App;
use crate::output::Format;

/// Archon project and configuration manager.
#[derive(Parser, Debug)]
#[command(name = archon_core::constants::NAME, version = archon_core::constants::VERSION, about = "Archon project and configuration manager")]
struct Cli {
    /// Framework root directory.
    #[arg(long, global = true, env = "ARCHON_ROOT", default_value = ".")]
    root: PathBuf,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = archon_core::logging::DEFAULT_LEVEL)]
    log_level: String,

    /// Encoding of log events on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Print results as JSON instead of YAML.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create, list, delete, export, import and run projects.
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Inspect and save configuration layers.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect the tool registry.
    #[command(subcommand)]
    Tools(ToolsCommand),
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    /// Scaffold a new project.
    Create {
        name: String,
        /// Template under `templates/`.
        #[arg(long)]
        template: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List projects.
    List,
    /// Delete a project directory.
    Delete {
        name: String,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
    /// Pack a project into a zip archive.
    Export {
        name: String,
        /// Archive path; defaults to a timestamped file under `exports/`.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Unpack a project archive into `projects/`.
    Import {
        archive: PathBuf,
        /// Name for the imported project.
        #[arg(long)]
        name: Option<String>,
    },
    /// Run a project's entry point.
    Run {
        name: String,
        /// Print the process id and return instead of streaming output.
        #[arg(long)]
        detach: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print one layer with placeholders substituted.
    Show {
        #[arg(value_parser = commands::parse_layer)]
        layer: LayerKind,
        #[arg(long)]
        project: Option<String>,
    },
    /// Print the merged configuration of a project.
    Effective { project: String },
    /// Replace a layer with the contents of a YAML file.
    Save {
        #[arg(value_parser = commands::parse_layer)]
        layer: LayerKind,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List tools declared in the tool registry that could be instantiated.
    List,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    match args.log_format {
        LogFormat::Compact => archon_core::logging::init_subscriber(&args.log_level),
        LogFormat::Json => archon_core::logging::init_json_subscriber(&args.log_level),
    }

    let app = App::new(&args.root, Format::from_flag(args.json));
    match args.command {
        Command::Project(command) => commands::project(&app, command).await,
        Command::Config(command) => commands::config(&app, command),
        Command::Tools(command) => commands::tools(&app, command),
    }
}
