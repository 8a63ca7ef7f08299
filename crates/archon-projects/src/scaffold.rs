//! Files and documents written into a new project.

use std::path::Path;

use archon_core::ValueTree;
use archon_settings::layer::CONFIGS_DIR;
use chrono::{SecondsFormat, Utc};

/// Entry-point script whose presence makes a directory a project.
pub const ENTRY_POINT: &str = "project_main.sh";

/// Project README file name.
pub const README: &str = "README.md";

/// Directory receiving copied template flows.
pub const FLOW_EXPORTS_DIR: &str = "flowise_exports";

/// Working directories created in every project.
pub const PROJECT_DIRS: [&str; 5] = [CONFIGS_DIR, "logs", "data", FLOW_EXPORTS_DIR, "custom_components"];

/// Template name recorded for projects created without a template.
pub const CUSTOM_TEMPLATE: &str = "custom";

const DEFAULT_VERSION: &str = "0.1.0";
const DEFAULT_STATUS: &str = "development";
const DEFAULT_FLOW_ENDPOINT: &str = "http://localhost:3000/api/v1/prediction/YOUR-FLOW-ID";

/// Default project settings document.
pub fn default_settings(name: &str, description: &str, template: Option<&str>) -> ValueTree {
    let settings: ValueTree = [("llm_provider", "default"), ("model", "default")].into_iter().collect();
    [
        ("name", ValueTree::from(name)),
        ("description", ValueTree::from(description)),
        ("version", ValueTree::from(DEFAULT_VERSION)),
        ("created", ValueTree::from(timestamp())),
        ("status", ValueTree::from(DEFAULT_STATUS)),
        ("template", ValueTree::from(template.unwrap_or(CUSTOM_TEMPLATE))),
        ("settings", settings),
        ("flowise_api_endpoint", ValueTree::from(DEFAULT_FLOW_ENDPOINT)),
    ]
    .into_iter()
    .collect()
}

/// Default agent configuration document.
pub fn default_agent_config(name: &str) -> ValueTree {
    let overrides: ValueTree = [("name", format!("{name} Assistant"))].into_iter().collect();
    let primary: ValueTree = [
        ("profile", ValueTree::from("assistant")),
        ("config_overrides", overrides),
    ]
    .into_iter()
    .collect();
    let agents: ValueTree = [("primary_agent", primary)].into_iter().collect();
    [("agents", agents)].into_iter().collect()
}

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Quote `s` as a single POSIX shell word.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Entry-point script for a new project.
pub fn entry_point_script(name: &str, description: &str) -> String {
    let header = description.lines().next().unwrap_or_default();
    let quoted_name = shell_quote(name);
    format!(
        r#"#!/usr/bin/env bash
# {name} - main project entry point
# Description: {header}
set -euo pipefail

PROJECT_DIR="$(cd "$(dirname "${{BASH_SOURCE[0]}}")" && pwd)"
FRAMEWORK_ROOT="$(cd "$PROJECT_DIR/../.." && pwd)"
PROJECT_NAME={quoted_name}

mkdir -p "$PROJECT_DIR/logs"
LOG_FILE="$PROJECT_DIR/logs/$(date +%Y%m%d_%H%M%S).log"

log() {{
    printf '%s - %s - %s\n' "$(date '+%Y-%m-%d %H:%M:%S')" "$PROJECT_NAME" "$*" | tee -a "$LOG_FILE" >&2
}}

log "Starting project: $PROJECT_NAME"

# Effective configuration, when the archon CLI is available.
if command -v archon >/dev/null 2>&1; then
    archon --root "$FRAMEWORK_ROOT" config effective "$PROJECT_NAME" >"$PROJECT_DIR/data/effective_config.yaml" \
        && log "Project configuration loaded."
fi

echo "Hello from $PROJECT_NAME!"
echo "Project description: "{quoted_description}

# Project-specific logic goes here.

log "Project $PROJECT_NAME completed successfully."
"#,
        quoted_description = shell_quote(description),
    )
}

/// README for a new project.
pub fn readme(name: &str, description: &str, template: Option<&str>) -> String {
    let template = template.unwrap_or("Custom");
    let created = Utc::now().format("%Y-%m-%d");
    format!(
        r"# {name}

{description}

## Overview

This project is managed by the Archon framework.

- **Template**: {template}
- **Created**: {created}
- **Status**: Development

## Directory Structure

- `configs/` - Configuration files for the project
- `data/` - Data files used by the project
- `logs/` - Log files generated during execution
- `flowise_exports/` - Flowise flow exports (if applicable)
- `custom_components/` - Custom components for the project

## Setup

1. Review and update project settings in `configs/project_settings.yaml`.
2. Configure agents in `configs/agent_config.yaml`.
3. Values of the form `${{NAME}}` are read from the environment when loaded.

## Running the Project

```bash
# From the framework root
archon project run {name}

# Or directly
bash projects/{name}/{ENTRY_POINT}
```

## Development Notes

Add any project-specific notes, requirements, or development guidelines here.
"
    )
}

/// Mark `path` executable (`0o755`). A no-op where permissions are not supported.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

/// Mark `path` executable (`0o755`). A no-op where permissions are not supported.
#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
