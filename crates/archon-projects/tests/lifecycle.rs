#![allow(missing_docs, unused_results)]

use std::path::Path;
use std::sync::Arc;

use archon_core::ValueTree;
use archon_projects::{ENTRY_POINT, ProjectError, ProjectManager};
use archon_settings::loader::write_document;
use archon_settings::{ConfigError, ConfigLayer, ConfigResolver, FrameworkLayout};
use assert_matches::assert_matches;

fn setup() -> (tempfile::TempDir, ProjectManager) {
    let dir = tempfile::tempdir().unwrap();
    let resolver = ConfigResolver::with_env(FrameworkLayout::new(dir.path()), |name| {
        (name == "API_TOKEN").then(|| "secret".to_owned())
    });
    (dir, ProjectManager::new(Arc::new(resolver)))
}

/// Manager whose resolver refuses to write documents named `file_name`.
fn setup_failing_save(file_name: &'static str) -> (tempfile::TempDir, ProjectManager) {
    let dir = tempfile::tempdir().unwrap();
    let resolver = ConfigResolver::with_env(FrameworkLayout::new(dir.path()), |_| None).with_writer(
        move |path, value| {
            if path.file_name() == Some(std::ffi::OsStr::new(file_name)) {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::other("disk full"),
                });
            }
            write_document(path, value)
        },
    );
    (dir, ProjectManager::new(Arc::new(resolver)))
}

fn projects_dir(root: &Path) -> std::path::PathBuf {
    root.join("projects")
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn add_template(root: &Path, name: &str, overlay: Option<&str>) {
    let templates = root.join("templates");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join(format!("{name}.flow.json")), r#"{"nodes": []}"#).unwrap();
    if let Some(overlay) = overlay {
        std::fs::write(templates.join(format!("{name}.config.yaml")), overlay).unwrap();
    }
}

// ── create ──────────────────────────────────────────────────────────────

#[test]
fn create_scaffolds_complete_project() {
    let (root, manager) = setup();
    let project = manager.create("my-bot", None, "A helpful bot").unwrap();

    let dir = projects_dir(root.path()).join("my-bot");
    assert_eq!(project.path, manager.resolver().layout().project_dir("my-bot"));
    for sub in ["configs", "logs", "data", "flowise_exports", "custom_components"] {
        assert!(dir.join(sub).is_dir(), "{sub}");
    }
    assert!(dir.join(ENTRY_POINT).is_file());
    assert!(dir.join("README.md").is_file());
    assert!(dir.join("configs/project_settings.yaml").is_file());
    assert!(dir.join("configs/agent_config.yaml").is_file());

    assert_eq!(project.name, "my-bot");
    assert_eq!(project.description, "A helpful bot");
    assert_eq!(project.version, "0.1.0");
    assert_eq!(project.status, "development");
    assert_eq!(project.template, "custom");
    assert!(project.created_at().is_some());

    let agent = manager
        .resolver()
        .load(&ConfigLayer::ProjectAgentConfig("my-bot".into()));
    assert_eq!(
        agent
            .get_path(&["agents", "primary_agent", "config_overrides", "name"])
            .and_then(ValueTree::as_str),
        Some("my-bot Assistant")
    );
}

#[cfg(unix)]
#[test]
fn entry_point_is_executable() {
    use std::os::unix::fs::PermissionsExt;
    let (root, manager) = setup();
    manager.create("my-bot", None, "").unwrap();
    let script = projects_dir(root.path()).join("my-bot").join(ENTRY_POINT);
    assert_eq!(std::fs::metadata(script).unwrap().permissions().mode() & 0o111, 0o111);
}

#[test]
fn invalid_names_fail_without_touching_disk() {
    let (root, manager) = setup();
    let too_long = "x".repeat(41);
    for name in ["ab", "Name-With-Caps", too_long.as_str()] {
        assert_matches!(
            manager.create(name, None, ""),
            Err(ProjectError::InvalidName { .. }),
            "{name}"
        );
    }
    assert!(!projects_dir(root.path()).exists());
}

#[test]
fn missing_template_rolls_back() {
    let (root, manager) = setup();
    assert_matches!(
        manager.create("my-bot", Some("rag-template"), ""),
        Err(ProjectError::NotFound { kind: "template", .. })
    );
    assert!(!projects_dir(root.path()).join("my-bot").exists());
    assert!(manager.list().iter().all(|p| p.name != "my-bot"));
}

#[test]
fn template_with_path_separator_is_not_found() {
    let (root, manager) = setup();
    add_template(root.path(), "ok", None);
    assert_matches!(
        manager.create("my-bot", Some("../templates/ok"), ""),
        Err(ProjectError::NotFound { kind: "template", .. })
    );
    assert!(!projects_dir(root.path()).join("my-bot").exists());
}

#[test]
fn template_flow_and_overlay_are_applied() {
    let (root, manager) = setup();
    add_template(
        root.path(),
        "rag-template",
        Some("project_settings:\n  status: beta\n  settings: {model: big}\nagent_config:\n  agents: {primary_agent: {profile: researcher}}\n"),
    );

    let project = manager.create("my-bot", Some("rag-template"), "RAG").unwrap();
    assert_eq!(project.status, "beta");
    assert_eq!(project.template, "rag-template");

    let dir = projects_dir(root.path()).join("my-bot");
    assert_eq!(
        read(&dir.join("flowise_exports/main_rag-template.flow.json")),
        r#"{"nodes": []}"#
    );

    let settings = manager
        .resolver()
        .load(&ConfigLayer::ProjectSettings("my-bot".into()));
    assert_eq!(settings.get_path(&["settings", "model"]).and_then(ValueTree::as_str), Some("big"));
    assert_eq!(
        settings.get_path(&["settings", "llm_provider"]).and_then(ValueTree::as_str),
        Some("default")
    );

    let agent = manager
        .resolver()
        .load(&ConfigLayer::ProjectAgentConfig("my-bot".into()));
    assert_eq!(
        agent.get_path(&["agents", "primary_agent", "profile"]).and_then(ValueTree::as_str),
        Some("researcher")
    );
    assert!(
        agent
            .get_path(&["agents", "primary_agent", "config_overrides", "name"])
            .is_some()
    );
}

#[test]
fn malformed_overlay_is_ignored() {
    let (root, manager) = setup();
    add_template(root.path(), "broken", Some("project_settings: [unclosed\n"));
    let project = manager.create("my-bot", Some("broken"), "").unwrap();
    assert_eq!(project.status, "development");
}

#[test]
fn failed_settings_save_rolls_back() {
    let (root, manager) = setup_failing_save("project_settings.yaml");
    let err = manager.create("my-bot", None, "").unwrap_err();
    assert_matches!(err, ProjectError::ConfigIo(ConfigError::Io { .. }));
    assert!(!projects_dir(root.path()).join("my-bot").exists());
    assert!(manager.list().is_empty());

    let resolver = manager.resolver();
    let reads = resolver.disk_reads();
    let settings = resolver.load(&ConfigLayer::ProjectSettings("my-bot".into()));
    assert!(settings.is_empty_mapping());
    assert_eq!(resolver.disk_reads(), reads + 1);
}

#[test]
fn failed_agent_config_save_still_creates_project() {
    let (root, manager) = setup_failing_save("agent_config.yaml");
    let project = manager.create("my-bot", None, "Still here").unwrap();
    assert_eq!(project.description, "Still here");

    let dir = projects_dir(root.path()).join("my-bot");
    assert!(dir.join(ENTRY_POINT).is_file());
    assert!(dir.join("configs/project_settings.yaml").is_file());
    assert!(!dir.join("configs/agent_config.yaml").exists());
    let names: Vec<_> = manager.list().into_iter().map(|p| p.name).collect();
    assert_eq!(names, ["my-bot"]);
}

#[test]
fn duplicate_create_leaves_original_untouched() {
    let (root, manager) = setup();
    manager.create("my-bot", None, "first").unwrap();
    let settings_path = projects_dir(root.path()).join("my-bot/configs/project_settings.yaml");
    let before = std::fs::read(&settings_path).unwrap();

    assert_matches!(
        manager.create("my-bot", None, "second"),
        Err(ProjectError::AlreadyExists(name)) if name == "my-bot"
    );
    assert_eq!(std::fs::read(&settings_path).unwrap(), before);
}

#[test]
fn template_flow_that_is_a_directory_rolls_back() {
    let (root, manager) = setup();
    let flow = root.path().join("templates/tpl.flow.json");
    std::fs::create_dir_all(&flow).unwrap();

    assert_matches!(
        manager.create("my-bot", Some("tpl"), ""),
        Err(ProjectError::NotFound { kind: "template", .. })
    );
    assert!(!projects_dir(root.path()).join("my-bot").exists());
    assert!(
        manager
            .resolver()
            .load(&ConfigLayer::ProjectSettings("my-bot".into()))
            .is_empty_mapping()
    );
}

// ── list ────────────────────────────────────────────────────────────────

#[test]
fn list_is_sorted_and_skips_non_projects() {
    let (root, manager) = setup();
    assert!(manager.list().is_empty());

    manager.create("zeta-bot", None, "").unwrap();
    manager.create("alpha-bot", None, "first").unwrap();
    std::fs::create_dir_all(projects_dir(root.path()).join("not-a-project/configs")).unwrap();

    let names: Vec<String> = manager.list().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["alpha-bot", "zeta-bot"]);
}

#[test]
fn list_uses_fallbacks_for_missing_fields() {
    let (root, manager) = setup();
    let dir = projects_dir(root.path()).join("bare");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(ENTRY_POINT), "echo bare\n").unwrap();

    let projects = manager.list();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].description, "No description.");
    assert_eq!(projects[0].version, "N/A");
    assert_eq!(projects[0].status, "unknown");
}

// ── delete ──────────────────────────────────────────────────────────────

#[test]
fn delete_requires_confirmation() {
    let (root, manager) = setup();
    manager.create("my-bot", None, "").unwrap();
    let dir = projects_dir(root.path()).join("my-bot");

    assert_matches!(manager.delete("my-bot", false), Err(ProjectError::NotConfirmed(_)));
    assert!(dir.is_dir());

    manager.delete("my-bot", true).unwrap();
    assert!(!dir.exists());
    assert!(manager.list().is_empty());
}

#[test]
fn delete_removes_directory_without_entry_point() {
    let (root, manager) = setup();
    let leftover = projects_dir(root.path()).join("half-built");
    std::fs::create_dir_all(leftover.join("configs")).unwrap();
    assert!(!manager.exists("half-built"));

    manager.delete("half-built", true).unwrap();
    assert!(!leftover.exists());
}

#[test]
fn delete_missing_project_is_not_found() {
    let (_root, manager) = setup();
    assert_matches!(
        manager.delete("ghost", true),
        Err(ProjectError::NotFound { kind: "project", .. })
    );
}

#[test]
fn recreate_after_delete_sees_fresh_settings() {
    let (_root, manager) = setup();
    manager.create("my-bot", None, "old").unwrap();
    assert_eq!(manager.get("my-bot").unwrap().description, "old");
    manager.delete("my-bot", true).unwrap();
    manager.create("my-bot", None, "new").unwrap();
    assert_eq!(manager.get("my-bot").unwrap().description, "new");
}

// ── export / import ─────────────────────────────────────────────────────

#[test]
fn export_then_import_under_new_name() {
    let (root, manager) = setup();
    manager.create("my-bot", None, "Original").unwrap();
    let archive = manager.export("my-bot", None).unwrap();
    assert!(archive.starts_with(root.path().join("exports")));
    assert_eq!(archive.extension().and_then(|e| e.to_str()), Some("zip"));

    let imported = manager.import(&archive, Some("my-bot-copy")).unwrap();
    assert_eq!(imported.name, "my-bot-copy");
    assert_eq!(imported.description, "Original");

    let load = |name: &str| {
        let value: ValueTree =
            serde_yaml::from_str(&read(&projects_dir(root.path()).join(name).join("configs/project_settings.yaml")))
                .unwrap();
        value
    };
    let mut original = load("my-bot");
    let copy = load("my-bot-copy");
    assert_eq!(copy.get_str("name"), Some("my-bot-copy"));
    let _ = original.insert("name", "my-bot-copy");
    assert_eq!(copy, original);

    for file in [ENTRY_POINT, "README.md", "configs/agent_config.yaml"] {
        assert_eq!(
            read(&projects_dir(root.path()).join("my-bot").join(file)),
            read(&projects_dir(root.path()).join("my-bot-copy").join(file)),
            "{file}"
        );
    }
}

#[test]
fn export_into_own_data_dir_round_trips_cleanly() {
    let (root, manager) = setup();
    manager.create("my-bot", None, "Original").unwrap();
    let output = projects_dir(root.path()).join("my-bot/data/backup.zip");
    let archive = manager.export("my-bot", Some(&output)).unwrap();
    assert_eq!(archive, output);

    manager.import(&archive, Some("my-bot-copy")).unwrap();
    let copied: Vec<_> = std::fs::read_dir(projects_dir(root.path()).join("my-bot-copy/data"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(copied.is_empty(), "{copied:?}");
}

#[test]
fn import_under_original_name_is_rejected_while_it_exists() {
    let (root, manager) = setup();
    manager.create("my-bot", None, "").unwrap();
    let archive = manager.export("my-bot", Some(&root.path().join("backup"))).unwrap();
    assert_eq!(archive, root.path().join("backup.zip"));

    assert_matches!(manager.import(&archive, None), Err(ProjectError::AlreadyExists(_)));

    manager.delete("my-bot", true).unwrap();
    let restored = manager.import(&archive, None).unwrap();
    assert_eq!(restored.name, "my-bot");
    assert!(manager.exists("my-bot"));
}

#[test]
fn import_rejects_invalid_new_name() {
    let (root, manager) = setup();
    manager.create("my-bot", None, "").unwrap();
    let archive = manager.export("my-bot", None).unwrap();
    assert_matches!(
        manager.import(&archive, Some("Bad Name")),
        Err(ProjectError::InvalidName { .. })
    );
    assert_eq!(std::fs::read_dir(projects_dir(root.path())).unwrap().count(), 1);
}

#[test]
fn import_of_corrupt_archive_fails() {
    let (root, manager) = setup();
    let archive = root.path().join("junk.zip");
    std::fs::write(&archive, "definitely not a zip").unwrap();
    assert_matches!(manager.import(&archive, Some("new-bot")), Err(ProjectError::Archive(_)));
    assert!(!projects_dir(root.path()).join("new-bot").exists());
}

#[test]
fn import_of_missing_archive_is_not_found() {
    let (root, manager) = setup();
    assert_matches!(
        manager.import(&root.path().join("nope.zip"), None),
        Err(ProjectError::NotFound { kind: "archive", .. })
    );
}

#[test]
fn export_missing_project_is_not_found() {
    let (_root, manager) = setup();
    assert_matches!(
        manager.export("ghost", None),
        Err(ProjectError::NotFound { kind: "project", .. })
    );
}

#[test]
fn imported_settings_keep_placeholders_on_disk() {
    let (root, manager) = setup();
    manager.create("my-bot", None, "").unwrap();
    let settings_path = projects_dir(root.path()).join("my-bot/configs/project_settings.yaml");
    let mut doc: ValueTree = serde_yaml::from_str(&read(&settings_path)).unwrap();
    let _ = doc.insert("token", "${API_TOKEN}");
    manager
        .resolver()
        .save(&ConfigLayer::ProjectSettings("my-bot".into()), doc)
        .unwrap();

    let archive = manager.export("my-bot", None).unwrap();
    manager.import(&archive, Some("bot-two")).unwrap();

    let raw = read(&projects_dir(root.path()).join("bot-two/configs/project_settings.yaml"));
    assert!(raw.contains("${API_TOKEN}"));
    let effective = manager.resolver().effective_config("bot-two");
    assert_eq!(effective.get_str("token"), Some("secret"));
    assert_eq!(effective.get_str("name"), Some("bot-two"));
}

// ── run ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_launches_entry_point_in_project_dir() {
    let (root, manager) = setup();
    manager.create("my-bot", None, "Runs").unwrap();
    let dir = projects_dir(root.path()).join("my-bot");
    std::fs::write(dir.join(ENTRY_POINT), "pwd\necho from-entry-point\n").unwrap();

    let handle = manager.run("my-bot").unwrap();
    let output = handle.wait_with_output().await.unwrap();
    assert_eq!(output.exit_code, 0);
    let mut lines = output.stdout.lines();
    assert_eq!(
        Path::new(lines.next().unwrap()).canonicalize().unwrap(),
        dir.canonicalize().unwrap()
    );
    assert_eq!(lines.next(), Some("from-entry-point"));
}

#[tokio::test]
async fn generated_entry_point_runs() {
    let (_root, manager) = setup();
    manager.create("my-bot", None, "It's alive").unwrap();
    let output = manager.run("my-bot").unwrap().wait_with_output().await.unwrap();
    assert_eq!(output.exit_code, 0, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("Hello from my-bot!"));
    assert!(output.stdout.contains("Project description: It's alive"));
}

#[test]
fn run_missing_project_is_not_found() {
    let (_root, manager) = setup();
    assert_matches!(manager.run("ghost"), Err(ProjectError::NotFound { .. }));
}
