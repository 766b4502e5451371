//! Configuration Discovery Tests
//!
//! `luac-batch.toml` is found by walking up from the working directory, so
//! these tests change the process working directory and run serially.

use luac_batch::config::{
    load_config, merge_cli_overrides, BackendKind, CliOverrides, ConfigError, ObfuscationLevel,
};
use luac_batch::pipeline::{CompileContext, Pipeline, PipelineError};
use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a project config and a resource folder below it.
fn setup_project(temp: &TempDir, config: &str) -> PathBuf {
    let project = temp.path().to_path_buf();
    fs::write(project.join("luac-batch.toml"), config).unwrap();
    let resource = project.join("resources").join("race");
    fs::create_dir_all(&resource).unwrap();
    fs::write(resource.join("a.lua"), "print('a')").unwrap();
    fs::write(resource.join("meta.xml"), r#"<script src="a.lua" />"#).unwrap();
    project
}

/// Run `f` with the working directory set to `dir`.
fn in_dir<F, R>(dir: &Path, f: F) -> R
where
    F: FnOnce() -> R,
{
    let original_dir = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir).unwrap();

    let result = f();

    std::env::set_current_dir(original_dir).unwrap();
    result
}

#[test]
#[serial]
fn test_config_found_from_nested_directory() {
    let temp = TempDir::new().unwrap();
    let project = setup_project(
        &temp,
        r#"
[compile]
level = "e"
backend = "local"
jobs = 2

[backup]
dir = "snapshots"
"#,
    );

    let config = in_dir(&project.join("resources").join("race"), || load_config(None)).unwrap();

    assert_eq!(config.level().unwrap(), ObfuscationLevel::Basic);
    assert_eq!(config.compile.backend, BackendKind::Local);
    assert_eq!(config.compile.jobs, 2);
    // Relative to the config file, not the working directory
    assert!(config.backup.dir.unwrap().ends_with("snapshots"));
}

#[test]
#[serial]
fn test_cli_overrides_beat_config_file() {
    let temp = TempDir::new().unwrap();
    let project = setup_project(&temp, "[compile]\nlevel = \"1\"\nretries = 4\n");

    let mut config = in_dir(&project, || load_config(None)).unwrap();
    merge_cli_overrides(
        &mut config,
        &CliOverrides { level: Some("3".to_string()), ..Default::default() },
    );

    assert_eq!(config.level().unwrap(), ObfuscationLevel::Maximum);
    assert_eq!(config.compile.retries, 4);
}

#[test]
#[serial]
fn test_invalid_config_file_stops_run() {
    let temp = TempDir::new().unwrap();
    let project = setup_project(
        &temp,
        "[compile]\nlevel = \"7\"\n\n[backup]\ndelete_originals = true\n",
    );

    let config = in_dir(&project, || load_config(None)).unwrap();
    let root = project.join("resources").join("race");
    let err = Pipeline::new(CompileContext::new(config, root.clone())).run().unwrap_err();

    match err {
        PipelineError::Config(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected validation error, got {}", other),
    }
    assert!(root.join("a.lua").exists());
    assert!(!root.join("a.luac").exists());
}

#[test]
#[serial]
fn test_unreadable_config_is_parse_error() {
    let temp = TempDir::new().unwrap();
    let project = setup_project(&temp, "[compile\nlevel = ");

    let result = in_dir(&project, || load_config(None));
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}
