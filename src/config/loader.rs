//! Configuration loading and discovery for `luac-batch.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{BackendKind, BatchConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for when no explicit config path is given.
pub const CONFIG_FILE_NAME: &str = "luac-batch.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse {CONFIG_FILE_NAME}: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

impl ConfigError {
    /// Run validation and turn the collected problems into an error.
    pub fn check(config: &BatchConfig) -> Result<(), ConfigError> {
        let errors = config.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()))
        }
    }
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override backup directory
    pub backup_dir: Option<PathBuf>,
    /// Override obfuscation level
    pub level: Option<String>,
    /// Override delete-originals policy
    pub delete_originals: Option<bool>,
    /// Override backend selection
    pub backend: Option<BackendKind>,
    /// Override local compiler path
    pub compiler: Option<PathBuf>,
    /// Override remote endpoint
    pub endpoint: Option<String>,
    /// Override worker count
    pub jobs: Option<usize>,
    /// Override per-job timeout
    pub timeout_secs: Option<u64>,
    /// Override retry count
    pub retries: Option<u32>,
}

/// Find luac-batch.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for luac-batch.toml
/// 2. Check XDG_CONFIG_HOME/luac-batch/luac-batch.toml (or ~/.config/...)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find luac-batch.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("luac-batch").join(CONFIG_FILE_NAME);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find luac-batch.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration.
///
/// If a path is provided, loads from that file. Otherwise uses `find_config()`
/// and falls back to defaults when nothing is found.
///
/// Validation is not applied here; CLI overrides still have to be merged
/// before the final configuration can be judged. Call [`ConfigError::check`]
/// afterwards.
pub fn load_config(path: Option<&Path>) -> Result<BatchConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(BatchConfig::default()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<BatchConfig, ConfigError> {
    tracing::debug!(path = %path.display(), "loading config");
    let contents = fs::read_to_string(path)?;
    let mut config: BatchConfig = toml::from_str(&contents)?;

    // Relative backup dirs are relative to the config file, not the cwd
    if let (Some(dir), Some(base)) = (config.backup.dir.as_ref(), path.parent()) {
        config.backup.dir = Some(resolve_path(base, dir));
    }

    Ok(config)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut BatchConfig, overrides: &CliOverrides) {
    if let Some(ref dir) = overrides.backup_dir {
        config.backup.dir = Some(dir.clone());
    }
    if let Some(ref level) = overrides.level {
        config.compile.level = level.clone();
    }
    if let Some(delete) = overrides.delete_originals {
        config.backup.delete_originals = delete;
    }
    if let Some(backend) = overrides.backend {
        config.compile.backend = backend;
    }
    if let Some(ref compiler) = overrides.compiler {
        config.local.compiler = compiler.clone();
    }
    if let Some(ref endpoint) = overrides.endpoint {
        config.remote.endpoint = endpoint.clone();
    }
    if let Some(jobs) = overrides.jobs {
        config.compile.jobs = jobs;
    }
    if let Some(timeout) = overrides.timeout_secs {
        config.compile.timeout_secs = timeout;
    }
    if let Some(retries) = overrides.retries {
        config.compile.retries = retries;
    }
}

/// Resolve a path relative to a base directory.
///
/// If the path is absolute, returns it unchanged.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(contents.as_bytes())
            .expect("should write config content");
        config_path
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[compile]\nlevel = \"2\"");

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "");

        let subdir = temp.path().join("resources").join("race");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        assert_eq!(find_config_from(subdir), Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        assert_eq!(find_config_from(temp.path().to_path_buf()), None);
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(
            temp.path(),
            r#"
[compile]
level = "1"
backend = "local"
jobs = 2

[backup]
dir = "snapshots"
"#,
        );

        let config = load_config(Some(&config_path)).expect("should load valid config");
        assert_eq!(config.compile.level, "1");
        assert_eq!(config.compile.backend, BackendKind::Local);
        assert_eq!(config.compile.jobs, 2);
        assert_eq!(config.backup.dir, Some(temp.path().join("snapshots")));
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_config(Some(&temp.path().join("nonexistent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "this is not valid toml {{{");

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_check_reports_every_problem() {
        let mut config = BatchConfig::default();
        config.compile.level = "9".to_string();
        config.backup.delete_originals = true;

        match ConfigError::check(&config) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().any(|e| e.contains("compile.level")));
                assert!(errors.iter().any(|e| e.contains("backup.delete_originals")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = BatchConfig::default();
        let overrides = CliOverrides {
            backup_dir: Some(PathBuf::from("bk")),
            level: Some("e".to_string()),
            delete_originals: Some(true),
            backend: Some(BackendKind::Local),
            compiler: Some(PathBuf::from("/usr/bin/luac_mta")),
            jobs: Some(3),
            timeout_secs: Some(5),
            retries: Some(1),
            ..Default::default()
        };

        merge_cli_overrides(&mut config, &overrides);
        assert_eq!(config.backup.dir, Some(PathBuf::from("bk")));
        assert_eq!(config.compile.level, "e");
        assert!(config.backup.delete_originals);
        assert_eq!(config.compile.backend, BackendKind::Local);
        assert_eq!(config.local.compiler, PathBuf::from("/usr/bin/luac_mta"));
        assert_eq!(config.compile.jobs, 3);
        assert_eq!(config.compile.timeout_secs, 5);
        assert_eq!(config.compile.retries, 1);
        assert!(config.is_valid());
    }

    #[test]
    fn test_merge_cli_overrides_empty_keeps_file_values() {
        let mut config = BatchConfig::default();
        config.compile.level = "2".to_string();
        merge_cli_overrides(&mut config, &CliOverrides::default());
        assert_eq!(config.compile.level, "2");
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/project");
        assert_eq!(resolve_path(root, Path::new("/abs")), PathBuf::from("/abs"));
        assert_eq!(resolve_path(root, Path::new("bk")), PathBuf::from("/project/bk"));
    }
}
