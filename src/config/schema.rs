//! Configuration schema types for `luac-batch.toml`
//!
//! Defines the structure and validation rules for a batch compile run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Obfuscation level accepted by both compile backends.
///
/// Parsed from either the numeric form (`"1"`, `"2"`, `"3"`) or the compiler
/// flag spelling (`"e"`, `"e2"`, `"e3"`, with or without a leading dash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObfuscationLevel {
    /// Basic obfuscation (`-e`)
    Basic,
    /// Enhanced obfuscation (`-e2`)
    Enhanced,
    /// Maximum obfuscation (`-e3`)
    #[default]
    Maximum,
}

impl ObfuscationLevel {
    /// All accepted levels, lowest first.
    pub const ALL: [ObfuscationLevel; 3] =
        [ObfuscationLevel::Basic, ObfuscationLevel::Enhanced, ObfuscationLevel::Maximum];

    /// Value sent as the `obfuscate` query parameter.
    pub fn query_value(&self) -> &'static str {
        match self {
            ObfuscationLevel::Basic => "1",
            ObfuscationLevel::Enhanced => "2",
            ObfuscationLevel::Maximum => "3",
        }
    }

    /// Flag passed to a local compiler executable.
    pub fn compiler_flag(&self) -> &'static str {
        match self {
            ObfuscationLevel::Basic => "-e",
            ObfuscationLevel::Enhanced => "-e2",
            ObfuscationLevel::Maximum => "-e3",
        }
    }
}

impl fmt::Display for ObfuscationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

/// Error returned when a level string is not one of the accepted spellings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown obfuscation level '{0}' (expected 1, 2, 3, e, e2 or e3)")]
pub struct InvalidLevel(pub String);

impl FromStr for ObfuscationLevel {
    type Err = InvalidLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('-') {
            "1" | "e" => Ok(ObfuscationLevel::Basic),
            "2" | "e2" => Ok(ObfuscationLevel::Enhanced),
            "3" | "e3" => Ok(ObfuscationLevel::Maximum),
            _ => Err(InvalidLevel(s.to_string())),
        }
    }
}

/// Which compile backend a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// HTTP compile service
    #[default]
    Remote,
    /// Local compiler executable
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Remote => write!(f, "remote"),
            BackendKind::Local => write!(f, "local"),
        }
    }
}

/// Compile section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Obfuscation level, validated into an [`ObfuscationLevel`]
    #[serde(default = "default_level")]
    pub level: String,
    /// Backend selector
    #[serde(default)]
    pub backend: BackendKind,
    /// Maximum number of compile jobs in flight
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Per-job timeout in seconds (remote call or subprocess)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts for a failed job
    #[serde(default)]
    pub retries: u32,
    /// Extension of compilable files, without the dot
    #[serde(default = "default_source_ext")]
    pub source_ext: String,
    /// Extension of compiled artifacts, without the dot
    #[serde(default = "default_artifact_ext")]
    pub artifact_ext: String,
    /// Base name of the manifest file
    #[serde(default = "default_manifest")]
    pub manifest: String,
}

fn default_level() -> String {
    "3".to_string()
}

pub(crate) fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Longest accepted per-job timeout (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

fn default_timeout_secs() -> u64 {
    60
}

fn default_source_ext() -> String {
    "lua".to_string()
}

fn default_artifact_ext() -> String {
    "luac".to_string()
}

fn default_manifest() -> String {
    "meta.xml".to_string()
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            backend: BackendKind::default(),
            jobs: default_jobs(),
            timeout_secs: default_timeout_secs(),
            retries: 0,
            source_ext: default_source_ext(),
            artifact_ext: default_artifact_ext(),
            manifest: default_manifest(),
        }
    }
}

/// Backup section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory receiving one snapshot per run. No backup if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Remove each source file once its artifact has been produced
    #[serde(default)]
    pub delete_originals: bool,
}

/// Remote backend section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Compile endpoint; query parameters are appended per request
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    "https://luac.mtasa.com/".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { endpoint: default_endpoint() }
    }
}

/// Local backend section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Compiler executable, looked up on `PATH` when not a path
    #[serde(default = "default_compiler")]
    pub compiler: PathBuf,
}

fn default_compiler() -> PathBuf {
    PathBuf::from("luac_mta")
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self { compiler: default_compiler() }
    }
}

/// Complete luac-batch.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Compile settings
    #[serde(default)]
    pub compile: CompileConfig,
    /// Backup settings
    #[serde(default)]
    pub backup: BackupConfig,
    /// Remote backend settings
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Local backend settings
    #[serde(default)]
    pub local: LocalConfig,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "compile.level")
    pub field: String,
    /// Error message
    pub message: String,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.field, self.message)
    }
}

impl BatchConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ConfigValidationError { field: field.to_string(), message });
        };

        if let Err(e) = self.compile.level.parse::<ObfuscationLevel>() {
            push("compile.level", e.to_string());
        }

        if self.compile.jobs == 0 {
            push("compile.jobs", "must be a positive integer".to_string());
        }

        if self.compile.timeout_secs == 0 {
            push("compile.timeout_secs", "must be a positive integer".to_string());
        } else if self.compile.timeout_secs > MAX_TIMEOUT_SECS {
            push("compile.timeout_secs", format!("must be at most {}", MAX_TIMEOUT_SECS));
        }

        for (field, ext) in [
            ("compile.source_ext", &self.compile.source_ext),
            ("compile.artifact_ext", &self.compile.artifact_ext),
        ] {
            if ext.is_empty() || ext.contains('.') || ext.contains(std::path::is_separator) {
                push(field, "must be a bare extension such as 'lua'".to_string());
            }
        }

        if self.compile.source_ext == self.compile.artifact_ext {
            push("compile.artifact_ext", "must differ from compile.source_ext".to_string());
        } else if !self.compile.artifact_ext.is_empty()
            && self.compile.source_ext.contains(self.compile.artifact_ext.as_str())
        {
            push("compile.artifact_ext", "must not be contained in compile.source_ext".to_string());
        }

        if self.compile.manifest.is_empty() {
            push("compile.manifest", "must be a non-empty file name".to_string());
        }

        if self.backup.delete_originals && self.backup.dir.is_none() {
            push(
                "backup.delete_originals",
                "requires backup.dir; originals are never deleted without a snapshot".to_string(),
            );
        }

        if self.compile.backend == BackendKind::Remote && self.remote.endpoint.is_empty() {
            push("remote.endpoint", "must be a non-empty URL".to_string());
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Parsed obfuscation level, if valid
    pub fn level(&self) -> Result<ObfuscationLevel, InvalidLevel> {
        self.compile.level.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parse() {
        let config: BatchConfig = toml::from_str("").unwrap();
        assert_eq!(config.compile.level, "3");
        assert_eq!(config.compile.backend, BackendKind::Remote);
        assert_eq!(config.compile.source_ext, "lua");
        assert_eq!(config.compile.artifact_ext, "luac");
        assert_eq!(config.compile.manifest, "meta.xml");
        assert!(config.backup.dir.is_none());
        assert!(!config.backup.delete_originals);
        assert_eq!(config.remote.endpoint, "https://luac.mtasa.com/");
        assert!(config.is_valid());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[compile]
level = "e2"
backend = "local"
jobs = 4
timeout_secs = 10
retries = 2

[backup]
dir = "backups"
delete_originals = true

[local]
compiler = "/opt/mta/luac_mta"
"#;
        let config: BatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.level().unwrap(), ObfuscationLevel::Enhanced);
        assert_eq!(config.compile.backend, BackendKind::Local);
        assert_eq!(config.compile.jobs, 4);
        assert_eq!(config.compile.timeout_secs, 10);
        assert_eq!(config.compile.retries, 2);
        assert_eq!(config.backup.dir, Some(PathBuf::from("backups")));
        assert_eq!(config.local.compiler, PathBuf::from("/opt/mta/luac_mta"));
        assert!(config.is_valid());
    }

    #[test]
    fn test_unknown_backend_rejected_by_parser() {
        let result: Result<BatchConfig, _> = toml::from_str("[compile]\nbackend = \"cloud\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("1".parse::<ObfuscationLevel>(), Ok(ObfuscationLevel::Basic));
        assert_eq!("e".parse::<ObfuscationLevel>(), Ok(ObfuscationLevel::Basic));
        assert_eq!("2".parse::<ObfuscationLevel>(), Ok(ObfuscationLevel::Enhanced));
        assert_eq!("-e2".parse::<ObfuscationLevel>(), Ok(ObfuscationLevel::Enhanced));
        assert_eq!("3".parse::<ObfuscationLevel>(), Ok(ObfuscationLevel::Maximum));
        assert_eq!("e3".parse::<ObfuscationLevel>(), Ok(ObfuscationLevel::Maximum));
        assert!("0".parse::<ObfuscationLevel>().is_err());
        assert!("4".parse::<ObfuscationLevel>().is_err());
        assert!("E3".parse::<ObfuscationLevel>().is_err());
        assert!("".parse::<ObfuscationLevel>().is_err());
    }

    #[test]
    fn test_level_flags() {
        assert_eq!(ObfuscationLevel::Maximum.compiler_flag(), "-e3");
        assert_eq!(ObfuscationLevel::Maximum.query_value(), "3");
        assert_eq!(ObfuscationLevel::Basic.compiler_flag(), "-e");
        assert_eq!(ObfuscationLevel::default(), ObfuscationLevel::Maximum);
    }

    #[test]
    fn test_validate_invalid_level() {
        let mut config = BatchConfig::default();
        config.compile.level = "e4".to_string();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "compile.level");
    }

    #[test]
    fn test_validate_delete_without_backup() {
        let mut config = BatchConfig::default();
        config.backup.delete_originals = true;
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "backup.delete_originals"));

        config.backup.dir = Some(PathBuf::from("backups"));
        assert!(config.is_valid());
    }

    #[test]
    fn test_validate_timeout_upper_bound() {
        let mut config = BatchConfig::default();
        config.compile.timeout_secs = u64::MAX;
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "compile.timeout_secs");

        config.compile.timeout_secs = MAX_TIMEOUT_SECS;
        assert!(config.is_valid());
    }

    #[test]
    fn test_invalid_level_message() {
        let err = "e9".parse::<ObfuscationLevel>().unwrap_err();
        assert_eq!(err.to_string(), "unknown obfuscation level 'e9' (expected 1, 2, 3, e, e2 or e3)");
    }

    #[test]
    fn test_validate_zero_jobs_and_timeout() {
        let mut config = BatchConfig::default();
        config.compile.jobs = 0;
        config.compile.timeout_secs = 0;
        let fields: Vec<_> = config.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"compile.jobs".to_string()));
        assert!(fields.contains(&"compile.timeout_secs".to_string()));
    }

    #[test]
    fn test_validate_extensions() {
        let mut config = BatchConfig::default();
        config.compile.artifact_ext = "lua".to_string();
        assert!(config.validate().iter().any(|e| e.field == "compile.artifact_ext"));

        let mut config = BatchConfig::default();
        config.compile.artifact_ext = "lu".to_string();
        assert!(config.validate().iter().any(|e| e.field == "compile.artifact_ext"));

        let mut config = BatchConfig::default();
        config.compile.source_ext = ".lua".to_string();
        assert!(config.validate().iter().any(|e| e.field == "compile.source_ext"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigValidationError {
            field: "compile.jobs".to_string(),
            message: "must be a positive integer".to_string(),
        };
        assert_eq!(err.to_string(), "'compile.jobs' must be a positive integer");
    }
}
