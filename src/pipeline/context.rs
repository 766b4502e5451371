//! Run context containing configuration and paths for one compile run.

use crate::config::BatchConfig;
use std::path::{Path, PathBuf};

/// Run context containing the configuration and resource root for a run.
///
/// The context provides access to all information needed to execute a run;
/// it is read-only once the pipeline starts.
#[derive(Debug, Clone)]
pub struct CompileContext {
    /// The merged configuration
    config: BatchConfig,
    /// Resource tree root
    root: PathBuf,
    /// Discover and plan only, touch nothing
    dry_run: bool,
}

impl CompileContext {
    /// Create a new run context.
    ///
    /// # Arguments
    /// - `config` - The merged configuration
    /// - `root` - The resource tree root
    pub fn new(config: BatchConfig, root: PathBuf) -> Self {
        Self { config, root, dry_run: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Get the resource tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Backup base directory, if a backup was requested.
    pub fn backup_dir(&self) -> Option<&Path> {
        self.config.backup.dir.as_deref()
    }

    /// Whether originals should be deleted after a successful compile.
    pub fn delete_originals(&self) -> bool {
        self.config.backup.delete_originals
    }

    /// Whether dry-run mode is enabled.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
