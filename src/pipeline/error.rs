//! Run-level errors.
//!
//! Every failure names its stage. Failures after the tree was touched also
//! carry what happened to the tree afterwards, so the operator always knows
//! whether it is back in its original state.

use crate::config::ConfigError;
use crate::pipeline::{
    BackendError, BackendInitError, BackupError, DiscoveryError, ManifestError, RestoreError,
};
use std::fmt;
use std::path::PathBuf;

/// What happened to the tree after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The tree was restored from this snapshot
    Restored {
        /// Snapshot directory, now moved back into place
        from: PathBuf,
    },
    /// No snapshot was taken; the tree is left as the failed stage left it
    NoBackup,
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackOutcome::Restored { from } => {
                write!(f, "resource folder restored from {}", from.display())
            }
            RollbackOutcome::NoBackup => {
                write!(f, "no backup was taken, resource folder left as is")
            }
        }
    }
}

/// A failed run.
#[derive(Debug)]
pub enum PipelineError {
    /// Invalid configuration; nothing was touched
    Config(ConfigError),
    /// Discovery failed; nothing was touched
    Discovery(DiscoveryError),
    /// The backend could not be set up; nothing was touched
    BackendInit(BackendInitError),
    /// The snapshot could not be taken; compilation never started
    Backup(BackupError),
    /// One or more compile jobs failed
    Compile {
        /// Every failing job, in path order
        failures: Vec<BackendError>,
        /// Rollback outcome
        rollback: RollbackOutcome,
    },
    /// The manifest could not be rewritten
    Manifest {
        /// Underlying error
        source: ManifestError,
        /// Rollback outcome
        rollback: RollbackOutcome,
    },
    /// A failure happened and restoring the snapshot failed too
    RollbackFailed {
        /// Failure that triggered the rollback
        cause: Box<PipelineError>,
        /// Why the restore failed
        restore: RestoreError,
    },
}

impl PipelineError {
    /// Stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "configuration",
            PipelineError::Discovery(_) => "discovery",
            PipelineError::BackendInit(_) => "backend setup",
            PipelineError::Backup(_) => "backup",
            PipelineError::Compile { .. } => "compile",
            PipelineError::Manifest { .. } => "manifest",
            PipelineError::RollbackFailed { cause, .. } => cause.stage(),
        }
    }

    /// Rollback outcome, for failures that happened after the tree was touched.
    pub fn rollback(&self) -> Option<&RollbackOutcome> {
        match self {
            PipelineError::Compile { rollback, .. } | PipelineError::Manifest { rollback, .. } => {
                Some(rollback)
            }
            _ => None,
        }
    }

    /// Failing source files, empty unless the compile stage failed.
    pub fn failed_files(&self) -> Vec<PathBuf> {
        match self {
            PipelineError::Compile { failures, .. } => {
                failures.iter().map(|f| f.file().to_path_buf()).collect()
            }
            PipelineError::RollbackFailed { cause, .. } => cause.failed_files(),
            _ => Vec::new(),
        }
    }

    /// Attach a rollback outcome to a failure that happened after backup.
    pub(crate) fn with_rollback(self, outcome: RollbackOutcome) -> Self {
        match self {
            PipelineError::Compile { failures, .. } => {
                PipelineError::Compile { failures, rollback: outcome }
            }
            PipelineError::Manifest { source, .. } => {
                PipelineError::Manifest { source, rollback: outcome }
            }
            other => other,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(e) => write!(f, "{}", e),
            PipelineError::Discovery(e) => write!(f, "discovery failed: {}", e),
            PipelineError::BackendInit(e) => write!(f, "{}", e),
            PipelineError::Backup(e) => write!(f, "backup failed: {}", e),
            PipelineError::Compile { failures, rollback } => {
                writeln!(f, "{} file(s) failed to compile:", failures.len())?;
                for failure in failures {
                    writeln!(f, "  - {}", failure)?;
                }
                write!(f, "{}", rollback)
            }
            PipelineError::Manifest { source, rollback } => {
                write!(f, "manifest rewrite failed: {}; {}", source, rollback)
            }
            PipelineError::RollbackFailed { cause, restore } => {
                writeln!(f, "ROLLBACK FAILED: {}", restore)?;
                writeln!(f, "recover manually from {}", restore.backup.display())?;
                write!(f, "original failure ({}): {}", cause.stage(), cause)
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Config(e) => Some(e),
            PipelineError::Discovery(e) => Some(e),
            PipelineError::BackendInit(e) => Some(e),
            PipelineError::Backup(e) => Some(e),
            PipelineError::Compile { failures, .. } => {
                failures.first().map(|e| e as &(dyn std::error::Error + 'static))
            }
            PipelineError::Manifest { source, .. } => Some(source),
            PipelineError::RollbackFailed { restore, .. } => Some(restore),
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        PipelineError::Config(e)
    }
}

impl From<DiscoveryError> for PipelineError {
    fn from(e: DiscoveryError) -> Self {
        PipelineError::Discovery(e)
    }
}

impl From<BackendInitError> for PipelineError {
    fn from(e: BackendInitError) -> Self {
        PipelineError::BackendInit(e)
    }
}

impl From<BackupError> for PipelineError {
    fn from(e: BackupError) -> Self {
        PipelineError::Backup(e)
    }
}
