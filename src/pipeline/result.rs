//! Compile and run results.

use crate::pipeline::{BackendError, BackupRecord, CompileJob};
use std::path::PathBuf;
use std::time::Duration;

/// A job that produced its artifact.
#[derive(Debug, Clone)]
pub struct JobSuccess {
    /// Source file
    pub source: PathBuf,
    /// Artifact written
    pub artifact: PathBuf,
    /// Number of backend calls made (1 without retries)
    pub attempts: u32,
    /// Time spent on the job
    pub duration: Duration,
    /// Whether the source was removed afterwards
    pub original_deleted: bool,
}

/// Aggregate outcome of the compile stage.
///
/// Both lists follow job order, which is sorted by path.
#[derive(Debug, Default)]
pub struct CompileReport {
    /// Jobs that produced an artifact
    pub succeeded: Vec<JobSuccess>,
    /// Jobs that failed
    pub failed: Vec<BackendError>,
    /// Wall time of the stage
    pub duration: Duration,
}

impl CompileReport {
    /// Check if every job succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total number of settled jobs.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Result of a run that reached `Done`.
#[derive(Debug)]
pub struct RunSummary {
    /// Resource tree root
    pub root: PathBuf,
    /// Jobs planned from discovery
    pub planned: Vec<CompileJob>,
    /// Compile stage outcome (empty for a dry run)
    pub compiled: Vec<JobSuccess>,
    /// Manifest that was rewritten, with its replacement count
    pub manifest: Option<(PathBuf, usize)>,
    /// Snapshot taken before compiling
    pub backup: Option<BackupRecord>,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Total run time
    pub duration: Duration,
}

impl RunSummary {
    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        if self.dry_run {
            return format!(
                "Dry run: {} file(s) would be compiled in {}",
                self.planned.len(),
                self.root.display()
            );
        }

        let mut parts = vec![format!("{} file(s) compiled", self.compiled.len())];
        let deleted = self.compiled.iter().filter(|s| s.original_deleted).count();
        if deleted > 0 {
            parts.push(format!("{} original(s) deleted", deleted));
        }
        if let Some((_, replacements)) = &self.manifest {
            parts.push(format!("{} manifest reference(s) updated", replacements));
        }
        if let Some(record) = &self.backup {
            parts.push(format!("backup at {}", record.location.display()));
        }

        format!("{} in {:.2}s", parts.join(", "), self.duration.as_secs_f64())
    }
}
