//! Pipeline controller.
//!
//! Sequences discovery, backup, compilation and the manifest rewrite, and
//! decides the run's outcome. A run either reaches [`PipelineState::Done`]
//! or ends in [`PipelineState::Failed`]; there is no partial success.
//!
//! Failures after the backup stage trigger a rollback from the snapshot.
//! Without a snapshot the tree is left exactly as the failing stage left it.

use crate::config::{BatchConfig, ConfigError};
use crate::pipeline::progress::{NullProgress, ProgressEvent, ProgressReporter};
use crate::pipeline::{
    backup, create_backend, discover, restore, rewrite_manifest, BackupRecord, CompileBackend,
    CompileContext, CompileJob, Discovered, JobSuccess, Orchestrator, PipelineError,
    RollbackOutcome, RunSummary,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Pipeline state machine.
///
/// `Idle → Discovering → (BackingUp) → Compiling → (RewritingManifest) → Done`,
/// with `RollingBack → Failed` on failure once the tree has been touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Discovering,
    BackingUp,
    Compiling,
    RewritingManifest,
    RollingBack,
    Done,
    Failed,
}

impl PipelineState {
    /// Operator-facing label for the stage, if it has one.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            PipelineState::Discovering => Some("Finding files..."),
            PipelineState::BackingUp => Some("Making backup..."),
            PipelineState::Compiling => Some("Compiling files..."),
            PipelineState::RewritingManifest => Some("Updating manifest..."),
            PipelineState::RollingBack => Some("Restoring backup..."),
            PipelineState::Idle | PipelineState::Done | PipelineState::Failed => None,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Discovering => "discovering",
            PipelineState::BackingUp => "backing up",
            PipelineState::Compiling => "compiling",
            PipelineState::RewritingManifest => "rewriting manifest",
            PipelineState::RollingBack => "rolling back",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Runs one compile pass over one resource tree.
pub struct Pipeline {
    /// Run context
    context: CompileContext,
    /// Progress sink
    reporter: Arc<dyn ProgressReporter>,
    /// Backend to use instead of the configured one
    backend: Option<Arc<dyn CompileBackend>>,
    /// Every state entered, in order
    transitions: Vec<PipelineState>,
}

impl Pipeline {
    /// Create a pipeline for the given context.
    pub fn new(context: CompileContext) -> Self {
        Self {
            context,
            reporter: Arc::new(NullProgress),
            backend: None,
            transitions: vec![PipelineState::Idle],
        }
    }

    /// Set the progress reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Use `backend` instead of building one from the configuration.
    pub fn with_backend(mut self, backend: Arc<dyn CompileBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.transitions.last().copied().unwrap_or(PipelineState::Idle)
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn transitions(&self) -> &[PipelineState] {
        &self.transitions
    }

    /// Run the pipeline to a terminal state.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        let config = self.context.config().clone();

        let result = self.execute(&config, start);

        match &result {
            Ok(summary) => {
                self.transition(PipelineState::Done);
                tracing::info!(root = %summary.root.display(), "{}", summary.summary());
            }
            Err(err) => {
                self.transition(PipelineState::Failed);
                tracing::error!(stage = err.stage(), "run failed: {}", err);
            }
        }
        self.reporter.report(ProgressEvent::RunCompleted {
            success: result.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
        });

        result
    }

    fn transition(&mut self, state: PipelineState) {
        tracing::debug!(from = %self.state(), to = %state, "pipeline transition");
        self.transitions.push(state);
        self.reporter.report(ProgressEvent::StageStarted { stage: state });
    }

    fn warn(&self, message: String) {
        tracing::warn!("{}", message);
        self.reporter.report(ProgressEvent::Warning { file: None, message });
    }

    fn execute(&mut self, config: &BatchConfig, start: Instant) -> Result<RunSummary, PipelineError> {
        ConfigError::check(config)?;
        let level = config
            .level()
            .map_err(|e| ConfigError::Validation(vec![format!("compile.level: {}", e)]))?;
        let root = self.context.root().to_path_buf();

        self.transition(PipelineState::Discovering);
        let discovered = discover(&root, &config.compile.source_ext, &config.compile.manifest)?;
        let jobs = discovered.jobs(level, &config.compile.artifact_ext);
        tracing::info!(
            root = %root.display(),
            compilable = jobs.len(),
            total = discovered.total_files(),
            "discovered files"
        );

        if discovered.manifest.is_none() {
            self.warn(format!(
                "no {} found in {}, manifest will not be updated",
                config.compile.manifest,
                root.display()
            ));
        }

        let mut summary = RunSummary {
            root: root.clone(),
            planned: jobs,
            compiled: Vec::new(),
            manifest: None,
            backup: None,
            dry_run: self.context.is_dry_run(),
            duration: start.elapsed(),
        };

        if summary.dry_run {
            return Ok(summary);
        }

        if summary.planned.is_empty() {
            self.warn(format!(
                "no .{} files found in {}, only the manifest will be updated",
                config.compile.source_ext,
                root.display()
            ));
        }

        let backend = match &self.backend {
            Some(backend) => Arc::clone(backend),
            None => create_backend(config)?,
        };

        let snapshot = match self.context.backup_dir().map(PathBuf::from) {
            Some(base) => {
                self.transition(PipelineState::BackingUp);
                let record = backup(&root, &base)?;
                tracing::info!(location = %record.location.display(), "backup created");
                Some(record)
            }
            None => None,
        };

        // The tree is about to change; from here every failure rolls back
        match self.mutate(config, &discovered, &summary.planned, backend.as_ref()) {
            Ok((compiled, manifest)) => {
                summary.compiled = compiled;
                summary.manifest = manifest;
                summary.backup = snapshot;
                summary.duration = start.elapsed();
                Ok(summary)
            }
            Err(err) => Err(self.roll_back(err, snapshot)),
        }
    }

    /// Compile every job, then rewrite the manifest.
    fn mutate(
        &mut self,
        config: &BatchConfig,
        discovered: &Discovered,
        jobs: &[CompileJob],
        backend: &dyn CompileBackend,
    ) -> Result<(Vec<JobSuccess>, Option<(PathBuf, usize)>), PipelineError> {
        self.transition(PipelineState::Compiling);
        let report = Orchestrator::new(backend)
            .with_jobs(config.compile.jobs)
            .with_delete_originals(self.context.delete_originals())
            .with_retries(config.compile.retries)
            .with_display_root(self.context.root())
            .run(jobs, self.reporter.as_ref());

        if !report.is_success() {
            return Err(PipelineError::Compile {
                failures: report.failed,
                rollback: RollbackOutcome::NoBackup,
            });
        }

        let manifest = match &discovered.manifest {
            Some(path) => {
                self.transition(PipelineState::RewritingManifest);
                let patch = rewrite_manifest(
                    path,
                    &config.compile.source_ext,
                    &config.compile.artifact_ext,
                )
                .map_err(|source| PipelineError::Manifest {
                    source,
                    rollback: RollbackOutcome::NoBackup,
                })?;
                Some((patch.path, patch.replacements))
            }
            None => None,
        };

        Ok((report.succeeded, manifest))
    }

    /// Restore the snapshot, if there is one, and fold the outcome into `err`.
    fn roll_back(&mut self, err: PipelineError, snapshot: Option<BackupRecord>) -> PipelineError {
        let Some(record) = snapshot else {
            tracing::warn!("no backup to restore, leaving resource folder as is");
            return err.with_rollback(RollbackOutcome::NoBackup);
        };

        self.transition(PipelineState::RollingBack);
        let from = record.location.clone();
        match restore(record) {
            Ok(()) => {
                tracing::info!(from = %from.display(), "resource folder restored");
                err.with_rollback(RollbackOutcome::Restored { from })
            }
            Err(restore) => {
                tracing::error!("rollback failed: {}", restore);
                PipelineError::RollbackFailed { cause: Box::new(err), restore }
            }
        }
    }
}
