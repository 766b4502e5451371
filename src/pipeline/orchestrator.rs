//! Bounded parallel compile execution.
//!
//! Runs one [`CompileJob`] per source file on a fixed number of worker
//! threads. Jobs are independent: a failure never cancels its siblings, and
//! [`Orchestrator::run`] returns only once every job has settled.
//!
//! # How It Works
//!
//! 1. Spawn `min(jobs, workers)` scoped threads
//! 2. Each worker claims the next job index from a shared counter
//! 3. The job is compiled (with optional retries) and, on success, the
//!    original is deleted if that policy is on
//! 4. Results are collected and sorted back into job order

use crate::config::schema::default_jobs;
use crate::pipeline::backend::{BackendError, CompileBackend};
use crate::pipeline::progress::{JobStatus, ProgressEvent, ProgressReporter};
use crate::pipeline::{display_relative, CompileJob, CompileReport, JobSuccess};
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Default delay before the first retry; doubled for each further attempt.
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Upper bound on the delay between two attempts.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Bounded worker pool over a compile backend.
pub struct Orchestrator<'a> {
    /// Backend shared by all workers
    backend: &'a dyn CompileBackend,
    /// Maximum number of jobs in flight
    jobs: usize,
    /// Remove originals after a successful compile
    delete_originals: bool,
    /// Extra attempts per failed job
    retries: u32,
    /// Delay before the first retry
    retry_backoff: Duration,
    /// Root used to shorten paths in progress events
    display_root: PathBuf,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over `backend`.
    pub fn new(backend: &'a dyn CompileBackend) -> Self {
        Self {
            backend,
            jobs: default_jobs(),
            delete_originals: false,
            retries: 0,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            display_root: PathBuf::new(),
        }
    }

    /// Set the worker bound (at least 1).
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Delete each original once its artifact exists.
    ///
    /// The caller is responsible for only enabling this when a backup of
    /// the tree has been taken.
    pub fn with_delete_originals(mut self, delete: bool) -> Self {
        self.delete_originals = delete;
        self
    }

    /// Set the number of extra attempts for a failed job.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Report paths relative to this root.
    pub fn with_display_root(mut self, root: &Path) -> Self {
        self.display_root = root.to_path_buf();
        self
    }

    /// Get the worker bound.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run every job and wait for all of them to settle.
    pub fn run(&self, jobs: &[CompileJob], reporter: &dyn ProgressReporter) -> CompileReport {
        let start = Instant::now();
        let workers = self.jobs.min(jobs.len()).max(1);

        reporter.report(ProgressEvent::CompileStarted { total_jobs: jobs.len(), workers });
        tracing::info!(jobs = jobs.len(), workers, "compiling");

        let results: Mutex<Vec<(usize, Result<JobSuccess, BackendError>)>> =
            Mutex::new(Vec::with_capacity(jobs.len()));
        let next_idx = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..workers {
                let results = &results;
                let next_idx = &next_idx;

                s.spawn(move || loop {
                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= jobs.len() {
                        break;
                    }

                    let job = &jobs[idx];
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.execute_job(job, reporter)
                    }))
                    .unwrap_or_else(|payload| {
                        let message = panic_message(payload.as_ref());
                        let err = BackendError::Panicked { file: job.source.clone(), message };
                        let file = display_relative(&job.source, &self.display_root);
                        tracing::error!(file = %file, "{}", err);
                        reporter.report(ProgressEvent::JobCompleted {
                            file,
                            status: JobStatus::Failed(err.to_string()),
                            duration_ms: 0,
                        });
                        Err(err)
                    });
                    results
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push((idx, result));
                });
            }
        });

        let mut results = results.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        results.sort_by_key(|(idx, _)| *idx);

        let mut report = CompileReport::default();
        for (_, result) in results {
            match result {
                Ok(success) => report.succeeded.push(success),
                Err(err) => report.failed.push(err),
            }
        }
        report.duration = start.elapsed();
        tracing::info!(
            total = report.total(),
            failed = report.failed.len(),
            duration_ms = report.duration.as_millis() as u64,
            "compile stage settled"
        );

        reporter.report(ProgressEvent::CompileCompleted {
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
            duration_ms: report.duration.as_millis() as u64,
        });

        report
    }

    /// Compile one job, retrying if configured, then apply the delete policy.
    fn execute_job(
        &self,
        job: &CompileJob,
        reporter: &dyn ProgressReporter,
    ) -> Result<JobSuccess, BackendError> {
        let start = Instant::now();
        let file = display_relative(&job.source, &self.display_root);
        reporter.report(ProgressEvent::JobStarted { file: file.clone() });

        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;
            match self.backend.compile(job) {
                Ok(()) => break Ok(()),
                Err(err) if err.is_retryable() && attempts <= self.retries => {
                    let delay = retry_delay(self.retry_backoff, attempts);
                    tracing::warn!(file = %file, attempt = attempts, "compile failed, retrying in {:?}: {}", delay, err);
                    thread::sleep(delay);
                }
                Err(err) => break Err(err),
            }
        };

        let outcome = outcome.and_then(|()| {
            if self.delete_originals {
                fs::remove_file(&job.source).map_err(|e| BackendError::DeleteOriginal {
                    file: job.source.clone(),
                    source: e,
                })?;
            }
            Ok(JobSuccess {
                source: job.source.clone(),
                artifact: job.artifact.clone(),
                attempts,
                duration: start.elapsed(),
                original_deleted: self.delete_originals,
            })
        });

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = match &outcome {
            Ok(_) => {
                tracing::debug!(file = %file, duration_ms, "compiled");
                JobStatus::Success
            }
            Err(err) => {
                tracing::warn!(file = %file, "compile failed: {}", err);
                JobStatus::Failed(err.to_string())
            }
        };
        reporter.report(ProgressEvent::JobCompleted { file, status, duration_ms });

        outcome
    }
}

/// Delay after the given failed attempt (1-based): doubles per attempt, capped.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .map_or(MAX_RETRY_BACKOFF, |delay| delay.min(MAX_RETRY_BACKOFF))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
