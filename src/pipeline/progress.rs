//! Run progress reporting.
//!
//! The pipeline emits [`ProgressEvent`]s at stage boundaries and once per
//! compile job. Reporters decide how to render them: colored console lines,
//! JSON lines for tooling, or nothing at all.
//!
//! # Example
//!
//! ```ignore
//! use luac_batch::pipeline::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::CompileStarted { total_jobs: 2, workers: 2 });
//! ```

use crate::pipeline::PipelineState;
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Outcome of a job in progress events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Artifact produced
    Success,
    /// Job failed
    Failed(String),
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Events that can be reported during a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The pipeline entered a new state
    StageStarted {
        /// New state
        stage: PipelineState,
    },
    /// Compile fan-out is about to start
    CompileStarted {
        /// Number of jobs
        total_jobs: usize,
        /// Worker bound
        workers: usize,
    },
    /// A job was picked up by a worker
    JobStarted {
        /// Source file, relative to the root
        file: String,
    },
    /// A job settled
    JobCompleted {
        /// Source file, relative to the root
        file: String,
        /// Outcome
        status: JobStatus,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// Every job settled
    CompileCompleted {
        /// Jobs that produced an artifact
        succeeded: usize,
        /// Jobs that failed
        failed: usize,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// The run reached a terminal state
    RunCompleted {
        /// Whether the run reached `Done`
        success: bool,
        /// Total duration in milliseconds
        duration_ms: u64,
    },
    /// A warning was generated
    Warning {
        /// File the warning is about (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        /// Warning message
        message: String,
    },
    /// An error occurred
    Error {
        /// File the error is about (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        /// Error message
        message: String,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    /// Create a new null progress reporter.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show per-job start lines
    verbose: bool,
    /// Settled job count
    current: AtomicUsize,
    /// Total job count
    total: AtomicUsize,
    /// Output writer (for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a new console progress reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Set whether to use colors.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { stage } => {
                if let Some(label) = stage.label() {
                    self.writeln(&format!("{} {}", self.cyan("[stage]"), label));
                }
            }
            ProgressEvent::CompileStarted { total_jobs, workers } => {
                self.total.store(total_jobs, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                self.writeln(&format!(
                    "{} Compiling {} file{} ({} worker{})",
                    self.cyan("[compile]"),
                    total_jobs,
                    if total_jobs == 1 { "" } else { "s" },
                    workers,
                    if workers == 1 { "" } else { "s" }
                ));
            }
            ProgressEvent::JobStarted { file } => {
                if self.verbose {
                    self.writeln(&format!("{} {}...", self.cyan("[compile]"), file));
                }
            }
            ProgressEvent::JobCompleted { file, status, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                let status_str = match &status {
                    JobStatus::Success => self.green("ok"),
                    JobStatus::Failed(_) => self.red("FAILED"),
                };

                self.writeln(&format!(
                    "{} [{}/{}] {} {} ({})",
                    self.cyan("[compile]"),
                    current,
                    total,
                    status_str,
                    file,
                    format_duration(duration_ms)
                ));

                if let JobStatus::Failed(err) = status {
                    self.writeln(&format!("        {}", self.red(&err)));
                }
            }
            ProgressEvent::CompileCompleted { succeeded, failed, duration_ms } => {
                if failed > 0 {
                    self.writeln(&format!(
                        "{} {} compiled, {} failed in {}",
                        self.red("[compile]"),
                        succeeded,
                        failed,
                        format_duration(duration_ms)
                    ));
                }
            }
            ProgressEvent::RunCompleted { success, duration_ms } => {
                if success {
                    self.writeln(&format!(
                        "\n{} Finished in {}",
                        self.green("[done]"),
                        format_duration(duration_ms)
                    ));
                } else {
                    self.writeln(&format!(
                        "\n{} Run failed after {}",
                        self.red("[error]"),
                        format_duration(duration_ms)
                    ));
                }
            }
            ProgressEvent::Warning { file, message } => {
                let prefix = file.map(|f| format!("{}: ", f)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
            ProgressEvent::Error { file, message } => {
                let prefix = file.map(|f| format!("{}: ", f)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.red("[error]"), prefix, message));
            }
        }
    }
}

/// JSON-lines progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("failed to serialize progress event: {}", e);
                return;
            }
        };
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

/// Format a millisecond duration for display.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct TestWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl TestWriter {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_console_job_lines() {
        let writer = TestWriter::default();
        let progress = ConsoleProgress::with_output(writer.clone());

        progress.report(ProgressEvent::CompileStarted { total_jobs: 2, workers: 1 });
        progress.report(ProgressEvent::JobCompleted {
            file: "a.lua".to_string(),
            status: JobStatus::Success,
            duration_ms: 12,
        });
        progress.report(ProgressEvent::JobCompleted {
            file: "b.lua".to_string(),
            status: JobStatus::Failed("exit 1".to_string()),
            duration_ms: 1500,
        });

        let output = writer.contents();
        assert!(output.contains("Compiling 2 files (1 worker)"));
        assert!(output.contains("[1/2] ok a.lua (12ms)"));
        assert!(output.contains("[2/2] FAILED b.lua (1.50s)"));
        assert!(output.contains("exit 1"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_console_stage_and_warning() {
        let writer = TestWriter::default();
        let progress = ConsoleProgress::with_output(writer.clone());

        progress.report(ProgressEvent::StageStarted { stage: PipelineState::BackingUp });
        progress.report(ProgressEvent::Warning {
            file: None,
            message: "no meta.xml found".to_string(),
        });

        let output = writer.contents();
        assert!(output.contains("[stage] Making backup"));
        assert!(output.contains("[warn] no meta.xml found"));
    }

    #[test]
    fn test_console_verbose_job_start() {
        let writer = TestWriter::default();
        let progress = ConsoleProgress::with_output(writer.clone());
        progress.report(ProgressEvent::JobStarted { file: "a.lua".to_string() });
        assert!(writer.contents().is_empty());

        let writer = TestWriter::default();
        let progress = ConsoleProgress::with_output(writer.clone()).with_verbose(true);
        progress.report(ProgressEvent::JobStarted { file: "a.lua".to_string() });
        assert!(writer.contents().contains("a.lua..."));
    }

    #[test]
    fn test_json_events() {
        let writer = TestWriter::default();
        let progress = JsonProgress::with_output(writer.clone());

        progress.report(ProgressEvent::StageStarted { stage: PipelineState::Compiling });
        progress.report(ProgressEvent::JobCompleted {
            file: "a.lua".to_string(),
            status: JobStatus::Failed("boom".to_string()),
            duration_ms: 3,
        });
        progress.report(ProgressEvent::JobCompleted {
            file: "b.lua".to_string(),
            status: JobStatus::Success,
            duration_ms: 4,
        });
        progress.report(ProgressEvent::RunCompleted { success: false, duration_ms: 10 });

        let lines: Vec<serde_json::Value> = writer
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["event"], "stage_started");
        assert_eq!(lines[0]["stage"], "compiling");
        assert_eq!(lines[1]["event"], "job_completed");
        assert_eq!(lines[1]["status"]["failed"], "boom");
        assert_eq!(lines[2]["status"], "success");
        assert_eq!(lines[3]["success"], false);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5), "5ms");
        assert_eq!(format_duration(2500), "2.50s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }
}
