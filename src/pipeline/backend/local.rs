//! Local compiler executable backend.

use super::{BackendError, CompileBackend};
use crate::config::BackendKind;
use crate::pipeline::CompileJob;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running compiler is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs a compiler executable once per source file.
///
/// Invocation: `<compiler> <level flag> -o <artifact> -- <source>`. The
/// compiler writes the artifact itself; exit code 0 means success.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    compiler: PathBuf,
    timeout: Duration,
}

impl LocalBackend {
    /// Create a backend for the given compiler executable.
    pub fn new(compiler: PathBuf, timeout: Duration) -> Self {
        Self { compiler, timeout }
    }

    /// Build the command line for a job.
    pub fn command(&self, job: &CompileJob) -> Command {
        let mut cmd = Command::new(&self.compiler);
        cmd.arg(job.level.compiler_flag())
            .arg("-o")
            .arg(&job.artifact)
            .arg("--")
            .arg(&job.source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }

    /// Wait for `child`, killing it once the timeout has passed.
    ///
    /// Returns `None` on timeout. A timeout too large to represent as an
    /// instant means no deadline.
    fn wait_with_timeout(&self, child: &mut Child) -> std::io::Result<Option<ExitStatus>> {
        let deadline = Instant::now().checked_add(self.timeout);
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl CompileBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn compile(&self, job: &CompileJob) -> Result<(), BackendError> {
        tracing::debug!(
            file = %job.source.display(),
            compiler = %self.compiler.display(),
            "running compiler"
        );

        let mut child = self.command(job).spawn().map_err(|e| BackendError::Spawn {
            file: job.source.clone(),
            program: self.compiler.clone(),
            source: e,
        })?;

        // Drain stderr on its own thread so a chatty compiler cannot block on a full pipe
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let status = self
            .wait_with_timeout(&mut child)
            .map_err(|e| BackendError::Io { file: job.source.clone(), source: e })?;
        let stderr = stderr_reader.and_then(|h| h.join().ok()).unwrap_or_default();

        match status {
            None => Err(BackendError::Timeout {
                file: job.source.clone(),
                kind: BackendKind::Local,
                after: self.timeout,
            }),
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(BackendError::Local {
                file: job.source.clone(),
                exit_code: status.code(),
                stderr,
            }),
        }
    }
}
