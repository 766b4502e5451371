//! Compile backends.
//!
//! A backend turns one Lua source file into a compiled artifact at the
//! job's artifact path. Two implementations exist: [`RemoteBackend`] posts
//! the source to an HTTP compile service, [`LocalBackend`] runs a compiler
//! executable. The backend is chosen once per run by [`create_backend`].

mod local;
mod remote;

pub use local::LocalBackend;
pub use remote::RemoteBackend;

use crate::config::{BackendKind, BatchConfig};
use crate::pipeline::CompileJob;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single compile job.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Remote service failure: network error or non-2xx status
    #[error("{}: remote compile failed: {cause}", file.display())]
    Remote {
        /// Offending source file
        file: PathBuf,
        /// What went wrong
        cause: String,
    },
    /// Local compiler exited unsuccessfully
    #[error(
        "{}: compiler exited with {}{}",
        file.display(),
        exit_code.map(|c| format!("code {}", c)).unwrap_or_else(|| "a signal".to_string()),
        if stderr.is_empty() { String::new() } else { format!(": {}", stderr.trim()) }
    )]
    Local {
        /// Offending source file
        file: PathBuf,
        /// Exit code, `None` when killed by a signal
        exit_code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },
    /// Local compiler could not be started
    #[error("{}: failed to run compiler {}: {source}", file.display(), program.display())]
    Spawn {
        /// Offending source file
        file: PathBuf,
        /// Compiler executable
        program: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The call did not finish in time
    #[error("{}: {kind} compile timed out after {after:?}", file.display())]
    Timeout {
        /// Offending source file
        file: PathBuf,
        /// Backend that timed out
        kind: BackendKind,
        /// Configured limit
        after: Duration,
    },
    /// Reading the source or writing the artifact failed
    #[error("{}: {source}", file.display())]
    Io {
        /// Offending source file
        file: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The artifact was produced but the original could not be removed
    #[error("{}: compiled, but failed to delete original: {source}", file.display())]
    DeleteOriginal {
        /// Offending source file
        file: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The compile call panicked; the worker recovered
    #[error("{}: compile panicked: {message}", file.display())]
    Panicked {
        /// Offending source file
        file: PathBuf,
        /// Panic payload, when it was a string
        message: String,
    },
}

impl BackendError {
    /// Source file the failure belongs to.
    pub fn file(&self) -> &Path {
        match self {
            BackendError::Remote { file, .. }
            | BackendError::Local { file, .. }
            | BackendError::Spawn { file, .. }
            | BackendError::Timeout { file, .. }
            | BackendError::Io { file, .. }
            | BackendError::DeleteOriginal { file, .. }
            | BackendError::Panicked { file, .. } => file,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            BackendError::Spawn { .. }
                | BackendError::DeleteOriginal { .. }
                | BackendError::Panicked { .. }
        )
    }
}

/// The backend could not be set up; no job was attempted.
#[derive(Debug, Error)]
#[error("failed to set up {kind} backend: {message}")]
pub struct BackendInitError {
    /// Backend being built
    pub kind: BackendKind,
    /// What went wrong
    pub message: String,
}

/// Trait for compile backends.
///
/// Implementations are shared between worker threads.
pub trait CompileBackend: Send + Sync {
    /// Which variant this is.
    fn kind(&self) -> BackendKind;

    /// Compile `job.source` and leave the artifact at `job.artifact`.
    fn compile(&self, job: &CompileJob) -> Result<(), BackendError>;
}

/// Build the backend selected by the configuration.
///
/// Called once per run; a run is either fully remote or fully local.
pub fn create_backend(config: &BatchConfig) -> Result<Arc<dyn CompileBackend>, BackendInitError> {
    let timeout = Duration::from_secs(config.compile.timeout_secs);
    match config.compile.backend {
        BackendKind::Remote => {
            Ok(Arc::new(RemoteBackend::new(&config.remote.endpoint, timeout)?))
        }
        BackendKind::Local => Ok(Arc::new(LocalBackend::new(config.local.compiler.clone(), timeout))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_backend_selects_variant() {
        let mut config = BatchConfig::default();
        assert_eq!(create_backend(&config).unwrap().kind(), BackendKind::Remote);

        config.compile.backend = BackendKind::Local;
        assert_eq!(create_backend(&config).unwrap().kind(), BackendKind::Local);
    }

    #[test]
    fn test_create_backend_bad_endpoint() {
        let mut config = BatchConfig::default();
        config.remote.endpoint = "not a url".to_string();
        let err = create_backend(&config).err().unwrap();
        assert_eq!(err.kind, BackendKind::Remote);
    }

    #[test]
    fn test_error_file_and_display() {
        let err = BackendError::Local {
            file: PathBuf::from("a.lua"),
            exit_code: Some(1),
            stderr: "syntax error near 'end'\n".to_string(),
        };
        assert_eq!(err.file(), Path::new("a.lua"));
        assert_eq!(err.to_string(), "a.lua: compiler exited with code 1: syntax error near 'end'");

        let err = BackendError::Local {
            file: PathBuf::from("b.lua"),
            exit_code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "b.lua: compiler exited with a signal");
    }

    #[test]
    fn test_retryable() {
        let timeout = BackendError::Timeout {
            file: PathBuf::from("a.lua"),
            kind: BackendKind::Remote,
            after: Duration::from_secs(1),
        };
        assert!(timeout.is_retryable());

        let spawn = BackendError::Spawn {
            file: PathBuf::from("a.lua"),
            program: PathBuf::from("luac_mta"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(!spawn.is_retryable());
    }
}
