//! Compile job definition.

use crate::config::ObfuscationLevel;
use std::path::{Path, PathBuf};

/// One unit of work: a single source file to compile.
///
/// The artifact path is derived from the source path by swapping the
/// extension, so two distinct sources can never share an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    /// Source file
    pub source: PathBuf,
    /// Where the compiled artifact is written
    pub artifact: PathBuf,
    /// Obfuscation level passed to the backend
    pub level: ObfuscationLevel,
}

impl CompileJob {
    /// Create a job for `source`, placing the artifact next to it.
    pub fn new(source: PathBuf, level: ObfuscationLevel, artifact_ext: &str) -> Self {
        let artifact = artifact_path(&source, artifact_ext);
        Self { source, artifact, level }
    }

    /// Source path relative to `root`, for display.
    pub fn display_name(&self, root: &Path) -> String {
        display_relative(&self.source, root)
    }
}

/// Deterministic artifact path for a source file.
pub fn artifact_path(source: &Path, artifact_ext: &str) -> PathBuf {
    source.with_extension(artifact_ext)
}

/// Render `path` relative to `root` when possible.
pub fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
