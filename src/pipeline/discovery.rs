//! Source file discovery for the compile pipeline.
//!
//! Walks the whole resource tree with a recursive glob and splits the
//! regular files it finds into compilable sources, the manifest, and
//! everything else.

use crate::pipeline::CompileJob;
use crate::config::ObfuscationLevel;
use glob::{glob_with, MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Root path does not exist
    #[error("resource folder not found: {}", .0.display())]
    RootNotFound(PathBuf),
    /// Root path exists but is not a directory
    #[error("resource path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    /// Walk found no files at all
    #[error("resource folder contains no files: {}", .0.display())]
    EmptyTree(PathBuf),
    /// More than one file carries the manifest name
    #[error(
        "found {} files named '{name}', expected at most one:\n{}",
        .matches.len(),
        .matches.iter().map(|p| format!("  - {}", p.display())).collect::<Vec<_>>().join("\n")
    )]
    AmbiguousManifest {
        /// Manifest base name
        name: String,
        /// Every matching path
        matches: Vec<PathBuf>,
    },
    /// Invalid glob pattern built from the root path
    #[error("invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
    /// IO error during file enumeration
    #[error("IO error during discovery: {0}")]
    Walk(#[from] glob::GlobError),
    /// IO error while inspecting a path
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

/// Files found under a resource root.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    /// Resource tree root
    pub root: PathBuf,
    /// Files with the source extension, sorted
    pub compilables: Vec<PathBuf>,
    /// The manifest file, if present
    pub manifest: Option<PathBuf>,
    /// All remaining regular files, sorted
    pub others: Vec<PathBuf>,
}

impl Discovered {
    /// Total number of regular files in the tree.
    pub fn total_files(&self) -> usize {
        self.compilables.len() + self.others.len() + usize::from(self.manifest.is_some())
    }

    /// Build one compile job per compilable file.
    pub fn jobs(&self, level: ObfuscationLevel, artifact_ext: &str) -> Vec<CompileJob> {
        self.compilables
            .iter()
            .map(|source| CompileJob::new(source.clone(), level, artifact_ext))
            .collect()
    }
}

/// Check if a path carries exactly the given extension (case-sensitive).
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Discover every regular file beneath `root`.
///
/// # Arguments
/// - `root` - Resource tree root
/// - `source_ext` - Extension of compilable files, without the dot
/// - `manifest_name` - Base name of the manifest file
///
/// # Returns
/// The partitioned file sets. A second file with the manifest name is an
/// error rather than a traversal-order-dependent pick.
pub fn discover(
    root: &Path,
    source_ext: &str,
    manifest_name: &str,
) -> Result<Discovered, DiscoveryError> {
    let meta = match fs::metadata(root) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DiscoveryError::RootNotFound(root.to_path_buf()))
        }
        Err(e) => return Err(DiscoveryError::Io(e)),
    };
    if !meta.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let pattern = format!("{}/**/*", Pattern::escape(&root.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let paths = glob_with(&pattern, options)
        .map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?;

    let mut discovered = Discovered { root: root.to_path_buf(), ..Default::default() };
    let mut manifests = Vec::new();

    for entry in paths {
        let path = entry?;
        // Only regular files; directories and symlinks are not compiled
        if !fs::symlink_metadata(&path)?.file_type().is_file() {
            continue;
        }

        if path.file_name().and_then(|n| n.to_str()) == Some(manifest_name) {
            manifests.push(path);
        } else if has_extension(&path, source_ext) {
            discovered.compilables.push(path);
        } else {
            discovered.others.push(path);
        }
    }

    manifests.sort();
    if manifests.len() > 1 {
        return Err(DiscoveryError::AmbiguousManifest {
            name: manifest_name.to_string(),
            matches: manifests,
        });
    }
    discovered.manifest = manifests.pop();

    if discovered.total_files() == 0 {
        return Err(DiscoveryError::EmptyTree(root.to_path_buf()));
    }

    discovered.compilables.sort();
    discovered.others.sort();

    tracing::debug!(
        root = %root.display(),
        compilables = discovered.compilables.len(),
        others = discovered.others.len(),
        manifest = discovered.manifest.is_some(),
        "discovery finished"
    );

    Ok(discovered)
}
