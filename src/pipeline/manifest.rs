//! Manifest rewriting.
//!
//! After every source has compiled, references to the source extension in
//! the manifest are switched to the artifact extension. The substitution is
//! purely textual: any `.lua` in the file is rewritten, including inside
//! comments or unrelated attribute values.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure while rewriting the manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write manifest {}: {source}", path.display())]
    Write { path: PathBuf, source: std::io::Error },
}

/// A manifest's text before and after extension substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestPatch {
    /// Manifest file
    pub path: PathBuf,
    /// Text as read
    pub original: String,
    /// Text as written
    pub rewritten: String,
    /// Number of substituted references
    pub replacements: usize,
}

impl ManifestPatch {
    /// Whether the rewrite changed anything.
    pub fn is_changed(&self) -> bool {
        self.replacements > 0
    }
}

/// Replace every `.<from>` with `.<to>`, returning the new text and the
/// number of replacements.
///
/// When `to` extends `from` (`lua` to `luac`), occurrences that already carry
/// the extra suffix are skipped, so applying the substitution twice gives the
/// same text as applying it once.
pub fn substitute_extension(text: &str, from: &str, to: &str) -> (String, usize) {
    let needle = format!(".{}", from);
    let replacement = format!(".{}", to);
    let already = to.strip_prefix(from).filter(|tail| !tail.is_empty());

    let mut out = String::with_capacity(text.len());
    let mut count = 0;
    let mut rest = text;

    while let Some(pos) = rest.find(&needle) {
        let after = &rest[pos + needle.len()..];
        out.push_str(&rest[..pos]);
        if already.is_some_and(|tail| after.starts_with(tail)) {
            out.push_str(&needle);
        } else {
            out.push_str(&replacement);
            count += 1;
        }
        rest = after;
    }
    out.push_str(rest);

    (out, count)
}

/// Build the patch for a manifest without touching the filesystem.
pub fn plan_rewrite(path: &Path, text: String, from: &str, to: &str) -> ManifestPatch {
    let (rewritten, replacements) = substitute_extension(&text, from, to);
    ManifestPatch { path: path.to_path_buf(), original: text, rewritten, replacements }
}

/// Rewrite the manifest at `path` in place.
///
/// The file is always written back in full, even if nothing changed.
pub fn rewrite_manifest(path: &Path, from: &str, to: &str) -> Result<ManifestPatch, ManifestError> {
    let text = fs::read_to_string(path)
        .map_err(|e| ManifestError::Read { path: path.to_path_buf(), source: e })?;

    let patch = plan_rewrite(path, text, from, to);
    fs::write(path, &patch.rewritten)
        .map_err(|e| ManifestError::Write { path: path.to_path_buf(), source: e })?;

    tracing::info!(
        manifest = %path.display(),
        replacements = patch.replacements,
        "rewrote manifest"
    );
    Ok(patch)
}
