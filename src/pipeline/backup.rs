//! Resource tree snapshots and rollback.
//!
//! A snapshot is a full copy of the resource root placed in a fresh
//! `<root name>_<unix millis>` directory under the backup base. Restoring
//! swaps the snapshot back into place of the root.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

/// Error while taking a snapshot. Always fatal before compilation starts.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The backup base could not be created
    #[error("failed to create backup folder {}: {source}", path.display())]
    CreateBase {
        /// Backup base directory
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// A snapshot with the same name already exists
    #[error("backup location already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    /// The backup base lies inside the tree being backed up
    #[error("backup folder {} is inside the resource folder {}", base.display(), root.display())]
    InsideRoot {
        /// Resource root
        root: PathBuf,
        /// Backup base directory
        base: PathBuf,
    },
    /// Copying the tree failed
    #[error("failed to copy {} into {}: {source}", root.display(), location.display())]
    Copy {
        /// Resource root
        root: PathBuf,
        /// Snapshot directory
        location: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

/// Which part of a restore failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStage {
    /// Removing the disturbed resource root
    RemoveRoot,
    /// Moving or copying the snapshot into place
    MoveSnapshot,
}

impl std::fmt::Display for RestoreStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreStage::RemoveRoot => write!(f, "removing the resource folder"),
            RestoreStage::MoveSnapshot => write!(f, "moving the snapshot into place"),
        }
    }
}

/// Rollback failure. The tree may now be neither original nor compiled.
#[derive(Debug, Error)]
#[error(
    "could not restore {} from backup {} while {stage}: {source}",
    root.display(),
    backup.display()
)]
pub struct RestoreError {
    /// Resource root being restored
    pub root: PathBuf,
    /// Snapshot the tree should be recovered from
    pub backup: PathBuf,
    /// Step that failed
    pub stage: RestoreStage,
    /// Underlying error
    pub source: io::Error,
}

/// A snapshot taken before a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Resource root that was copied
    pub source_root: PathBuf,
    /// Snapshot directory
    pub location: PathBuf,
    /// Creation time in unix milliseconds
    pub created_at_ms: u128,
}

impl BackupRecord {
    /// Describe a snapshot that already exists on disk, e.g. one left by an
    /// earlier run, so it can be restored manually.
    ///
    /// The timestamp is read back from the `_<millis>` suffix when present.
    pub fn from_existing(source_root: PathBuf, location: PathBuf) -> Self {
        let created_at_ms = location
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.rsplit_once('_'))
            .and_then(|(_, ts)| ts.parse().ok())
            .unwrap_or(0);
        Self { source_root, location, created_at_ms }
    }
}

/// Current time in unix milliseconds.
fn unix_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Snapshot directory name for `root` at `timestamp`.
pub fn snapshot_name(root: &Path, timestamp: u128) -> String {
    let base = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resource".to_string());
    format!("{}_{}", base, timestamp)
}

/// Make a path absolute and resolve symlinks for the part that exists.
///
/// Unlike `fs::canonicalize`, works for paths that have not been created yet.
fn resolve_lenient(path: &Path) -> io::Result<PathBuf> {
    let absolute =
        if path.is_absolute() { path.to_path_buf() } else { std::env::current_dir()?.join(path) };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(resolved) => {
                let mut out = resolved;
                for part in missing.iter().rev() {
                    out.push(part);
                }
                return Ok(out);
            }
            Err(_) => match (existing.parent(), existing.components().next_back()) {
                (Some(parent), Some(Component::Normal(name))) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Ok(absolute),
            },
        }
    }
}

/// Recursively copy `from` into the existing directory `to`.
///
/// Every copied file is flushed to disk before returning.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(from).map_err(io::Error::other)?;
        let new_path = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir(&new_path)?;
        } else if file_type.is_symlink() {
            copy_symlink(path, &new_path)?;
        } else {
            fs::copy(path, &new_path)?;
            fs::File::open(&new_path)?.sync_all()?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Snapshot `root` into a fresh directory under `destination_base`.
///
/// Creates `destination_base` (recursively) if it does not exist. Returns
/// only after the whole tree has been copied and synced. A partially written
/// snapshot is removed again on failure.
pub fn backup(root: &Path, destination_base: &Path) -> Result<BackupRecord, BackupError> {
    let copy_err = |location: &Path, source: io::Error| BackupError::Copy {
        root: root.to_path_buf(),
        location: location.to_path_buf(),
        source,
    };

    let resolved_root = root.canonicalize().map_err(|e| copy_err(destination_base, e))?;
    let resolved_base = resolve_lenient(destination_base)
        .map_err(|e| BackupError::CreateBase { path: destination_base.to_path_buf(), source: e })?;
    if resolved_base.starts_with(&resolved_root) {
        return Err(BackupError::InsideRoot {
            root: root.to_path_buf(),
            base: destination_base.to_path_buf(),
        });
    }

    fs::create_dir_all(destination_base)
        .map_err(|e| BackupError::CreateBase { path: destination_base.to_path_buf(), source: e })?;

    let created_at_ms = unix_millis();
    let location = destination_base.join(snapshot_name(&resolved_root, created_at_ms));

    match fs::create_dir(&location) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(BackupError::AlreadyExists(location));
        }
        Err(e) => return Err(copy_err(&location, e)),
    }

    tracing::info!(root = %root.display(), location = %location.display(), "taking backup");

    if let Err(e) = copy_tree(root, &location) {
        if let Err(cleanup) = fs::remove_dir_all(&location) {
            tracing::warn!(
                location = %location.display(),
                "failed to remove partial backup: {}", cleanup
            );
        }
        return Err(copy_err(&location, e));
    }

    Ok(BackupRecord { source_root: root.to_path_buf(), location, created_at_ms })
}

/// Replace the resource root with its snapshot.
///
/// Consumes the record: a snapshot can be restored at most once. The root is
/// deleted first, then the snapshot is renamed into place. When the rename
/// cannot be done (different filesystems) the snapshot is copied and then
/// removed.
pub fn restore(record: BackupRecord) -> Result<(), RestoreError> {
    let BackupRecord { source_root: root, location: backup, .. } = record;
    let fail = |stage, source| RestoreError {
        root: root.clone(),
        backup: backup.clone(),
        stage,
        source,
    };

    tracing::warn!(root = %root.display(), backup = %backup.display(), "restoring from backup");

    if !backup.is_dir() {
        return Err(fail(
            RestoreStage::MoveSnapshot,
            io::Error::new(io::ErrorKind::NotFound, "snapshot directory is missing"),
        ));
    }

    match fs::remove_dir_all(&root) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(fail(RestoreStage::RemoveRoot, e)),
    }

    if let Err(rename_err) = fs::rename(&backup, &root) {
        tracing::debug!("rename failed ({}), falling back to copy", rename_err);
        fs::create_dir_all(&root).map_err(|e| fail(RestoreStage::MoveSnapshot, e))?;
        copy_tree(&backup, &root).map_err(|e| fail(RestoreStage::MoveSnapshot, e))?;
        if let Err(e) = fs::remove_dir_all(&backup) {
            tracing::warn!(backup = %backup.display(), "restored, but failed to remove snapshot: {}", e);
        }
    }

    Ok(())
}
