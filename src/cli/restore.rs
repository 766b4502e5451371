//! Restore command implementation

use std::path::Path;
use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_ROLLBACK_FAILED, EXIT_SUCCESS};
use crate::logging;
use crate::pipeline::{restore, BackupRecord};

/// Run the restore command
pub fn run_restore(backup: &Path, res: &Path, verbose: bool) -> ExitCode {
    logging::init(verbose);
    ExitCode::from(restore_resource(backup, res))
}

/// Replace `res` with the snapshot at `backup`, returning the exit code.
fn restore_resource(backup: &Path, res: &Path) -> u8 {
    if !backup.is_dir() {
        eprintln!("Error: Backup not found: {}", backup.display());
        return EXIT_INVALID_ARGS;
    }

    // Restoring removes the resource folder first, which would take a nested snapshot with it
    let (Ok(backup_abs), Ok(cwd)) = (backup.canonicalize(), std::env::current_dir()) else {
        eprintln!("Error: Cannot resolve {}", backup.display());
        return EXIT_ERROR;
    };
    let res_abs = res.canonicalize().unwrap_or_else(|_| cwd.join(res));
    if backup_abs.starts_with(&res_abs) {
        eprintln!(
            "Error: Backup {} is inside the resource folder {}",
            backup.display(),
            res.display()
        );
        return EXIT_INVALID_ARGS;
    }

    let record = BackupRecord::from_existing(res.to_path_buf(), backup.to_path_buf());
    println!("Restoring {} from {}...", res.display(), backup.display());

    match restore(record) {
        Ok(()) => {
            println!("Restored {}", res.display());
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ROLLBACK_FAILED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_restore_replaces_resource() {
        let temp = TempDir::new().unwrap();
        let res = temp.path().join("race");
        let snapshot = temp.path().join("backups").join("race_1");
        fs::create_dir_all(&res).unwrap();
        fs::create_dir_all(&snapshot).unwrap();
        fs::write(res.join("a.luac"), "compiled").unwrap();
        fs::write(snapshot.join("a.lua"), "source").unwrap();

        assert_eq!(restore_resource(&snapshot, &res), EXIT_SUCCESS);
        assert_eq!(fs::read_to_string(res.join("a.lua")).unwrap(), "source");
        assert!(!res.join("a.luac").exists());
        assert!(!snapshot.exists());
    }

    #[test]
    fn test_restore_missing_backup() {
        let temp = TempDir::new().unwrap();
        let code = restore_resource(&temp.path().join("nope"), &temp.path().join("race"));
        assert_eq!(code, EXIT_INVALID_ARGS);
    }

    #[test]
    fn test_restore_rejects_nested_backup() {
        let temp = TempDir::new().unwrap();
        let res = temp.path().join("race");
        let snapshot = res.join("backups").join("race_1");
        fs::create_dir_all(&snapshot).unwrap();

        assert_eq!(restore_resource(&snapshot, &res), EXIT_INVALID_ARGS);
        assert!(snapshot.exists());
    }
}
