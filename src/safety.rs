//! Backups taken before any write to the library.
//!
//! The backup target is validated before anything is written so a typo can
//! never overwrite the live database or an earlier backup.

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};

/// Pattern every backup filename must contain.
pub const BACKUP_PATTERN: &str = "backup";

/// Validates that `backup` is a safe place for a new copy of `db`.
///
/// Checks:
/// - The filename contains [`BACKUP_PATTERN`]
/// - It is not the database itself
/// - Nothing exists there yet
/// - Its directory exists
pub fn validate_backup_path(backup: &Path, db: &Path) -> Result<()> {
    let name = backup.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if !name.to_ascii_lowercase().contains(BACKUP_PATTERN) {
        return Err(Error::Config(format!(
            "Safety check failed: backup file '{}' must contain '{}' in the name",
            backup.display(),
            BACKUP_PATTERN
        )));
    }

    let same_file = backup == db
        || matches!(
            (backup.canonicalize(), db.canonicalize()),
            (Ok(a), Ok(b)) if a == b
        );
    if same_file {
        return Err(Error::Config(format!(
            "Safety check failed: backup '{}' cannot be the database itself",
            backup.display()
        )));
    }

    if backup.exists() {
        return Err(Error::Config(format!(
            "Safety check failed: '{}' already exists",
            backup.display()
        )));
    }

    if let Some(dir) = backup.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::metadata(dir)?;
    }
    Ok(())
}

/// Write a consistent copy of the open database to `dest`.
/// Must run outside a transaction.
pub fn backup_database(conn: &Connection, dest: &Path) -> Result<()> {
    conn.execute("VACUUM INTO ?1", [dest.to_string_lossy()])?;
    info!(dest = %dest.display(), "database backed up");
    Ok(())
}
