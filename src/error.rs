//! Error types for the reconciliation library.
//!
//! Library modules return [`Error`]; the binaries wrap it in `anyhow` for
//! context. Per-item failures during an apply phase (a move that could not
//! be applied, a cue clone that failed) are not raised through this type by
//! the planners: they are captured in the phase report instead.

use rusqlite::ErrorCode;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown whenever the track database refuses a write or commit
/// because another process holds its lock.
pub const LOCK_CONFLICT_HINT: &str =
    "The track database is locked by another application. Close rekordbox and run again.";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown playlist name (fatal to the operation)
    #[error("Playlist '{0}' not found.")]
    PlaylistNotFound(String),

    /// Slot id is not part of the playlist
    #[error("Slot {slot_id} is not in playlist '{playlist}'")]
    SlotNotFound { playlist: String, slot_id: String },

    /// Requested position outside `1..=len`
    #[error("Track number {track_no} is out of range for '{playlist}' (1..={len})")]
    TrackNoOutOfRange {
        playlist: String,
        track_no: u32,
        len: u32,
    },

    /// Content id does not exist
    #[error("Content {0} not found")]
    ContentNotFound(String),

    /// Another process holds the database lock
    #[error("{}", LOCK_CONFLICT_HINT)]
    LockConflict,

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, Error::LockConflict)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => Error::LockConflict,
            _ => Error::Database(e),
        }
    }
}
