//! Run options and library location.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::markers::DEFAULT_TOLERANCE_MS;

/// Options shared by every comparison run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Run the title-only matching pass
    pub title_fallback: bool,
    /// Hot cue pairing tolerance in milliseconds
    pub tolerance_ms: u32,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            title_fallback: true,
            tolerance_ms: DEFAULT_TOLERANCE_MS,
        }
    }
}

/// The explicit path when given, otherwise rekordbox's default location for
/// this platform.
pub fn resolve_db_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    default_db_path(|var| std::env::var(var).ok())
}

fn default_db_path(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    let base = if cfg!(windows) {
        env("APPDATA").map(|d| PathBuf::from(d).join("Pioneer"))
    } else if cfg!(target_os = "macos") {
        env("HOME").map(|h| PathBuf::from(h).join("Library").join("Pioneer"))
    } else {
        None
    };
    base.map(|b| b.join("rekordbox").join("master.db")).ok_or_else(|| {
        Error::Config("no default rekordbox database location on this platform; pass --db".to_string())
    })
}
