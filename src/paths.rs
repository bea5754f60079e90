//! Best-effort resolution of a content's on-disk audio file.
//!
//! Library records keep the file location in one of several fields depending
//! on the version that imported the track. [`FieldPathGuesser`] tries a fixed,
//! ordered list of named accessors and prefers a candidate that exists on
//! disk over one that merely looks like an audio path.

use std::path::{Path, PathBuf};

use crate::models::Content;

/// Extensions accepted as audio files (lowercase, without the dot).
pub const AUDIO_EXTS: &[&str] = &[
    "mp3", "wav", "aiff", "aif", "flac", "m4a", "alac", "aac", "ogg", "wma",
];

/// Resolve an audio file path for a content record. Never fails.
pub trait PathGuesser {
    fn guess_path(&self, content: &Content) -> Option<PathBuf>;
}

type FieldAccessor = fn(&Content) -> Option<&str>;

/// Full-path fields, in lookup order.
const PATH_FIELDS: &[FieldAccessor] = &[folder_path, org_folder_path, location];

fn folder_path(c: &Content) -> Option<&str> {
    c.folder_path.as_deref()
}

fn org_folder_path(c: &Content) -> Option<&str> {
    c.org_folder_path.as_deref()
}

fn location(c: &Content) -> Option<&str> {
    c.location.as_deref()
}

/// Guesser over the named path fields of [`Content`], falling back to
/// joining the directory and file-name fields.
pub struct FieldPathGuesser {
    exists: fn(&Path) -> bool,
}

impl FieldPathGuesser {
    pub fn new() -> Self {
        Self {
            exists: Path::is_file,
        }
    }

    /// Guesser with a custom existence check (used by tests).
    pub fn with_exists(exists: fn(&Path) -> bool) -> Self {
        Self { exists }
    }

    fn candidates(content: &Content) -> impl Iterator<Item = PathBuf> + '_ {
        let direct = PATH_FIELDS
            .iter()
            .filter_map(move |get| get(content))
            .filter(|v| !v.trim().is_empty())
            .map(normalize_location);
        let joined = join_dir_and_file(content);
        direct.chain(joined)
    }
}

impl Default for FieldPathGuesser {
    fn default() -> Self {
        Self::new()
    }
}

impl PathGuesser for FieldPathGuesser {
    fn guess_path(&self, content: &Content) -> Option<PathBuf> {
        let mut best_nonexistent = None;
        for path in Self::candidates(content).filter(|p| is_audio_path(p)) {
            if (self.exists)(&path) {
                return Some(path);
            }
            if best_nonexistent.is_none() {
                best_nonexistent = Some(path);
            }
        }
        best_nonexistent
    }
}

/// True when the path has one of [`AUDIO_EXTS`].
pub fn is_audio_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Turn a stored location ("file:///C:/Music/a.mp3", "C:\\Music\\a.mp3",
/// "file://localhost/Users/a.mp3") into a plain path.
pub fn normalize_location(raw: &str) -> PathBuf {
    let mut v = raw.trim().replace('\\', "/");
    let lower = v.to_ascii_lowercase();
    if lower.starts_with("file://localhost/") {
        v = v["file://localhost".len()..].to_string();
    } else if lower.starts_with("file:///") {
        v = v["file://".len()..].to_string();
    }
    // "/C:/..." left over from a Windows file URL
    if cfg!(windows) && v.len() > 3 && v.starts_with('/') && v.as_bytes()[2] == b':' {
        v.remove(0);
    }
    PathBuf::from(v)
}

fn join_dir_and_file(content: &Content) -> Option<PathBuf> {
    let dir = content.file_dir.as_deref().filter(|d| !d.trim().is_empty())?;
    let file = content.file_name.as_deref().filter(|f| !f.trim().is_empty())?;
    Some(normalize_location(dir).join(file))
}
