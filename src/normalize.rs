//! Normalization of free-text track fields into comparison keys.
//!
//! Keys are exact-match only: two records are considered the same track when
//! their normalized strings are equal, never by similarity.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Title suffix appended when a track is transcoded: "(320 mp3)", "(AIFF)", "(Transcoded)".
pub static TRANSCODE_TITLE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\((?:320\s*mp3|aiff|transcoded)\)\s*$").unwrap()
});

/// Filename stem suffix written by the transcoder: "_mp3_320", "_aiff".
pub static TRANSCODE_FILE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:_mp3_320|_aiff)$").unwrap());

/// Any run of characters that is not a lowercase ASCII letter or digit.
pub static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9a-z]+").unwrap());

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Fold Unicode text to lowercase ASCII via NFKD decomposition.
/// Combining marks and any other non-ASCII code points are dropped, so
/// "Beyoncé" → "beyonce" while scripts without an ASCII decomposition vanish.
pub fn fold_to_ascii(s: &str) -> String {
    s.nfkd().filter(char::is_ascii).collect::<String>().to_lowercase()
}

/// Canonical comparison key for an artist, title or filename stem.
/// e.g. "Dré & Co. — Mix!" → "dre co mix"
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let folded = fold_to_ascii(text);
    let spaced = NON_ALNUM.replace_all(&folded, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove a trailing transcode marker from a title and trim it.
pub fn strip_transcode_suffix(title: &str) -> String {
    TRANSCODE_TITLE_SUFFIX.replace(title, "").trim().to_string()
}

/// Remove a trailing transcode marker from a filename stem.
pub fn strip_file_suffixes(stem: &str) -> String {
    TRANSCODE_FILE_SUFFIX.replace(stem, "").to_string()
}

// ============================================================================
// TESTS
// ============================================================================
