//! Core data models for playlist reconciliation.
//!
//! Raw store records ([`Slot`], [`Content`], [`Cue`]), the comparison record
//! [`Rec`], and the result/report types produced by each phase.

use serde::Serialize;

// ============================================================================
// Store Records
// ============================================================================

/// Cue kind used by the library for memory cues. Every other kind is a hot cue.
pub const MEMORY_CUE_KIND: i32 = 0;

/// One cue point on a piece of content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cue {
    pub in_msec: u32,
    pub kind: i32,
}

impl Cue {
    pub fn is_memory_cue(&self) -> bool {
        self.kind == MEMORY_CUE_KIND
    }
}

/// Artist row linked from a content record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkedArtist {
    pub name: Option<String>,
}

/// Underlying audio asset, independent of any playlist.
///
/// Every text field is optional: the library is inconsistent about which
/// ones are filled, so consumers apply their own fallback order.
#[derive(Clone, Debug, Default)]
pub struct Content {
    pub id: String,
    pub title: Option<String>,
    /// Denormalized artist name, when the source provides one directly
    pub artist_name: Option<String>,
    /// Primary linked artist
    pub artist: Option<LinkedArtist>,
    /// Multiple linked artists (collaborations)
    pub artists: Vec<LinkedArtist>,
    /// Free-text artist from older library versions
    pub legacy_artist: Option<String>,
    pub folder_path: Option<String>,
    pub org_folder_path: Option<String>,
    pub location: Option<String>,
    pub file_dir: Option<String>,
    pub file_name: Option<String>,
    pub bpm: f64,
    pub key_name: Option<String>,
    pub cues: Vec<Cue>,
}

/// A content placed at one position of one playlist.
#[derive(Clone, Debug)]
pub struct Slot {
    pub slot_id: String,
    pub track_no: u32,
    pub content: Content,
}

// ============================================================================
// Comparison Record
// ============================================================================

/// Immutable comparison record built from one [`Slot`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rec {
    pub content_id: String,
    pub slot_id: String,
    pub artist_key: String,
    pub title_key: String,
    pub filename_key: Option<String>,
    pub label: String,
    pub track_no: u32,
    /// Hot cue offsets, ascending
    pub cue_marks_ms: Vec<u32>,
}

impl Rec {
    /// Pass-1 identity key.
    pub fn identity_key(&self) -> String {
        format!("{}|{}", self.artist_key, self.title_key)
    }
}

// ============================================================================
// Matching
// ============================================================================

/// Which matching pass paired two records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPass {
    ArtistTitle,
    FilenameStem,
    TitleOnly,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatchedPair {
    pub base: Rec,
    pub cand: Rec,
    pub pass: MatchPass,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MatchResult {
    pub matches: Vec<MatchedPair>,
    pub missing: Vec<Rec>,
    pub extra: Vec<Rec>,
}

impl MatchResult {
    pub fn is_aligned_set(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

// ============================================================================
// Markers
// ============================================================================

/// Outcome of comparing two hot-cue offset lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MarkerComparison {
    pub pairs: Vec<(u32, u32)>,
    pub unmatched_base: Vec<u32>,
    pub unmatched_cand: Vec<u32>,
}

impl MarkerComparison {
    pub fn is_clean(&self) -> bool {
        self.unmatched_base.is_empty() && self.unmatched_cand.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchReason {
    /// Different number of hot cues; placement was not compared
    CountMismatch { base: usize, cand: usize },
    /// Same count, but some cues fall outside the tolerance
    PlacementMismatch {
        unmatched_base: Vec<u32>,
        unmatched_cand: Vec<u32>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MarkerMismatch {
    pub base: Rec,
    pub cand: Rec,
    pub reason: MismatchReason,
}

// ============================================================================
// Apply Phases
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum MoveOutcome {
    Applied,
    Failed(String),
}

/// One attempted single-slot move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub slot_id: String,
    pub label: String,
    pub from: u32,
    pub to: u32,
    pub outcome: MoveOutcome,
}

impl MoveRecord {
    pub fn is_applied(&self) -> bool {
        self.outcome == MoveOutcome::Applied
    }
}

/// Hot cues removed from the target and created from the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CloneCounts {
    pub deleted: usize,
    pub created: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Cloned(CloneCounts),
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub source_content_id: String,
    pub target_content_id: String,
    pub label: String,
    pub outcome: SyncOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CommitStatus {
    Committed,
    NothingToCommit,
    /// Another process holds the database; nothing was written
    LockConflict,
    Failed(String),
}

impl CommitStatus {
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, CommitStatus::LockConflict)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    pub results: Vec<SyncResult>,
    pub commit: CommitStatus,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, SyncOutcome::Failed { .. }))
            .count()
    }
}

/// Matched pair whose candidate does not sit at its expected position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Misalignment {
    pub label: String,
    pub slot_id: String,
    pub expected: u32,
    pub actual: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReorderReport {
    pub moves: Vec<MoveRecord>,
    pub commit: CommitStatus,
    /// Filled only when the commit went through
    pub misaligned: Option<Vec<Misalignment>>,
}

impl ReorderReport {
    pub fn failed(&self) -> usize {
        self.moves.iter().filter(|m| !m.is_applied()).count()
    }
}
