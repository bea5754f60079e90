//! One reconciliation run: load both playlists, match, compare hot cues, and
//! optionally apply the reorder and hot-cue phases through the store.

use serde::Serialize;
use tracing::info;

use crate::config::ReconcileOptions;
use crate::cue_sync::{finish_phase, sync_markers};
use crate::error::{Error, Result};
use crate::markers::find_mismatches;
use crate::matcher::match_records;
use crate::models::{CommitStatus, MarkerMismatch, MatchResult, Rec, ReorderReport, SyncReport};
use crate::paths::PathGuesser;
use crate::progress::{create_progress_bar, create_spinner};
use crate::record::build_recs;
use crate::reorder::{plan_and_apply, verify_alignment};
use crate::store::TrackStore;

/// Read-only outcome of comparing a base playlist with a candidate.
#[derive(Clone, Debug, Serialize)]
pub struct Comparison {
    pub base_playlist: String,
    pub cand_playlist: String,
    pub base_count: usize,
    pub cand_count: usize,
    pub result: MatchResult,
    pub cue_mismatches: Vec<MarkerMismatch>,
    /// Candidate records in their current order
    #[serde(skip)]
    pub cand_order: Vec<Rec>,
}

/// Build records for one playlist, in track order.
pub fn load_recs<S: TrackStore + ?Sized>(store: &S, playlist: &str, guesser: &impl PathGuesser) -> Result<Vec<Rec>> {
    let spinner = create_spinner(&format!("Loading '{playlist}'"));
    let slots = store.ordered_slots(playlist);
    spinner.finish_and_clear();
    let recs = build_recs(&slots?, guesser);
    info!(playlist, tracks = recs.len(), "playlist loaded");
    Ok(recs)
}

pub fn compare<S: TrackStore + ?Sized>(
    store: &S,
    base_playlist: &str,
    cand_playlist: &str,
    guesser: &impl PathGuesser,
    options: &ReconcileOptions,
) -> Result<Comparison> {
    let base = load_recs(store, base_playlist, guesser)?;
    let cand = load_recs(store, cand_playlist, guesser)?;

    let result = match_records(&base, &cand, options.title_fallback);
    let cue_mismatches = find_mismatches(&result.matches, options.tolerance_ms);
    info!(
        matched = result.matches.len(),
        missing = result.missing.len(),
        extra = result.extra.len(),
        cue_mismatches = cue_mismatches.len(),
        "comparison complete"
    );

    Ok(Comparison {
        base_playlist: base_playlist.to_string(),
        cand_playlist: cand_playlist.to_string(),
        base_count: base.len(),
        cand_count: cand.len(),
        result,
        cue_mismatches,
        cand_order: cand,
    })
}

/// Move the matched candidate slots into base order, commit once, and
/// verify against a fresh comparison when the commit went through. A move
/// refused by another process's lock rolls the whole phase back.
pub fn apply_reorder<S: TrackStore + ?Sized>(
    store: &mut S,
    comparison: &Comparison,
    guesser: &impl PathGuesser,
    options: &ReconcileOptions,
) -> Result<ReorderReport> {
    let playlist = comparison.cand_playlist.as_str();
    let pb = create_progress_bar(comparison.result.matches.len() as u64, "Reordering");

    let mut lock_conflict = false;
    let moves = plan_and_apply(&comparison.result.matches, &comparison.cand_order, |slot_id, to| {
        pb.inc(1);
        let result = store.move_slot(playlist, slot_id, to);
        lock_conflict |= result.as_ref().is_err_and(Error::is_lock_conflict);
        result
    });
    pb.finish_and_clear();

    let commit = finish_phase(store, lock_conflict);
    let misaligned = match commit {
        CommitStatus::Committed | CommitStatus::NothingToCommit => {
            let fresh = compare(&*store, &comparison.base_playlist, playlist, guesser, options)?;
            Some(verify_alignment(&fresh.result, &fresh.cand_order))
        }
        CommitStatus::LockConflict | CommitStatus::Failed(_) => None,
    };

    Ok(ReorderReport {
        moves,
        commit,
        misaligned,
    })
}

/// Overwrite the candidate's hot cues for every pair whose cues disagree.
pub fn sync_cues<S: TrackStore + ?Sized>(store: &mut S, comparison: &Comparison) -> SyncReport {
    sync_markers(store, &comparison.cue_mismatches)
}
