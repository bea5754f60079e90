//! Copy base hot cues onto candidates whose cues disagree.
//!
//! Every mismatched pair is cloned independently; a failed clone is recorded
//! and the run moves on. All clones are committed together at the end, so a
//! lock conflict, whether hit by a clone or by the commit, leaves the
//! candidate library exactly as it was.

use tracing::{info, warn};

use crate::models::{CommitStatus, MarkerMismatch, SyncOutcome, SyncReport, SyncResult};
use crate::progress::create_progress_bar;
use crate::store::TrackStore;

pub fn sync_markers<S: TrackStore + ?Sized>(store: &mut S, mismatches: &[MarkerMismatch]) -> SyncReport {
    let pb = create_progress_bar(mismatches.len() as u64, "Syncing hot cues");
    let mut results = Vec::with_capacity(mismatches.len());
    let mut lock_conflict = false;

    for m in mismatches {
        let source = &m.base.content_id;
        let target = &m.cand.content_id;
        let outcome = if source == target {
            SyncOutcome::Skipped {
                reason: "base and candidate share the same content".to_string(),
            }
        } else {
            match store.clone_markers(source, target) {
                Ok(counts) => SyncOutcome::Cloned(counts),
                Err(e) => {
                    lock_conflict |= e.is_lock_conflict();
                    warn!(source = %source, target = %target, error = %e, "hot cue clone failed");
                    SyncOutcome::Failed { reason: e.to_string() }
                }
            }
        };
        results.push(SyncResult {
            source_content_id: source.clone(),
            target_content_id: target.clone(),
            label: m.cand.label.clone(),
            outcome,
        });
        pb.inc(1);
    }
    pb.finish_and_clear();

    let commit = finish_phase(store, lock_conflict);
    let cloned = results
        .iter()
        .filter(|r| matches!(r.outcome, SyncOutcome::Cloned(_)))
        .count();
    info!(cloned, failed = results.len() - cloned, commit = ?commit, "hot cue sync complete");

    SyncReport { results, commit }
}

/// Commit staged changes. Anything other than a clean commit leaves the
/// store rolled back. A write that already hit a lock conflict rolls back
/// without attempting the commit.
pub(crate) fn finish_phase<S: TrackStore + ?Sized>(store: &mut S, lock_conflict: bool) -> CommitStatus {
    if lock_conflict {
        warn!("write refused: database locked by another process, rolling back");
        if let Err(rb) = store.rollback() {
            warn!(error = %rb, "rollback after lock conflict failed");
        }
        return CommitStatus::LockConflict;
    }
    match store.commit() {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "commit failed");
            if let Err(rb) = store.rollback() {
                warn!(error = %rb, "rollback after failed commit also failed");
            }
            if e.is_lock_conflict() {
                CommitStatus::LockConflict
            } else {
                CommitStatus::Failed(e.to_string())
            }
        }
    }
}
