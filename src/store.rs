//! Interface to the track library the reconciler reads from and writes to.
//!
//! Writes (`move_slot`, `clone_markers`) are staged and only become durable
//! on [`TrackStore::commit`]. A commit refused because another application
//! holds the library lock is reported as [`CommitStatus::LockConflict`]
//! rather than an error so callers can aggregate it with the phase report.

use crate::error::Result;
use crate::models::{CloneCounts, CommitStatus, Slot};

pub trait TrackStore {
    /// Slots of the named playlist, ordered by track number.
    fn ordered_slots(&self, playlist: &str) -> Result<Vec<Slot>>;

    /// Move one slot to `new_track_no`, renumbering the slots in between.
    fn move_slot(&mut self, playlist: &str, slot_id: &str, new_track_no: u32) -> Result<()>;

    /// Replace every hot cue of `target_content_id` with a copy of the hot
    /// cues of `source_content_id`. Memory cues on either side are untouched.
    fn clone_markers(&mut self, source_content_id: &str, target_content_id: &str) -> Result<CloneCounts>;

    /// Make all staged changes durable.
    fn commit(&mut self) -> Result<CommitStatus>;

    /// Drop all staged changes.
    fn rollback(&mut self) -> Result<()>;
}
