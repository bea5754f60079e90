//! [`TrackStore`] over a rekordbox 6/7 `master.db`.
//!
//! Tables used:
//! - `djmdPlaylist`: only plain playlists (`Attribute = 0`) resolve by name
//! - `djmdSongPlaylist`: one row per slot, ordered by `TrackNo`
//! - `djmdContent` + `djmdArtist` + `djmdKey`: content metadata
//! - `djmdCue`: cue points; `Kind = 0` is a memory cue
//!
//! Writes open a transaction lazily on the first staged change and stay
//! pending until [`TrackStore::commit`].

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{CloneCounts, CommitStatus, Content, Cue, LinkedArtist, Slot, MEMORY_CUE_KIND};
use crate::store::TrackStore;

const SLOT_SELECT: &str = "
SELECT
    sp.ID AS SlotID,
    COALESCE(sp.TrackNo, 0) AS TrackNo,
    c.ID AS ContentID,
    c.Title AS Title,
    a.Name AS ArtistName,
    c.SrcArtistName AS SrcArtistName,
    c.FolderPath AS FolderPath,
    c.OrgFolderPath AS OrgFolderPath,
    c.FileNameL AS FileNameL,
    COALESCE(c.BPM, 0) AS BPM,
    k.ScaleName AS KeyName
FROM djmdSongPlaylist sp
INNER JOIN djmdContent c ON c.ID = sp.ContentID
LEFT JOIN djmdArtist a ON c.ArtistID = a.ID
LEFT JOIN djmdKey k ON c.KeyID = k.ID
WHERE sp.PlaylistID = ?1 AND c.rb_local_deleted = 0
ORDER BY sp.TrackNo, sp.ID
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing library for reading and writing. `key` is issued as
    /// `PRAGMA key` for SQLCipher builds; `busy_timeout` bounds how long a
    /// statement waits on another process's lock.
    pub fn open(path: &Path, key: Option<&str>, busy_timeout: Duration) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        Self::prepare(conn, key, busy_timeout)
    }

    /// Open an existing library read-only.
    pub fn open_read_only(path: &Path, key: Option<&str>) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        Self::prepare(conn, key, Duration::ZERO)
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn prepare(conn: Connection, key: Option<&str>, busy_timeout: Duration) -> Result<Self> {
        if let Some(key) = key {
            conn.execute_batch(&format!("PRAGMA key = '{}'", key.replace('\'', "''")))?;
        }
        conn.busy_timeout(busy_timeout)?;
        // Fails here rather than on first query when the key is wrong
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))?;
        Ok(Self { conn })
    }

    fn playlist_id(&self, name: &str) -> Result<String> {
        self.conn
            .query_row(
                "SELECT ID FROM djmdPlaylist
                 WHERE Name = ?1 AND rb_local_deleted = 0 AND Attribute = 0
                 ORDER BY Seq LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::PlaylistNotFound(name.to_string()))
    }

    fn content_exists(&self, content_id: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM djmdContent WHERE ID = ?1 AND rb_local_deleted = 0",
                params![content_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn cues_for(&self, content_id: &str) -> Result<Vec<Cue>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT COALESCE(InMsec, 0), COALESCE(Kind, 0) FROM djmdCue
             WHERE ContentID = ?1 AND rb_local_deleted = 0
             ORDER BY InMsec",
        )?;
        let rows = stmt.query_map(params![content_id], |row| {
            let in_msec: i64 = row.get(0)?;
            Ok(Cue {
                in_msec: u32::try_from(in_msec).unwrap_or(0),
                kind: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn begin_if_needed(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

/// rekordbox links one artist row per content and keeps the full file path in
/// `FolderPath`, so `artist_name`, `artists`, `location` and `file_dir` stay
/// unset here. `SrcArtistName` is the artist text of tracks with no linked row.
fn row_to_slot(row: &rusqlite::Row) -> rusqlite::Result<Slot> {
    let bpm_raw: i64 = row.get("BPM")?;
    let artist: Option<String> = row.get("ArtistName")?;
    let track_no: i64 = row.get("TrackNo")?;
    Ok(Slot {
        slot_id: row.get("SlotID")?,
        track_no: u32::try_from(track_no).unwrap_or(0),
        content: Content {
            id: row.get("ContentID")?,
            title: row.get("Title")?,
            artist: artist.map(|name| LinkedArtist { name: Some(name) }),
            legacy_artist: row.get("SrcArtistName")?,
            folder_path: row.get("FolderPath")?,
            org_folder_path: row.get("OrgFolderPath")?,
            file_name: row.get("FileNameL")?,
            bpm: bpm_raw as f64 / 100.0,
            key_name: row.get("KeyName")?,
            ..Default::default()
        },
    })
}

/// Slot ids of a playlist in track order: the slots [`SLOT_SELECT`] returns,
/// followed by those it hides (deleted or missing content).
fn playlist_order(conn: &Connection, playlist_id: &str) -> Result<(Vec<String>, Vec<String>)> {
    let mut stmt = conn.prepare_cached(
        "SELECT sp.ID, CASE WHEN c.rb_local_deleted = 0 THEN 1 ELSE 0 END
         FROM djmdSongPlaylist sp
         LEFT JOIN djmdContent c ON c.ID = sp.ContentID
         WHERE sp.PlaylistID = ?1
         ORDER BY sp.TrackNo, sp.ID",
    )?;
    let rows = stmt.query_map(params![playlist_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? == 1))
    })?;
    let mut visible = Vec::new();
    let mut hidden = Vec::new();
    for row in rows {
        let (id, is_visible) = row?;
        if is_visible {
            visible.push(id);
        } else {
            hidden.push(id);
        }
    }
    Ok((visible, hidden))
}

/// Move one slot to `new_track_no` counted over the visible slots, then
/// renumber the playlist `1..=N` with hidden slots last.
fn move_within_playlist(
    conn: &Connection,
    playlist: &str,
    playlist_id: &str,
    slot_id: &str,
    new_track_no: u32,
) -> Result<()> {
    let (mut order, hidden) = playlist_order(conn, playlist_id)?;

    let from = order
        .iter()
        .position(|id| id == slot_id)
        .ok_or_else(|| Error::SlotNotFound {
            playlist: playlist.to_string(),
            slot_id: slot_id.to_string(),
        })?;
    let len = order.len() as u32;
    if new_track_no == 0 || new_track_no > len {
        return Err(Error::TrackNoOutOfRange {
            playlist: playlist.to_string(),
            track_no: new_track_no,
            len,
        });
    }

    let moved = order.remove(from);
    order.insert(new_track_no as usize - 1, moved);

    // Rewrites only rows whose number changed: the moved slot and the
    // ripple between its old and new position.
    let mut stmt = conn.prepare_cached(
        "UPDATE djmdSongPlaylist SET TrackNo = ?1 WHERE ID = ?2 AND TrackNo IS NOT ?1",
    )?;
    for (idx, id) in order.iter().chain(&hidden).enumerate() {
        stmt.execute(params![idx as i64 + 1, id])?;
    }
    Ok(())
}

/// Delete the target's hot cues and copy the source's with fresh ids.
fn replace_hot_cues(conn: &Connection, source_content_id: &str, target_content_id: &str) -> Result<CloneCounts> {
    let source: Vec<(i64, i64, i32, i64, Option<String>)> = {
        let mut stmt = conn.prepare_cached(
            "SELECT COALESCE(InMsec, 0), COALESCE(OutMsec, -1), Kind, COALESCE(Color, -1), Comment
             FROM djmdCue
             WHERE ContentID = ?1 AND Kind != ?2 AND rb_local_deleted = 0
             ORDER BY InMsec",
        )?;
        let rows = stmt.query_map(params![source_content_id, MEMORY_CUE_KIND], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let deleted = conn.execute(
        "DELETE FROM djmdCue WHERE ContentID = ?1 AND Kind != ?2",
        params![target_content_id, MEMORY_CUE_KIND],
    )?;

    let next_id: i64 = conn.query_row(
        "SELECT COALESCE(MAX(CAST(ID AS INTEGER)), 0) + 1 FROM djmdCue",
        [],
        |row| row.get(0),
    )?;
    let mut insert = conn.prepare_cached(
        "INSERT INTO djmdCue (ID, ContentID, InMsec, OutMsec, Kind, Color, Comment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (offset, (in_msec, out_msec, kind, color, comment)) in source.iter().enumerate() {
        insert.execute(params![
            (next_id + offset as i64).to_string(),
            target_content_id,
            in_msec,
            out_msec,
            kind,
            color,
            comment,
        ])?;
    }

    Ok(CloneCounts {
        deleted,
        created: source.len(),
    })
}

impl TrackStore for SqliteStore {
    fn ordered_slots(&self, playlist: &str) -> Result<Vec<Slot>> {
        let playlist_id = self.playlist_id(playlist)?;
        let mut stmt = self.conn.prepare(SLOT_SELECT)?;
        let mut slots = stmt
            .query_map(params![playlist_id], row_to_slot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for slot in &mut slots {
            slot.content.cues = self.cues_for(&slot.content.id)?;
        }
        Ok(slots)
    }

    fn move_slot(&mut self, playlist: &str, slot_id: &str, new_track_no: u32) -> Result<()> {
        let playlist_id = self.playlist_id(playlist)?;
        self.begin_if_needed()?;
        // Dropping the savepoint on error undoes this move's partial writes
        let sp = self.conn.savepoint()?;
        move_within_playlist(&sp, playlist, &playlist_id, slot_id, new_track_no)?;
        sp.commit()?;
        Ok(())
    }

    fn clone_markers(&mut self, source_content_id: &str, target_content_id: &str) -> Result<CloneCounts> {
        for id in [source_content_id, target_content_id] {
            if !self.content_exists(id)? {
                return Err(Error::ContentNotFound(id.to_string()));
            }
        }
        if source_content_id == target_content_id {
            return Ok(CloneCounts::default());
        }
        self.begin_if_needed()?;
        let sp = self.conn.savepoint()?;
        let counts = replace_hot_cues(&sp, source_content_id, target_content_id)?;
        sp.commit()?;
        Ok(counts)
    }

    fn commit(&mut self) -> Result<CommitStatus> {
        if self.conn.is_autocommit() {
            return Ok(CommitStatus::NothingToCommit);
        }
        match self.conn.execute_batch("COMMIT") {
            Ok(()) => {
                info!("changes committed");
                Ok(CommitStatus::Committed)
            }
            Err(e) => {
                let err = Error::from(e);
                self.rollback()?;
                if err.is_lock_conflict() {
                    warn!("commit refused: database locked by another process");
                    Ok(CommitStatus::LockConflict)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{create_test_store, populate, raw_track_numbers, slot_order};
    use super::*;

    #[test]
    fn test_ordered_slots() {
        let store = create_test_store();
        let slots = store.ordered_slots("Set A (USB)").unwrap();
        let ids: Vec<&str> = slots.iter().map(|s| s.slot_id.as_str()).collect();
        assert_eq!(ids, vec!["sp11", "sp12", "sp13", "sp14"]);

        let archangel = &slots[1];
        assert_eq!(archangel.track_no, 2);
        assert_eq!(archangel.content.id, "t11");
        assert_eq!(archangel.content.title.as_deref(), Some("Archangel (320 mp3)"));
        assert_eq!(
            archangel.content.artist.as_ref().and_then(|a| a.name.as_deref()),
            Some("Burial")
        );
        assert_eq!(archangel.content.cues.len(), 2);

        // No linked artist row
        assert!(slots[0].content.artist.is_none());
    }

    #[test]
    fn test_content_fields() {
        let store = create_test_store();
        let slots = store.ordered_slots("Set A").unwrap();
        let first = &slots[0].content;
        assert_eq!(first.bpm, 139.5);
        assert_eq!(first.key_name.as_deref(), Some("Am"));
        assert_eq!(first.folder_path.as_deref(), Some("/Music/Burial/01 Archangel.flac"));
        let kinds: Vec<i32> = first.cues.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![0, 1, 2]);
    }

    #[test]
    fn test_unknown_playlist() {
        let store = create_test_store();
        let err = store.ordered_slots("Nope").unwrap_err();
        assert!(matches!(err, Error::PlaylistNotFound(ref n) if n == "Nope"));
    }

    #[test]
    fn test_folders_do_not_resolve() {
        let store = create_test_store();
        assert!(matches!(
            store.ordered_slots("Crates"),
            Err(Error::PlaylistNotFound(_))
        ));
    }

    #[test]
    fn test_move_backward_ripples() {
        let mut store = create_test_store();
        store.move_slot("Set A (USB)", "sp14", 2).unwrap();
        assert_eq!(slot_order(&store, "Set A (USB)"), vec!["sp11", "sp14", "sp12", "sp13"]);
        let numbers: Vec<u32> = store
            .ordered_slots("Set A (USB)")
            .unwrap()
            .iter()
            .map(|s| s.track_no)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_move_forward_ripples() {
        let mut store = create_test_store();
        store.move_slot("Set A (USB)", "sp11", 3).unwrap();
        assert_eq!(slot_order(&store, "Set A (USB)"), vec!["sp12", "sp13", "sp11", "sp14"]);
        // Other playlists are untouched
        assert_eq!(slot_order(&store, "Set A"), vec!["sp1", "sp2", "sp3", "sp4"]);
    }

    #[test]
    fn test_move_rejects_bad_targets() {
        let mut store = create_test_store();
        assert!(matches!(
            store.move_slot("Set A (USB)", "sp11", 5),
            Err(Error::TrackNoOutOfRange { len: 4, .. })
        ));
        assert!(matches!(
            store.move_slot("Set A (USB)", "sp11", 0),
            Err(Error::TrackNoOutOfRange { .. })
        ));
        assert!(matches!(
            store.move_slot("Set A (USB)", "sp1", 1),
            Err(Error::SlotNotFound { .. })
        ));
    }

    #[test]
    fn test_commit_and_rollback() {
        let mut store = create_test_store();
        assert_eq!(store.commit().unwrap(), CommitStatus::NothingToCommit);

        store.move_slot("Set A (USB)", "sp14", 1).unwrap();
        store.rollback().unwrap();
        assert_eq!(slot_order(&store, "Set A (USB)"), vec!["sp11", "sp12", "sp13", "sp14"]);

        store.move_slot("Set A (USB)", "sp14", 1).unwrap();
        assert_eq!(store.commit().unwrap(), CommitStatus::Committed);
        assert_eq!(slot_order(&store, "Set A (USB)"), vec!["sp14", "sp11", "sp12", "sp13"]);
    }

    #[test]
    fn test_clone_markers_replaces_hot_cues_only() {
        let mut store = create_test_store();
        let counts = store.clone_markers("t2", "t12").unwrap();
        assert_eq!(counts, CloneCounts { deleted: 1, created: 2 });

        let cues = store.cues_for("t12").unwrap();
        let summary: Vec<(u32, i32)> = cues.iter().map(|c| (c.in_msec, c.kind)).collect();
        // Memory cue at 100 survives
        assert_eq!(summary, vec![(100, 0), (2000, 1), (8000, 2)]);

        let comment: Option<String> = store
            .connection()
            .query_row(
                "SELECT Comment FROM djmdCue WHERE ContentID = 't12' AND InMsec = 2000",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(comment.as_deref(), Some("drop"));
    }

    #[test]
    fn test_legacy_artist_column() {
        let store = create_test_store();
        store
            .connection()
            .execute_batch("UPDATE djmdContent SET ArtistID = NULL, SrcArtistName = 'Burial' WHERE ID = 't11'")
            .unwrap();
        let slots = store.ordered_slots("Set A (USB)").unwrap();
        let content = &slots[1].content;
        assert!(content.artist.is_none());
        assert_eq!(content.legacy_artist.as_deref(), Some("Burial"));
        assert_eq!(crate::record::artist_text(content), "Burial");
    }

    #[test]
    fn test_hidden_slots_are_not_listed() {
        let store = create_test_store();
        assert_eq!(slot_order(&store, "Set B (USB)"), vec!["sp32", "sp33", "sp34"]);
    }

    #[test]
    fn test_move_counts_visible_slots_only() {
        let mut store = create_test_store();
        store.move_slot("Set B (USB)", "sp34", 2).unwrap();
        assert_eq!(slot_order(&store, "Set B (USB)"), vec!["sp32", "sp34", "sp33"]);

        let numbers: Vec<u32> = store
            .ordered_slots("Set B (USB)")
            .unwrap()
            .iter()
            .map(|s| s.track_no)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        // Deleted and dangling slots are renumbered after the visible ones
        let raw = raw_track_numbers(&store, "p5");
        let expected: Vec<(String, i64)> = [("sp32", 1), ("sp34", 2), ("sp33", 3), ("sp31", 4), ("sp35", 5)]
            .into_iter()
            .map(|(id, n)| (id.to_string(), n))
            .collect();
        assert_eq!(raw, expected);
    }

    #[test]
    fn test_move_range_ignores_hidden_slots() {
        let mut store = create_test_store();
        assert!(matches!(
            store.move_slot("Set B (USB)", "sp32", 4),
            Err(Error::TrackNoOutOfRange { len: 3, .. })
        ));
        assert!(matches!(
            store.move_slot("Set B (USB)", "sp31", 1),
            Err(Error::SlotNotFound { .. })
        ));
    }

    #[test]
    fn test_failed_move_leaves_no_partial_writes() {
        let mut store = create_test_store();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER refuse_sp13 BEFORE UPDATE ON djmdSongPlaylist
                 WHEN NEW.ID = 'sp13'
                 BEGIN SELECT RAISE(ABORT, 'update refused'); END;",
            )
            .unwrap();

        // sp14 -> 1 renumbers sp11 and sp12 before reaching sp13
        assert!(store.move_slot("Set A (USB)", "sp14", 1).is_err());
        assert_eq!(store.commit().unwrap(), CommitStatus::Committed);

        let raw = raw_track_numbers(&store, "p2");
        let expected: Vec<(String, i64)> = [("sp11", 1), ("sp12", 2), ("sp13", 3), ("sp14", 4)]
            .into_iter()
            .map(|(id, n)| (id.to_string(), n))
            .collect();
        assert_eq!(raw, expected);
    }

    #[test]
    fn test_failed_move_keeps_earlier_moves() {
        let mut store = create_test_store();
        store.move_slot("Set A", "sp4", 1).unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER refuse_sp13 BEFORE UPDATE ON djmdSongPlaylist
                 WHEN NEW.ID = 'sp13'
                 BEGIN SELECT RAISE(ABORT, 'update refused'); END;",
            )
            .unwrap();
        assert!(store.move_slot("Set A (USB)", "sp14", 1).is_err());

        assert_eq!(store.commit().unwrap(), CommitStatus::Committed);
        assert_eq!(slot_order(&store, "Set A"), vec!["sp4", "sp1", "sp2", "sp3"]);
        assert_eq!(slot_order(&store, "Set A (USB)"), vec!["sp11", "sp12", "sp13", "sp14"]);
    }

    #[test]
    fn test_failed_clone_leaves_target_cues() {
        let mut store = create_test_store();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER refuse_8000 BEFORE INSERT ON djmdCue
                 WHEN NEW.InMsec = 8000
                 BEGIN SELECT RAISE(ABORT, 'insert refused'); END;",
            )
            .unwrap();

        // Deletes t12's hot cue and inserts 2000 before 8000 is refused
        assert!(store.clone_markers("t2", "t12").is_err());
        store.commit().unwrap();

        let summary: Vec<(u32, i32)> = store
            .cues_for("t12")
            .unwrap()
            .iter()
            .map(|c| (c.in_msec, c.kind))
            .collect();
        assert_eq!(summary, vec![(100, 0), (2000, 1)]);
        let total: i64 = store
            .connection()
            .query_row("SELECT count(*) FROM djmdCue WHERE ContentID = 't12'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 2);
        let original: i64 = store
            .connection()
            .query_row("SELECT count(*) FROM djmdCue WHERE ID = '8'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(original, 1);
    }

    #[test]
    fn test_clone_markers_unknown_content() {
        let mut store = create_test_store();
        assert!(matches!(
            store.clone_markers("t2", "missing"),
            Err(Error::ContentNotFound(ref id)) if id == "missing"
        ));
    }

    #[test]
    fn test_commit_lock_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.db");
        populate(&Connection::open(&path).unwrap());

        let mut store = SqliteStore::open(&path, None, Duration::ZERO).unwrap();

        // A second process holding a read transaction blocks the commit
        let other = Connection::open(&path).unwrap();
        other.execute_batch("BEGIN").unwrap();
        let _: i64 = other
            .query_row("SELECT count(*) FROM djmdContent", [], |row| row.get(0))
            .unwrap();

        store.move_slot("Set A (USB)", "sp14", 1).unwrap();
        assert_eq!(store.commit().unwrap(), CommitStatus::LockConflict);

        other.execute_batch("COMMIT").unwrap();
        assert_eq!(slot_order(&store, "Set A (USB)"), vec!["sp11", "sp12", "sp13", "sp14"]);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteStore::open(&dir.path().join("absent.db"), None, Duration::ZERO);
        assert!(result.is_err());
    }
}
