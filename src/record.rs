//! Build comparison records from store slots.

use crate::models::{Content, LinkedArtist, Rec, Slot};
use crate::normalize::{normalize, strip_file_suffixes, strip_transcode_suffix};
use crate::paths::PathGuesser;

/// Artist text, trying in order: the direct artist-name field, the linked
/// artist's name, all linked artists joined with " & ", the legacy artist
/// string. Empty when none is set.
pub fn artist_text(content: &Content) -> String {
    if let Some(name) = non_blank(content.artist_name.as_deref()) {
        return name.to_string();
    }
    if let Some(name) = content.artist.as_ref().and_then(linked_name) {
        return name.to_string();
    }
    let names: Vec<&str> = content.artists.iter().filter_map(linked_name).collect();
    if !names.is_empty() {
        return names.join(" & ");
    }
    non_blank(content.legacy_artist.as_deref())
        .unwrap_or_default()
        .to_string()
}

/// Title with any transcode marker removed.
pub fn title_text(content: &Content) -> String {
    strip_transcode_suffix(content.title.as_deref().unwrap_or_default())
}

/// Hot cue offsets in ascending order; memory cues are dropped.
pub fn hot_cue_marks(content: &Content) -> Vec<u32> {
    let mut marks: Vec<u32> = content
        .cues
        .iter()
        .filter(|c| !c.is_memory_cue())
        .map(|c| c.in_msec)
        .collect();
    marks.sort_unstable();
    marks
}

/// Human-readable "Artist — Title", or the title alone.
pub fn label(artist: &str, title: &str) -> String {
    if artist.is_empty() {
        title.to_string()
    } else {
        format!("{artist} — {title}")
    }
}

/// Build the comparison record for one slot. Missing or malformed fields
/// degrade to empty values.
pub fn build_rec(slot: &Slot, guesser: &impl PathGuesser) -> Rec {
    let content = &slot.content;
    let artist = artist_text(content);
    let title = title_text(content);

    let filename_key = guesser
        .guess_path(content)
        .as_deref()
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .map(|stem| normalize(&strip_file_suffixes(stem)));

    Rec {
        content_id: content.id.clone(),
        slot_id: slot.slot_id.clone(),
        artist_key: normalize(&artist),
        title_key: normalize(&title),
        filename_key,
        label: label(&artist, &title),
        track_no: slot.track_no,
        cue_marks_ms: hot_cue_marks(content),
    }
}

/// Build records for a whole playlist, preserving slot order.
pub fn build_recs(slots: &[Slot], guesser: &impl PathGuesser) -> Vec<Rec> {
    slots.iter().map(|s| build_rec(s, guesser)).collect()
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

fn linked_name(artist: &LinkedArtist) -> Option<&str> {
    non_blank(artist.name.as_deref())
}
