//! Playable length of a playlist, estimated from hot cues.
//!
//! A track's span is the sum of the two largest gaps between consecutive hot
//! cues: in a typical mix the longest stretches are the parts actually
//! played. Tracks with fewer than [`MIN_HOT_CUES`] hot cues are skipped.

use serde::Serialize;

use crate::models::Slot;
use crate::record::{artist_text, hot_cue_marks, label, title_text};

pub const MIN_HOT_CUES: usize = 4;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpanOutcome {
    Measured { span_ms: u64 },
    Skipped { reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackSpan {
    pub track_no: u32,
    pub label: String,
    pub bpm: f64,
    pub key: Option<String>,
    pub outcome: SpanOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SetLengthReport {
    pub tracks: Vec<TrackSpan>,
    pub total_ms: u64,
}

impl SetLengthReport {
    pub fn skipped(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| matches!(t.outcome, SpanOutcome::Skipped { .. }))
            .count()
    }
}

/// Sum of the two largest gaps between consecutive sorted marks, or `None`
/// with fewer than [`MIN_HOT_CUES`] marks.
pub fn hot_cue_span(sorted_marks: &[u32]) -> Option<u64> {
    if sorted_marks.len() < MIN_HOT_CUES {
        return None;
    }
    let mut gaps: Vec<u64> = sorted_marks
        .windows(2)
        .map(|w| u64::from(w[1].saturating_sub(w[0])))
        .collect();
    gaps.sort_unstable_by(|a, b| b.cmp(a));
    Some(gaps[0] + gaps[1])
}

/// "Xm Ys", truncating milliseconds.
pub fn format_ms(ms: u64) -> String {
    format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
}

pub fn analyze_playlist(slots: &[Slot]) -> SetLengthReport {
    let mut report = SetLengthReport::default();
    for slot in slots {
        let content = &slot.content;
        let marks = hot_cue_marks(content);
        let track_label = label(&artist_text(content), &title_text(content));
        let outcome = match hot_cue_span(&marks) {
            Some(span_ms) => {
                report.total_ms += span_ms;
                SpanOutcome::Measured { span_ms }
            }
            None => SpanOutcome::Skipped {
                reason: format!("only {} hot cues", marks.len()),
            },
        };
        report.tracks.push(TrackSpan {
            track_no: slot.track_no,
            label: track_label,
            bpm: content.bpm,
            key: content.key_name.clone(),
            outcome,
        });
    }
    report
}
