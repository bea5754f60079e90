//! Hot-cue comparison between matched records.
//!
//! Pairing is greedy nearest-neighbour: base cues are taken in order and each
//! claims the closest unclaimed candidate cue within the tolerance (leftmost
//! on equal distance). There is no backtracking, so under unusual tie
//! patterns the result can differ from an optimal bipartite assignment; the
//! greedy result is deterministic and O(n·m), which is what the mismatch
//! report relies on.

use crate::models::{MarkerComparison, MarkerMismatch, MatchedPair, MismatchReason};

/// Default pairing tolerance in milliseconds.
pub const DEFAULT_TOLERANCE_MS: u32 = 50;

/// Pair `base_ms` against `cand_ms` within `tolerance_ms`.
pub fn compare_markers(base_ms: &[u32], cand_ms: &[u32], tolerance_ms: u32) -> MarkerComparison {
    let mut consumed = vec![false; cand_ms.len()];
    let mut result = MarkerComparison::default();

    for &b in base_ms {
        let mut best: Option<(usize, u32)> = None;
        for (j, &c) in cand_ms.iter().enumerate() {
            if consumed[j] {
                continue;
            }
            let diff = b.abs_diff(c);
            if diff > tolerance_ms {
                continue;
            }
            // Strict comparison keeps the leftmost candidate on ties
            if best.map_or(true, |(_, d)| diff < d) {
                best = Some((j, diff));
            }
        }
        match best {
            Some((j, _)) => {
                consumed[j] = true;
                result.pairs.push((b, cand_ms[j]));
            }
            None => result.unmatched_base.push(b),
        }
    }

    result.unmatched_cand = cand_ms
        .iter()
        .zip(&consumed)
        .filter(|(_, used)| !**used)
        .map(|(&c, _)| c)
        .collect();
    result
}

/// Classify one matched pair. Counts are compared first; placement is only
/// compared when both sides have the same number of hot cues.
pub fn classify_pair(base_ms: &[u32], cand_ms: &[u32], tolerance_ms: u32) -> Option<MismatchReason> {
    if base_ms.len() != cand_ms.len() {
        return Some(MismatchReason::CountMismatch {
            base: base_ms.len(),
            cand: cand_ms.len(),
        });
    }
    let cmp = compare_markers(base_ms, cand_ms, tolerance_ms);
    if cmp.is_clean() {
        None
    } else {
        Some(MismatchReason::PlacementMismatch {
            unmatched_base: cmp.unmatched_base,
            unmatched_cand: cmp.unmatched_cand,
        })
    }
}

/// Every matched pair whose hot cues disagree, in match order.
pub fn find_mismatches(matches: &[MatchedPair], tolerance_ms: u32) -> Vec<MarkerMismatch> {
    matches
        .iter()
        .filter_map(|m| {
            classify_pair(&m.base.cue_marks_ms, &m.cand.cue_marks_ms, tolerance_ms).map(|reason| {
                MarkerMismatch {
                    base: m.base.clone(),
                    cand: m.cand.clone(),
                    reason,
                }
            })
        })
        .collect()
}
