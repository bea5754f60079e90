//! Bring the candidate playlist into base order with single-slot moves.
//!
//! Target positions are visited from 1 upward. A slot already at its target
//! is left alone, so an aligned playlist produces no moves and every move
//! that is issued places one slot for good. The [`PositionMap`] mirrors the
//! store's renumbering after each successful move; failed moves leave it
//! untouched.

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{MatchResult, MatchedPair, Misalignment, MoveOutcome, MoveRecord, Rec};

/// 1-based position of every slot in the candidate playlist.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionMap {
    pos: FxHashMap<String, u32>,
}

impl PositionMap {
    /// Positions from the playlist's current order (index + 1).
    pub fn from_order(order: &[Rec]) -> Self {
        let pos = order
            .iter()
            .enumerate()
            .map(|(i, r)| (r.slot_id.clone(), i as u32 + 1))
            .collect();
        Self { pos }
    }

    pub fn get(&self, slot_id: &str) -> Option<u32> {
        self.pos.get(slot_id).copied()
    }

    /// Record a successful move of `slot_id` to `to`, shifting the slots in
    /// between: forward moves pull `(old, to]` up by one, backward moves push
    /// `[to, old)` down by one.
    pub fn apply_move(&mut self, slot_id: &str, to: u32) {
        let Some(old) = self.get(slot_id) else {
            return;
        };
        if old == to {
            return;
        }
        for (sid, p) in self.pos.iter_mut() {
            if sid == slot_id {
                continue;
            }
            if to > old && *p > old && *p <= to {
                *p -= 1;
            } else if to < old && *p >= to && *p < old {
                *p += 1;
            }
        }
        self.pos.insert(slot_id.to_string(), to);
    }
}

/// Matched candidate records in base order (stable on equal base track numbers).
pub fn desired_order(matches: &[MatchedPair]) -> Vec<&Rec> {
    let mut ordered: Vec<&MatchedPair> = matches.iter().collect();
    ordered.sort_by_key(|m| m.base.track_no);
    ordered.into_iter().map(|m| &m.cand).collect()
}

/// Move matched candidate slots so that they occupy positions `1..=N` in
/// base order. `move_fn(slot_id, target)` performs one move; a failure is
/// logged and recorded and the run continues. Missing and extra records are
/// never moved. Returns every attempted move.
pub fn plan_and_apply<F>(matches: &[MatchedPair], current_order: &[Rec], mut move_fn: F) -> Vec<MoveRecord>
where
    F: FnMut(&str, u32) -> Result<()>,
{
    let mut positions = PositionMap::from_order(current_order);
    let mut moves = Vec::new();

    for (idx, rec) in desired_order(matches).into_iter().enumerate() {
        let target = idx as u32 + 1;
        let Some(from) = positions.get(&rec.slot_id) else {
            warn!(slot_id = %rec.slot_id, "matched slot missing from current order");
            moves.push(MoveRecord {
                slot_id: rec.slot_id.clone(),
                label: rec.label.clone(),
                from: 0,
                to: target,
                outcome: MoveOutcome::Failed("slot not in candidate playlist".to_string()),
            });
            continue;
        };
        if from == target {
            continue;
        }

        let outcome = match move_fn(&rec.slot_id, target) {
            Ok(()) => {
                positions.apply_move(&rec.slot_id, target);
                MoveOutcome::Applied
            }
            Err(e) => {
                warn!(slot_id = %rec.slot_id, from, to = target, error = %e, "move failed");
                MoveOutcome::Failed(e.to_string())
            }
        };
        moves.push(MoveRecord {
            slot_id: rec.slot_id.clone(),
            label: rec.label.clone(),
            from,
            to: target,
            outcome,
        });
    }

    let applied = moves.iter().filter(|m| m.is_applied()).count();
    info!(applied, failed = moves.len() - applied, "reorder pass complete");
    moves
}

/// Check a fresh match against the playlist's order: the matched candidates,
/// taken in base order, must sit at positions `1..=N`. Returns the pairs that
/// do not.
pub fn verify_alignment(result: &MatchResult, cand_order: &[Rec]) -> Vec<Misalignment> {
    let positions = PositionMap::from_order(cand_order);
    desired_order(&result.matches)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, rec)| {
            let expected = idx as u32 + 1;
            let actual = positions.get(&rec.slot_id).unwrap_or(0);
            (actual != expected).then(|| Misalignment {
                label: rec.label.clone(),
                slot_id: rec.slot_id.clone(),
                expected,
                actual,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::matcher::match_records;
    use crate::matcher::test_support::rec;

    /// Base and candidate with the same titles; candidate order given by `cand_titles`.
    fn fixture(base_titles: &[&str], cand_titles: &[&str]) -> (Vec<Rec>, Vec<Rec>) {
        let base = base_titles
            .iter()
            .enumerate()
            .map(|(i, t)| rec(&format!("b{t}"), "a", t, None, i as u32 + 1))
            .collect();
        let cand = cand_titles
            .iter()
            .enumerate()
            .map(|(i, t)| rec(&format!("c{t}"), "a", t, None, i as u32 + 1))
            .collect();
        (base, cand)
    }

    /// Simulated store: a list of slot ids, moved the way the database does.
    fn simulate(order: &mut Vec<String>, slot_id: &str, to: u32) {
        let from = order.iter().position(|s| s == slot_id).unwrap();
        let sid = order.remove(from);
        order.insert(to as usize - 1, sid);
    }

    fn reorder_recs(cand: &[Rec], order: &[String]) -> Vec<Rec> {
        order
            .iter()
            .enumerate()
            .map(|(i, sid)| {
                let mut r = cand.iter().find(|r| &r.slot_id == sid).unwrap().clone();
                r.track_no = i as u32 + 1;
                r
            })
            .collect()
    }

    #[test]
    fn test_ripple_backward() {
        let (_, cand) = fixture(&[], &["1", "2", "3", "4", "5"]);
        let mut positions = PositionMap::from_order(&cand);
        positions.apply_move("s-c5", 2);
        assert_eq!(positions.get("s-c5"), Some(2));
        assert_eq!(positions.get("s-c2"), Some(3));
        assert_eq!(positions.get("s-c3"), Some(4));
        assert_eq!(positions.get("s-c4"), Some(5));
        assert_eq!(positions.get("s-c1"), Some(1));
    }

    #[test]
    fn test_ripple_forward() {
        let (_, cand) = fixture(&[], &["1", "2", "3", "4", "5"]);
        let mut positions = PositionMap::from_order(&cand);
        positions.apply_move("s-c1", 4);
        assert_eq!(positions.get("s-c1"), Some(4));
        assert_eq!(positions.get("s-c2"), Some(1));
        assert_eq!(positions.get("s-c4"), Some(3));
        assert_eq!(positions.get("s-c5"), Some(5));
    }

    #[test]
    fn test_reorder_reaches_base_order() {
        let (base, cand) = fixture(&["1", "2", "3", "4"], &["3", "1", "4", "2"]);
        let result = match_records(&base, &cand, true);
        let mut store: Vec<String> = cand.iter().map(|r| r.slot_id.clone()).collect();

        let moves = plan_and_apply(&result.matches, &cand, |sid, to| {
            simulate(&mut store, sid, to);
            Ok(())
        });

        assert!(moves.iter().all(|m| m.is_applied()));
        assert_eq!(store, vec!["s-c1", "s-c2", "s-c3", "s-c4"]);

        let after = reorder_recs(&cand, &store);
        let rematch = match_records(&base, &after, true);
        assert!(verify_alignment(&rematch, &after).is_empty());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let (base, cand) = fixture(&["1", "2", "3"], &["2", "3", "1"]);
        let result = match_records(&base, &cand, true);
        let mut store: Vec<String> = cand.iter().map(|r| r.slot_id.clone()).collect();
        let first = plan_and_apply(&result.matches, &cand, |sid, to| {
            simulate(&mut store, sid, to);
            Ok(())
        });
        assert!(!first.is_empty());

        let after = reorder_recs(&cand, &store);
        let result = match_records(&base, &after, true);
        let second = plan_and_apply(&result.matches, &after, |_, _| {
            panic!("aligned playlist must not be moved")
        });
        assert!(second.is_empty());
    }

    #[test]
    fn test_extras_are_never_moved_and_end_up_last() {
        let (base, cand) = fixture(&["1", "2"], &["x", "2", "1"]);
        let result = match_records(&base, &cand, true);
        assert_eq!(result.extra.len(), 1);
        let mut store: Vec<String> = cand.iter().map(|r| r.slot_id.clone()).collect();
        let mut moved = Vec::new();

        plan_and_apply(&result.matches, &cand, |sid, to| {
            moved.push(sid.to_string());
            simulate(&mut store, sid, to);
            Ok(())
        });

        assert!(!moved.contains(&"s-cx".to_string()));
        assert_eq!(store, vec!["s-c1", "s-c2", "s-cx"]);
    }

    #[test]
    fn test_failed_move_leaves_positions_untouched() {
        // Candidate order 3,1,2: target 1 wants c1 (at 2), target 2 wants c2 (at 3)
        let (base, cand) = fixture(&["1", "2", "3"], &["3", "1", "2"]);
        let result = match_records(&base, &cand, true);
        let mut calls = Vec::new();

        let moves = plan_and_apply(&result.matches, &cand, |sid, to| {
            calls.push((sid.to_string(), to));
            if sid == "s-c1" {
                return Err(Error::LockConflict);
            }
            Ok(())
        });

        // c1 failed, so c2 is still believed at position 3 and is moved 3 → 2
        assert_eq!(moves[0].slot_id, "s-c1");
        assert!(!moves[0].is_applied());
        assert_eq!(moves[1].slot_id, "s-c2");
        assert_eq!(moves[1].from, 3);
        assert_eq!(moves[1].to, 2);
        assert!(moves[1].is_applied());
        assert_eq!(calls[0], ("s-c1".to_string(), 1));
        assert_eq!(calls[1], ("s-c2".to_string(), 2));
    }

    #[test]
    fn test_verify_reports_misalignment() {
        let (base, cand) = fixture(&["1", "2"], &["2", "1"]);
        let result = match_records(&base, &cand, true);
        let misaligned = verify_alignment(&result, &cand);
        assert_eq!(misaligned.len(), 2);
        assert_eq!(misaligned[0].slot_id, "s-c1");
        assert_eq!(misaligned[0].expected, 1);
        assert_eq!(misaligned[0].actual, 2);
    }

    #[test]
    fn test_stable_for_equal_base_track_numbers() {
        let pair = |id: &str| MatchedPair {
            base: rec(&format!("b{id}"), "a", id, None, 1),
            cand: rec(&format!("c{id}"), "a", id, None, 1),
            pass: crate::models::MatchPass::ArtistTitle,
        };
        let matches = vec![pair("y"), pair("x")];
        let order: Vec<&str> = desired_order(&matches)
            .iter()
            .map(|r| r.slot_id.as_str())
            .collect();
        assert_eq!(order, vec!["s-cy", "s-cx"]);
    }
}
