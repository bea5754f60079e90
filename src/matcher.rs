//! Multi-pass matching of base records against candidate records.
//!
//! Passes run in a fixed order and each only sees records left unmatched by
//! the previous ones:
//!
//! 1. `artist_key|title_key`
//! 2. `filename_key` (records without one take no part)
//! 3. `title_key` alone, when title fallback is enabled (empty titles take no part)
//!
//! Within a pass, candidates sharing a key sit in a bucket that is used as a
//! LIFO stack: the candidate inserted last (right-most in candidate order) is
//! handed to the first base record asking for that key.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::models::{MatchPass, MatchResult, MatchedPair, Rec};

type KeyFn = fn(&Rec) -> Option<String>;

fn artist_title_key(r: &Rec) -> Option<String> {
    Some(r.identity_key())
}

fn filename_key(r: &Rec) -> Option<String> {
    r.filename_key.clone().filter(|k| !k.is_empty())
}

fn title_key(r: &Rec) -> Option<String> {
    Some(r.title_key.clone()).filter(|k| !k.is_empty())
}

/// Key function for each pass.
fn pass_key(pass: MatchPass) -> KeyFn {
    match pass {
        MatchPass::ArtistTitle => artist_title_key,
        MatchPass::FilenameStem => filename_key,
        MatchPass::TitleOnly => title_key,
    }
}

struct MatchState {
    used_base: Vec<bool>,
    used_cand: Vec<bool>,
    pairs: Vec<(usize, usize, MatchPass)>,
}

impl MatchState {
    fn new(nb: usize, nc: usize) -> Self {
        Self {
            used_base: vec![false; nb],
            used_cand: vec![false; nc],
            pairs: Vec::new(),
        }
    }

    /// Bucket the still-unmatched candidates by key, in candidate order.
    fn index_candidates(&self, cand: &[Rec], key: KeyFn) -> FxHashMap<String, Vec<usize>> {
        let mut buckets: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (j, rec) in cand.iter().enumerate() {
            if self.used_cand[j] {
                continue;
            }
            if let Some(k) = key(rec) {
                buckets.entry(k).or_default().push(j);
            }
        }
        buckets
    }

    fn run_pass(&mut self, base: &[Rec], cand: &[Rec], pass: MatchPass) -> usize {
        let key = pass_key(pass);
        let mut buckets = self.index_candidates(cand, key);
        let before = self.pairs.len();

        for (i, rec) in base.iter().enumerate() {
            if self.used_base[i] {
                continue;
            }
            let Some(k) = key(rec) else {
                continue;
            };
            if let Some(j) = buckets.get_mut(&k).and_then(Vec::pop) {
                self.used_base[i] = true;
                self.used_cand[j] = true;
                self.pairs.push((i, j, pass));
            }
        }

        let matched = self.pairs.len() - before;
        debug!(?pass, matched, "match pass complete");
        matched
    }
}

/// Match `base` against `cand`. Total: never fails, including on empty input.
pub fn match_records(base: &[Rec], cand: &[Rec], title_fallback: bool) -> MatchResult {
    let mut state = MatchState::new(base.len(), cand.len());

    state.run_pass(base, cand, MatchPass::ArtistTitle);
    state.run_pass(base, cand, MatchPass::FilenameStem);
    if title_fallback {
        state.run_pass(base, cand, MatchPass::TitleOnly);
    }

    let matches = state
        .pairs
        .iter()
        .map(|&(i, j, pass)| MatchedPair {
            base: base[i].clone(),
            cand: cand[j].clone(),
            pass,
        })
        .collect();
    let missing = base
        .iter()
        .zip(&state.used_base)
        .filter(|(_, used)| !**used)
        .map(|(r, _)| r.clone())
        .collect();
    let extra = cand
        .iter()
        .zip(&state.used_cand)
        .filter(|(_, used)| !**used)
        .map(|(r, _)| r.clone())
        .collect();

    MatchResult {
        matches,
        missing,
        extra,
    }
}
