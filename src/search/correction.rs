//! Eval correction history.
//!
//! A per-side table mapping a composite feature hash (continuation, pawn
//! structure and evaluator fingerprint) to a learned additive correction of
//! the static evaluation, trained online from search-versus-eval
//! discrepancies. The stored value is scaled by eight relative to the
//! applied correction and decays toward zero on every update.

use crate::board::zobrist::{upper_half, Hash};

use super::{Bound, Score};

const N: usize = 131_072;
const MASK: usize = N - 1;

const CORRECTION_DIVISOR: Score = 8;
const DELTA_LIMIT: Score = 192;
const SCORE_CORRECTION_LIMIT: Score = 256;
const RIDGE_COEFFICIENT: Score = 4;

#[derive(Clone, Copy, Default)]
struct CorrectionEntry {
    hash: u32,
    correction: i32,
}

pub struct CorrectionHistory {
    data: Box<[CorrectionEntry]>,
}

impl CorrectionHistory {
    #[must_use]
    pub fn new() -> Self {
        CorrectionHistory {
            data: vec![CorrectionEntry::default(); N].into_boxed_slice(),
        }
    }

    #[inline]
    fn slot(feature_hash: Hash) -> usize {
        feature_hash as usize & MASK
    }

    /// The correction to add to a static eval under this feature hash.
    #[must_use]
    pub fn correction_for(&self, feature_hash: Hash) -> Score {
        let entry = &self.data[Self::slot(feature_hash)];
        if entry.hash == upper_half(feature_hash) {
            entry.correction / CORRECTION_DIVISOR
        } else {
            0
        }
    }

    /// Update from the difference `delta = search_score - static_eval`.
    ///
    /// A fail-low (upper bound) only proves the true score is below the
    /// search result, so it may only pull the correction down; a fail-high
    /// only pushes it up. Exact scores move it either way.
    pub fn update(&mut self, feature_hash: Hash, bound: Bound, delta: Score) {
        match bound {
            Bound::Upper if delta >= 0 => return,
            Bound::Lower if delta <= 0 => return,
            _ => {}
        }

        let entry = &mut self.data[Self::slot(feature_hash)];
        if entry.hash != upper_half(feature_hash) {
            *entry = CorrectionEntry {
                hash: upper_half(feature_hash),
                correction: 0,
            };
        }

        entry.correction += delta.clamp(-DELTA_LIMIT, DELTA_LIMIT) - entry.correction / RIDGE_COEFFICIENT;
        entry.correction = entry
            .correction
            .clamp(-SCORE_CORRECTION_LIMIT, SCORE_CORRECTION_LIMIT);
    }

    pub fn clear(&mut self) {
        self.data.fill(CorrectionEntry::default());
    }
}

impl Default for CorrectionHistory {
    fn default() -> Self {
        CorrectionHistory::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moves_toward_search_result() {
        let mut table = CorrectionHistory::new();
        let hash = 0x1234_5678_9ABC_DEF0u64;
        assert_eq!(table.correction_for(hash), 0);

        // Search repeatedly exceeds eval: the correction grows positive.
        for _ in 0..8 {
            table.update(hash, Bound::Exact, 100);
        }
        assert!(table.correction_for(hash) > 0);
        assert!(table.correction_for(hash) <= SCORE_CORRECTION_LIMIT / CORRECTION_DIVISOR);
    }

    #[test]
    fn test_bound_gating() {
        let mut table = CorrectionHistory::new();
        let hash = 42u64;
        // A fail-low with a positive delta carries no information.
        table.update(hash, Bound::Upper, 100);
        assert_eq!(table.correction_for(hash), 0);
        // A fail-high with a positive delta does.
        table.update(hash, Bound::Lower, 100);
        assert!(table.correction_for(hash) > 0);
    }

    #[test]
    fn test_decay_bounds_accumulation() {
        let mut table = CorrectionHistory::new();
        let hash = 7u64;
        for _ in 0..1000 {
            table.update(hash, Bound::Exact, 10_000);
        }
        assert_eq!(
            table.correction_for(hash),
            SCORE_CORRECTION_LIMIT / CORRECTION_DIVISOR
        );
    }

    #[test]
    fn test_slot_collision_replaces() {
        let mut table = CorrectionHistory::new();
        let a = 0x1111_0000_0000_0001u64;
        let b = 0x2222_0000_0000_0001u64;
        table.update(a, Bound::Exact, 100);
        assert!(table.correction_for(a) != 0);
        table.update(b, Bound::Exact, -100);
        assert_eq!(table.correction_for(a), 0);
        assert!(table.correction_for(b) < 0);
    }
}
