//! Tunable search constants.
//!
//! Margins and thresholds live here rather than at their call sites so a
//! retune touches one file. The late-move-reduction table is filled at
//! construction from the usual log-product formula.

use crate::board::see::SeeValue;

use super::{Bound, Depth, Score};

const LMR_TBL_DIM: usize = 64;

/// All depth thresholds, margins and reduction schedules used by the
/// search, shared read-only between workers.
pub struct SearchConstants {
    thread_count: usize,
    lmr_tbl: [Depth; LMR_TBL_DIM * LMR_TBL_DIM],
}

impl SearchConstants {
    #[must_use]
    pub fn new(thread_count: usize) -> Self {
        let mut constants = SearchConstants {
            thread_count,
            lmr_tbl: [0; LMR_TBL_DIM * LMR_TBL_DIM],
        };
        constants.update(thread_count);
        constants
    }

    pub fn update(&mut self, thread_count: usize) {
        self.thread_count = thread_count;
        for depth in 1..LMR_TBL_DIM {
            for played in 1..LMR_TBL_DIM {
                self.lmr_tbl[depth * LMR_TBL_DIM + played] =
                    (0.75 + (depth as f64).ln() * (played as f64).ln() / 2.25) as Depth;
            }
        }
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    #[must_use]
    pub fn reduce_depth(&self) -> Depth {
        3
    }

    #[must_use]
    pub fn aspiration_depth(&self) -> Depth {
        4
    }

    #[must_use]
    pub fn nmp_depth(&self) -> Depth {
        2
    }

    #[must_use]
    pub fn lmp_depth(&self) -> Depth {
        7
    }

    #[must_use]
    pub fn snmp_depth(&self) -> Depth {
        7
    }

    #[must_use]
    pub fn razor_depth(&self) -> Depth {
        3
    }

    #[must_use]
    pub fn futility_prune_depth(&self) -> Depth {
        6
    }

    #[must_use]
    pub fn quiet_see_prune_depth(&self) -> Depth {
        8
    }

    #[must_use]
    pub fn noisy_see_prune_depth(&self) -> Depth {
        6
    }

    #[must_use]
    pub fn singular_extension_depth(&self) -> Depth {
        6
    }

    #[must_use]
    pub fn probcut_depth(&self) -> Depth {
        5
    }

    #[must_use]
    pub fn iir_depth(&self) -> Depth {
        4
    }

    #[must_use]
    pub fn reduction(&self, depth: Depth, move_idx: usize) -> Depth {
        let last = LMR_TBL_DIM - 1;
        let d = (depth as usize).min(last);
        let i = move_idx.min(last);
        self.lmr_tbl[d * LMR_TBL_DIM + i]
    }

    #[must_use]
    pub fn nmp_reduction(&self, depth: Depth, beta: Score, value: Score) -> Depth {
        4 + depth / 6 + Depth::min(3, (value - beta) / 256)
    }

    #[must_use]
    pub fn nmp_see_threshold(&self) -> SeeValue {
        200
    }

    #[must_use]
    pub fn singular_extension_depth_margin(&self) -> Depth {
        3
    }

    #[must_use]
    pub fn singular_search_depth(&self, depth: Depth) -> Depth {
        depth / 2 - 1
    }

    #[must_use]
    pub fn singular_beta(&self, tt_score: Score, depth: Depth) -> Score {
        tt_score - 2 * depth
    }

    #[must_use]
    pub fn singular_double_extension_margin(&self) -> Score {
        160
    }

    #[must_use]
    pub fn futility_margin(&self, depth: Depth) -> Score {
        1536 * depth
    }

    #[must_use]
    pub fn razor_margin(&self, depth: Depth) -> Score {
        2048 * depth
    }

    #[must_use]
    pub fn snmp_margin(&self, improving: bool, threats: bool, depth: Depth) -> Score {
        let m = 288;
        let b = 128;
        m * (depth - Depth::from(improving && !threats)) + if threats { b } else { 0 }
    }

    #[must_use]
    pub fn lmp_count(&self, improving: bool, depth: Depth) -> usize {
        const IMPROVING: [usize; 8] = [0, 5, 8, 12, 20, 30, 42, 65];
        const WORSENING: [usize; 8] = [0, 3, 4, 8, 10, 13, 21, 31];
        let d = (depth as usize).min(7);
        if improving {
            IMPROVING[d]
        } else {
            WORSENING[d]
        }
    }

    #[must_use]
    pub fn quiet_see_prune_threshold(&self, depth: Depth) -> SeeValue {
        -50 * depth
    }

    #[must_use]
    pub fn noisy_see_prune_threshold(&self, depth: Depth) -> SeeValue {
        -100 * depth
    }

    #[must_use]
    pub fn history_prune_threshold(&self, depth: Depth) -> i32 {
        -1024 * depth * depth
    }

    #[must_use]
    pub fn history_reduction(&self, history_value: i32) -> Depth {
        let limit = 2;
        (-(history_value / 5000)).clamp(-limit, limit)
    }

    #[must_use]
    pub fn delta_margin(&self) -> Score {
        512
    }

    #[must_use]
    pub fn good_capture_prune_see_margin(&self) -> SeeValue {
        300
    }

    #[must_use]
    pub fn good_capture_prune_score_margin(&self) -> Score {
        256
    }

    #[must_use]
    pub fn probcut_search_depth(&self, depth: Depth) -> Depth {
        depth - 3
    }

    #[must_use]
    pub fn probcut_beta(&self, beta: Score) -> Score {
        beta + 320
    }

    /// Margin the null-move heuristic allows the TT entry to contradict by.
    #[must_use]
    pub fn nmp_tt_margin(&self, bound: Bound, tt_move_gains: bool) -> Score {
        match bound {
            Bound::Upper => {
                if tt_move_gains {
                    3072
                } else {
                    128
                }
            }
            Bound::Exact => {
                if tt_move_gains {
                    640
                } else {
                    -256
                }
            }
            Bound::Lower => {
                if tt_move_gains {
                    640
                } else {
                    -65536
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lmr_table_monotone() {
        let constants = SearchConstants::new(1);
        assert_eq!(constants.reduction(1, 1), 0);
        // Reductions grow with both depth and move index.
        assert!(constants.reduction(20, 20) >= constants.reduction(5, 5));
        assert!(constants.reduction(63, 63) >= constants.reduction(20, 20));
        // Out-of-range indices clamp.
        assert_eq!(constants.reduction(200, 500), constants.reduction(63, 63));
    }

    #[test]
    fn test_lmr_formula_spot_values() {
        let constants = SearchConstants::new(1);
        let expected = |d: f64, i: f64| (0.75 + d.ln() * i.ln() / 2.25) as Depth;
        assert_eq!(constants.reduction(8, 12), expected(8.0, 12.0));
        assert_eq!(constants.reduction(32, 4), expected(32.0, 4.0));
    }

    #[test]
    fn test_nmp_reduction_scales() {
        let constants = SearchConstants::new(1);
        assert_eq!(constants.nmp_reduction(6, 0, 0), 5);
        assert_eq!(constants.nmp_reduction(6, 0, 10_000), 5 + 3);
    }

    #[test]
    fn test_lmp_counts_improving_wider() {
        let constants = SearchConstants::new(1);
        for depth in 1..8 {
            assert!(constants.lmp_count(true, depth) >= constants.lmp_count(false, depth));
        }
    }
}
