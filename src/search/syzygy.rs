//! Endgame tablebase oracle interface.
//!
//! The search consumes two probes: win/draw/loss at interior nodes and a
//! distance-to-zeroing move at the root. Probing is optional and failures
//! are silent; without an installed oracle every probe misses and the
//! search proceeds normally.

use crate::board::types::Move;
use crate::board::Board;

use super::Score;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wdl {
    Loss,
    Draw,
    Win,
}

#[derive(Clone, Copy, Debug)]
pub struct DtzResult {
    pub best_move: Move,
    pub score: Score,
}

pub trait SyzygyOracle: Send + Sync {
    fn probe_wdl(&self, _bd: &Board) -> Option<Wdl> {
        None
    }

    fn probe_dtz(&self, _bd: &Board) -> Option<DtzResult> {
        None
    }
}

/// The default oracle: no tablebases installed.
pub struct NullOracle;

impl SyzygyOracle for NullOracle {}
