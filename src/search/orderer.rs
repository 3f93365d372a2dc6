//! Staged lazy move ordering.
//!
//! Moves are produced in up to three stages:
//! 1. the transposition-table move, emitted before any generation,
//! 2. noisy-and-check moves, scored by MVV/LVA when their exchange wins
//!    material and by history otherwise,
//! 3. quiet moves, generated only once no winning noisy move remains,
//!    scored by the combined history.
//!
//! Extraction is selection-sort on a composed 64-bit key so the per-node
//! cost stays proportional to the number of moves actually searched.

use crate::board::movegen::GenMode;
use crate::board::types::Move;
use crate::board::Board;

use super::history_tables::{HistoryContext, HistoryHeuristic};

const VALUE_BITS: u64 = 32;
const KILLER_FLAG: u64 = 1 << VALUE_BITS;
const POSITIVE_NOISY_FLAG: u64 = 1 << (VALUE_BITS + 1);

#[inline]
fn make_positive(value: i32) -> u64 {
    (i64::from(value) - i64::from(i32::MIN)) as u64
}

#[derive(Clone, Copy)]
struct OrdererEntry {
    mv: Move,
    key: u64,
}

impl OrdererEntry {
    fn noisy(mv: Move, positive: bool, history_value: i32) -> Self {
        let value = if positive { mv.mvv_lva_key() } else { history_value };
        let mut key = make_positive(value);
        if positive {
            key |= POSITIVE_NOISY_FLAG;
        }
        OrdererEntry { mv, key }
    }

    fn quiet(mv: Move, killer: Move, history_value: i32) -> Self {
        let mut key = make_positive(history_value);
        if mv == killer {
            key |= KILLER_FLAG;
        }
        OrdererEntry { mv, key }
    }
}

enum Stage {
    First,
    NoisyAndCheck,
    Quiet,
    Done,
}

/// Ordering inputs gathered by the caller.
#[derive(Clone, Copy)]
pub struct OrdererData {
    pub first: Move,
    pub killer: Move,
    pub context: HistoryContext,
}

impl OrdererData {
    #[must_use]
    pub fn new(context: HistoryContext) -> Self {
        OrdererData {
            first: Move::null(),
            killer: Move::null(),
            context,
        }
    }

    #[must_use]
    pub fn set_first(mut self, mv: Move) -> Self {
        self.first = mv;
        self
    }

    #[must_use]
    pub fn set_killer(mut self, mv: Move) -> Self {
        self.killer = mv;
        self
    }
}

/// The staged orderer. `next` drives generation lazily; the caller passes
/// the board and its history tables on every pull.
pub struct MoveOrderer {
    data: OrdererData,
    mode: GenMode,
    stage: Stage,
    entries: Vec<OrdererEntry>,
    begin: usize,
    emitted: usize,
}

impl MoveOrderer {
    /// `mode` selects the move classes this orderer will ever emit; the
    /// quiet stage only exists when `mode.quiet` is set.
    #[must_use]
    pub fn new(mode: GenMode, data: OrdererData) -> Self {
        MoveOrderer {
            data,
            mode,
            stage: Stage::First,
            entries: Vec::with_capacity(64),
            begin: 0,
            emitted: 0,
        }
    }

    fn generate_noisy(&mut self, bd: &Board, hh: &HistoryHeuristic) {
        let mode = GenMode {
            noisy: self.mode.noisy,
            check: self.mode.check,
            quiet: false,
        };
        for &mv in &bd.generate_moves(mode) {
            if mv == self.data.first {
                continue;
            }
            let entry = if mv.is_noisy() {
                OrdererEntry::noisy(mv, bd.see_gt(mv, 0), hh.compute_value(&self.data.context, mv))
            } else {
                OrdererEntry::quiet(mv, self.data.killer, hh.compute_value(&self.data.context, mv))
            };
            self.entries.push(entry);
        }
    }

    fn generate_quiet(&mut self, bd: &Board, hh: &HistoryHeuristic) {
        let mode = GenMode {
            noisy: false,
            check: false,
            quiet: true,
        };
        for &mv in &bd.generate_moves(mode) {
            if mv == self.data.first {
                continue;
            }
            self.entries.push(OrdererEntry::quiet(
                mv,
                self.data.killer,
                hh.compute_value(&self.data.context, mv),
            ));
        }
    }

    /// Swap the best remaining entry to the front of the tail.
    fn select_best(&mut self) {
        let best_offset = self.entries[self.begin..]
            .iter()
            .enumerate()
            .max_by_key(|(_, entry)| entry.key)
            .map(|(offset, _)| offset);
        if let Some(offset) = best_offset {
            self.entries.swap(self.begin, self.begin + offset);
        }
    }

    #[must_use]
    fn best_key(&self) -> Option<u64> {
        self.entries[self.begin..].iter().map(|e| e.key).max()
    }

    /// Produce the next `(index, move)` pair, or `None` when exhausted.
    pub fn next(&mut self, bd: &Board, hh: &HistoryHeuristic) -> Option<(usize, Move)> {
        loop {
            match self.stage {
                Stage::First => {
                    self.stage = Stage::NoisyAndCheck;
                    if !self.data.first.is_null() && bd.is_legal(self.mode, self.data.first) {
                        let idx = self.emitted;
                        self.emitted += 1;
                        return Some((idx, self.data.first));
                    }
                }
                Stage::NoisyAndCheck => {
                    if self.entries.is_empty() && self.begin == 0 {
                        self.generate_noisy(bd, hh);
                    }
                    // Fold the quiets in as soon as no winning noisy move
                    // remains at the head.
                    let winning_left = self
                        .best_key()
                        .is_some_and(|key| key & POSITIVE_NOISY_FLAG != 0);
                    if self.mode.quiet && !winning_left {
                        self.stage = Stage::Quiet;
                        self.generate_quiet(bd, hh);
                        continue;
                    }
                    if self.begin >= self.entries.len() {
                        self.stage = Stage::Done;
                        continue;
                    }
                    self.select_best();
                    let mv = self.entries[self.begin].mv;
                    self.begin += 1;
                    let idx = self.emitted;
                    self.emitted += 1;
                    return Some((idx, mv));
                }
                Stage::Quiet => {
                    if self.begin >= self.entries.len() {
                        self.stage = Stage::Done;
                        continue;
                    }
                    self.select_best();
                    let mv = self.entries[self.begin].mv;
                    self.begin += 1;
                    let idx = self.emitted;
                    self.emitted += 1;
                    return Some((idx, mv));
                }
                Stage::Done => return None,
            }
        }
    }
}
