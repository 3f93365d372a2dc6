//! The per-worker search stack.
//!
//! One entry per height: position hash, static eval, the move played, the
//! killer and excluded moves, and the principal variation collected on the
//! way back up. The stack also carries the pre-search game history so
//! repetition scans see past positions.

use crate::board::cuckoo;
use crate::board::types::Move;
use crate::board::zobrist::Hash;
use crate::board::{Board, BoardHistory};

use super::{Depth, Score, MATE_SCORE, SAFE_DEPTH};

#[derive(Clone)]
pub struct StackEntry {
    pub hash: Hash,
    pub eval: Score,
    pub eval_feature_hash: u16,
    pub played: Move,
    pub killer: Move,
    pub excluded: Move,
    pub pv: Box<[Move; SAFE_DEPTH]>,
}

impl Default for StackEntry {
    fn default() -> Self {
        StackEntry {
            hash: 0,
            eval: 0,
            eval_feature_hash: 0,
            played: Move::null(),
            killer: Move::null(),
            excluded: Move::null(),
            pv: Box::new([Move::null(); SAFE_DEPTH]),
        }
    }
}

impl StackEntry {
    fn reset_for_search(&mut self) {
        self.hash = 0;
        self.eval = 0;
        self.eval_feature_hash = 0;
        self.played = Move::null();
        self.excluded = Move::null();
        self.pv.fill(Move::null());
        // Killers survive across iterations on purpose.
    }
}

pub struct SearchStack {
    selective_depth: Depth,
    past: BoardHistory,
    root: Board,
    future: Vec<StackEntry>,
}

impl SearchStack {
    #[must_use]
    pub fn new(past: BoardHistory, root: Board) -> Self {
        let mut future = Vec::with_capacity(SAFE_DEPTH);
        future.resize_with(SAFE_DEPTH, StackEntry::default);
        SearchStack {
            selective_depth: 0,
            past,
            root,
            future,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Board {
        &self.root
    }

    #[must_use]
    pub fn selective_depth(&self) -> Depth {
        self.selective_depth
    }

    pub fn update_selective_depth(&mut self, height: usize) {
        self.selective_depth = self.selective_depth.max(height as Depth);
    }

    /// Reset the in-search entries between aspiration iterations.
    pub fn clear_future(&mut self) {
        self.selective_depth = 0;
        for entry in &mut self.future {
            entry.reset_for_search();
        }
    }

    #[inline]
    #[must_use]
    pub fn at(&self, height: usize) -> &StackEntry {
        &self.future[height]
    }

    #[inline]
    pub fn at_mut(&mut self, height: usize) -> &mut StackEntry {
        &mut self.future[height]
    }

    #[must_use]
    pub fn loss_score(height: usize) -> Score {
        MATE_SCORE + height as Score
    }

    #[must_use]
    pub fn win_score(height: usize) -> Score {
        -MATE_SCORE - height as Score
    }

    #[must_use]
    pub fn reached_max_height(height: usize) -> bool {
        height >= SAFE_DEPTH - 1
    }

    /// The opponent's previous move.
    #[must_use]
    pub fn counter(&self, height: usize) -> Move {
        if height < 1 {
            Move::null()
        } else {
            self.future[height - 1].played
        }
    }

    /// Our move two plies ago.
    #[must_use]
    pub fn follow(&self, height: usize) -> Move {
        if height < 2 {
            Move::null()
        } else {
            self.future[height - 2].played
        }
    }

    #[must_use]
    pub fn killer(&self, height: usize) -> Move {
        self.future[height].killer
    }

    #[must_use]
    pub fn excluded(&self, height: usize) -> Move {
        self.future[height].excluded
    }

    #[must_use]
    pub fn has_excluded(&self, height: usize) -> bool {
        !self.future[height].excluded.is_null()
    }

    /// Null-move pruning needs two real moves on the stack; a null after a
    /// null would let zugzwang positions cancel out.
    #[must_use]
    pub fn nmp_valid(&self, height: usize) -> bool {
        !self.counter(height).is_null() && !self.follow(height).is_null()
    }

    #[must_use]
    pub fn improving(&self, height: usize) -> bool {
        height >= 2 && self.future[height - 2].eval < self.future[height].eval
    }

    /// Occurrences of `hash` among the stack below `height` plus the past
    /// game history.
    #[must_use]
    pub fn count(&self, height: usize, hash: Hash) -> usize {
        let in_stack = self.future[..height]
            .iter()
            .filter(|entry| entry.hash == hash)
            .count();
        in_stack + self.past.count(hash)
    }

    /// Scan for a reachable repetition: hashes at odd offsets (three, five,
    /// ...) behind the current node, bounded by the rule-50 window.
    #[must_use]
    pub fn upcoming_cycle_exists(&self, bd: &Board, height: usize) -> bool {
        let bound = bd.lat.half_clock.min(height + self.past.len());
        let hashes = (3..=bound).step_by(2).filter_map(|offset| {
            if offset <= height {
                Some(self.future[height - offset].hash)
            } else {
                self.past.nth_from_end(offset - height)
            }
        });
        cuckoo::upcoming_cycle_exists(bd, hashes)
    }

    /// Prepend `mv` to this height's PV, pulling up the child's line.
    pub fn prepend_to_pv(&mut self, height: usize, mv: Move) {
        let child: Vec<Move> = self.future[height + 1].pv[..SAFE_DEPTH - 1].to_vec();
        let entry = &mut self.future[height];
        entry.pv[0] = mv;
        entry.pv[1..].copy_from_slice(&child);
    }

    /// The root PV as UCI move names, validated against the board so a
    /// half-overwritten line is truncated instead of printed.
    #[must_use]
    pub fn pv_string(&self) -> String {
        let mut bd = self.root.clone();
        let mut result = String::new();
        for &mv in self.future[0].pv.iter() {
            if !bd
                .generate_moves(crate::board::movegen::GenMode::ALL)
                .has(mv)
            {
                break;
            }
            if !result.is_empty() {
                result.push(' ');
            }
            result.push_str(&mv.uci_name(bd.turn()));
            bd = bd.forward(mv);
        }
        result
    }

    /// The move we expect the opponent to answer with.
    #[must_use]
    pub fn ponder_move(&self) -> Move {
        self.future[0].pv[1]
    }
}
