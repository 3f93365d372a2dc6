//! Lazy per-ply evaluator nodes over the ring scratchpad.
//!
//! Each search ply owns one `2 * BASE_DIM` slice of the scratchpad and a
//! node state: `Clean` (slice materialized) or `Dirty` (slice contents are
//! described by the previous ply's slice plus one move). Materialization is
//! lazy and happens on first evaluation; a ply that is searched but never
//! statically evaluated never pays for its update.
//!
//! Castles force a full reset of both halves, which needs no parent slice
//! at all; the materialization walk therefore stops at the nearest clean
//! ancestor *or* the nearest castle, whichever comes first, so intermediate
//! slices that would only be overwritten are skipped.

use std::sync::Arc;

use crate::board::types::piece::ALL_PIECE_TYPES;
use crate::board::types::{ByColor, Color, Move, PieceType};
use crate::board::Board;

use super::evaluator;
use super::feature;
use super::reset_cache::FeatureResetCache;
use super::weights::Weights;
use super::{BASE_DIM, FT_DIM, SCRATCHPAD_DEPTH};

enum NodeState {
    Clean,
    /// `post` is the position after `mv` was played by `mover`.
    Dirty {
        post: Board,
        mover: Color,
        mv: Move,
    },
}

/// The per-worker evaluator arena: scratchpad, node states and the king
/// reset caches.
pub struct EvalStack {
    weights: Arc<Weights>,
    scratchpad: Box<[i16]>,
    states: Vec<NodeState>,
    reset_cache: ByColor<FeatureResetCache>,
}

impl EvalStack {
    #[must_use]
    pub fn new(weights: Arc<Weights>) -> Self {
        let mut states = Vec::with_capacity(SCRATCHPAD_DEPTH);
        states.resize_with(SCRATCHPAD_DEPTH, || NodeState::Clean);
        EvalStack {
            weights,
            scratchpad: vec![0; SCRATCHPAD_DEPTH * FT_DIM].into_boxed_slice(),
            states,
            reset_cache: ByColor {
                white: FeatureResetCache::new(),
                black: FeatureResetCache::new(),
            },
        }
    }

    pub fn set_weights(&mut self, weights: Arc<Weights>) {
        self.weights = weights;
    }

    #[must_use]
    pub fn weights(&self) -> &Arc<Weights> {
        &self.weights
    }

    /// Reset the king caches; called once per search.
    pub fn reinitialize(&mut self) {
        self.reset_cache.white.reinitialize(&self.weights);
        self.reset_cache.black.reinitialize(&self.weights);
    }

    /// The materialized slice for a height; valid after `materialize`.
    #[must_use]
    pub fn slice(&self, height: usize) -> &[i16] {
        let start = height * FT_DIM;
        &self.scratchpad[start..start + FT_DIM]
    }

    /// Install the root position: a full rebuild of both halves.
    pub fn set_root(&mut self, bd: &Board) {
        let slice = &mut self.scratchpad[..FT_DIM];
        for pov in [Color::White, Color::Black] {
            let half_start = pov.index() * BASE_DIM;
            let half = &mut slice[half_start..half_start + BASE_DIM];
            half.copy_from_slice(&self.weights.shared.b);
            let king = bd.king_sq(pov);
            for p in [Color::White, Color::Black] {
                for pt in ALL_PIECE_TYPES {
                    for sq in bd.man.us(p).plane(pt) {
                        self.weights
                            .shared
                            .insert_idx(feature::index(pov, p, king, pt, sq), half);
                    }
                }
            }
        }
        self.states[0] = NodeState::Clean;
    }

    /// Mark `height` as the dirty child of `height - 1` through `mv`.
    pub fn set_dirty(&mut self, height: usize, parent: &Board, mv: Move) {
        self.set_dirty_with(height, &parent.forward(mv), parent.turn(), mv);
    }

    /// Like `set_dirty` but reusing an already-computed successor board.
    pub fn set_dirty_with(&mut self, height: usize, post: &Board, mover: Color, mv: Move) {
        debug_assert!(height > 0 && height < SCRATCHPAD_DEPTH);
        self.states[height] = NodeState::Dirty {
            post: post.clone(),
            mover,
            mv,
        };
    }

    fn requires_full_reset(state: &NodeState) -> bool {
        match state {
            NodeState::Clean => false,
            NodeState::Dirty { mover, mv, .. } => mv.is_castle(*mover),
        }
    }

    /// Materialize the slice at `height`, walking down to the nearest
    /// ancestor that needs no further input.
    pub fn materialize(&mut self, height: usize) {
        if matches!(self.states[height], NodeState::Clean) {
            return;
        }
        let mut base = height;
        while base > 0
            && !matches!(self.states[base], NodeState::Clean)
            && !Self::requires_full_reset(&self.states[base])
        {
            base -= 1;
        }
        let first = if matches!(self.states[base], NodeState::Clean) {
            base + 1
        } else {
            base
        };
        for h in first..=height {
            self.apply(h);
        }
    }

    fn apply(&mut self, height: usize) {
        let state = std::mem::replace(&mut self.states[height], NodeState::Clean);
        let NodeState::Dirty { post, mover, mv } = state else {
            return;
        };
        let weights = Arc::clone(&self.weights);
        let start = height * FT_DIM;

        if mv.is_null() {
            // A null move changes no features; the child aliases its parent.
            let (parent, current) = Self::split_slices(&mut self.scratchpad, height);
            current.copy_from_slice(parent);
        } else if mv.is_castle(mover) {
            // Full reset of both halves through the king caches.
            let (white_half, black_half) =
                (&mut self.scratchpad[start..start + FT_DIM]).split_at_mut(BASE_DIM);
            self.reset_cache
                .white
                .refresh_half_into(&weights, &post, Color::White, white_half);
            self.reset_cache
                .black
                .refresh_half_into(&weights, &post, Color::Black, black_half);
        } else if mv.piece() == PieceType::King {
            // Mover's half resets from its king cache; the opponent's half
            // takes an ordinary delta.
            {
                let (parent, current) = Self::split_slices(&mut self.scratchpad, height);
                Self::half_move_delta(&weights, &post, mover.other(), mover, mv, parent, current);
            }
            let half_start = start + mover.index() * BASE_DIM;
            self.reset_cache.us_mut(mover).refresh_half_into(
                &weights,
                &post,
                mover,
                &mut self.scratchpad[half_start..half_start + BASE_DIM],
            );
        } else {
            let (parent, current) = Self::split_slices(&mut self.scratchpad, height);
            Self::half_move_delta(&weights, &post, Color::White, mover, mv, parent, current);
            Self::half_move_delta(&weights, &post, Color::Black, mover, mv, parent, current);
        }
    }

    /// Split borrows of the parent (read) and current (write) slices.
    fn split_slices(scratchpad: &mut [i16], height: usize) -> (&[i16], &mut [i16]) {
        let start = height * FT_DIM;
        let (left, right) = scratchpad.split_at_mut(start);
        (&left[start - FT_DIM..], &mut right[..FT_DIM])
    }

    /// Apply one move's delta to `pov`'s half: a fused add/sub over the
    /// whole half vector.
    fn half_move_delta(
        weights: &Weights,
        post: &Board,
        pov: Color,
        mover: Color,
        mv: Move,
        parent: &[i16],
        current: &mut [i16],
    ) {
        let half_start = pov.index() * BASE_DIM;
        let src = &parent[half_start..half_start + BASE_DIM];
        let dst = &mut current[half_start..half_start + BASE_DIM];

        // The pov king did not move on this path, so the post-move board
        // carries the right king square.
        let our_king = post.king_sq(pov);

        let erase_0 = feature::index(pov, mover, our_king, mv.piece(), mv.from());
        let on_to = if mv.is_promotion_for(mover) {
            mv.promoted()
        } else {
            mv.piece()
        };
        let insert = feature::index(pov, mover, our_king, on_to, mv.to());

        if mv.is_capture() {
            let erase_1 = feature::index(pov, mover.other(), our_king, mv.captured(), mv.to());
            weights
                .shared
                .insert_erase_erase_idx(insert, erase_0, erase_1, src, dst);
        } else if mv.is_enpassant() {
            let erase_1 = feature::index(
                pov,
                mover.other(),
                our_king,
                PieceType::Pawn,
                mv.enpassant_sq(),
            );
            weights
                .shared
                .insert_erase_erase_idx(insert, erase_0, erase_1, src, dst);
        } else {
            weights.shared.insert_erase_idx(insert, erase_0, src, dst);
        }
    }

    /// Materialize and evaluate the slice at `height` for the position
    /// `bd`. Returns the eval-feature quarter hash and the score.
    #[must_use]
    pub fn evaluate(&mut self, height: usize, bd: &Board) -> (u16, i32) {
        self.materialize(height);
        evaluator::evaluate(&self.weights, self.slice(height), bd.turn(), bd.phase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::movegen::GenMode;

    fn find_move(bd: &Board, name: &str) -> Move {
        bd.generate_moves(GenMode::ALL)
            .iter()
            .copied()
            .find(|m| m.uci_name(bd.turn()) == name)
            .unwrap_or_else(|| panic!("move {name} not found"))
    }

    #[test]
    fn test_incremental_matches_full_reset() {
        let weights = Arc::new(Weights::pseudo_random(99));
        let mut stack = EvalStack::new(Arc::clone(&weights));
        stack.reinitialize();
        let mut fresh = EvalStack::new(Arc::clone(&weights));

        let fens = [
            crate::board::START_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2",
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        ];
        for fen in fens {
            let bd = Board::parse_fen(fen).unwrap();
            stack.set_root(&bd);
            for mv in &bd.generate_moves(GenMode::ALL) {
                stack.set_dirty(1, &bd, *mv);
                stack.materialize(1);

                fresh.set_root(&bd.forward(*mv));
                assert_eq!(stack.slice(1), fresh.slice(0), "fen: {fen} mv: {mv}");
            }
        }
    }

    #[test]
    fn test_lazy_chain_materialization() {
        let weights = Arc::new(Weights::pseudo_random(99));
        let mut stack = EvalStack::new(Arc::clone(&weights));
        stack.reinitialize();

        let bd = Board::start_pos();
        stack.set_root(&bd);

        // Three plies marked dirty, only the deepest one materialized.
        let mut current = bd;
        for (height, name) in ["e2e4", "e7e5", "g1f3"].iter().enumerate() {
            let mv = find_move(&current, name);
            stack.set_dirty(height + 1, &current, mv);
            current = current.forward(mv);
        }
        stack.materialize(3);

        let mut fresh = EvalStack::new(Arc::clone(&weights));
        fresh.set_root(&current);
        assert_eq!(stack.slice(3), fresh.slice(0));
    }

    #[test]
    fn test_castle_resets_without_parent_materialization() {
        let weights = Arc::new(Weights::pseudo_random(99));
        let mut stack = EvalStack::new(Arc::clone(&weights));
        stack.reinitialize();

        let bd = Board::parse_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        stack.set_root(&bd);

        // Ply 1 stays dirty below the castle at ply 2; the castle's full
        // reset must not require ply 1 to be materialized first.
        let quiet = find_move(&bd, "a2a3");
        stack.set_dirty(1, &bd, quiet);
        let after_quiet = bd.forward(quiet);
        let reply = find_move(&after_quiet, "a7a6");
        stack.set_dirty(2, &after_quiet, reply);
        let after_reply = after_quiet.forward(reply);
        let castle = find_move(&after_reply, "e1g1");
        stack.set_dirty(3, &after_reply, castle);

        stack.materialize(3);

        let mut fresh = EvalStack::new(Arc::clone(&weights));
        fresh.set_root(&after_reply.forward(castle));
        assert_eq!(stack.slice(3), fresh.slice(0));
    }

    #[test]
    fn test_king_move_partial_reset() {
        let weights = Arc::new(Weights::pseudo_random(99));
        let mut stack = EvalStack::new(Arc::clone(&weights));
        stack.reinitialize();

        let bd = Board::parse_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        stack.set_root(&bd);
        let king_move = find_move(&bd, "e1d1");
        stack.set_dirty(1, &bd, king_move);
        stack.materialize(1);

        let mut fresh = EvalStack::new(Arc::clone(&weights));
        fresh.set_root(&bd.forward(king_move));
        assert_eq!(stack.slice(1), fresh.slice(0));
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let weights = Arc::new(Weights::pseudo_random(99));
        let mut stack = EvalStack::new(Arc::clone(&weights));
        stack.reinitialize();
        let bd = Board::start_pos();
        stack.set_root(&bd);
        let first = stack.evaluate(0, &bd);
        let second = stack.evaluate(0, &bd);
        assert_eq!(first, second);
    }
}
