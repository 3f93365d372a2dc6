//! Combined history heuristic.
//!
//! A per-side additive sum of context tables, all updated by the gravity
//! formula `delta = gain * 32 - clamp(x, +-16384) * |gain| / 512` with
//! `gain = min(400, depth^2)` (negated for quiet moves that were tried and
//! failed). Tables are a few hundred kilobytes each and live on the heap.

use crate::board::types::{Move, MoveList, SquareSet};
use crate::board::zobrist::Hash;

use super::Depth;

pub type HistoryValue = i32;

const NUM_SQUARES: usize = 64;
const NUM_PIECES: usize = 6;
const NUM_THREAT_STATES: usize = 2;

const NUM_PAWN_STATES: usize = 512;
const PAWN_HASH_MASK: u64 = NUM_PAWN_STATES as u64 - 1;

const NUM_EVAL_FEATURE_STATES: usize = 512;
const EVAL_FEATURE_HASH_MASK: u16 = NUM_EVAL_FEATURE_STATES as u16 - 1;

const HISTORY_MULTIPLIER: HistoryValue = 32;
const HISTORY_DIVISOR: HistoryValue = 512;
const HISTORY_LIMIT: HistoryValue = 16_384;
const HISTORY_MAX_GAIN: HistoryValue = 400;

/// Ordering context at the node being searched.
#[derive(Clone, Copy)]
pub struct HistoryContext {
    /// Our move two plies ago.
    pub follow: Move,
    /// The opponent's previous move.
    pub counter: Move,
    /// Squares of our pieces attacked by cheaper enemy pieces.
    pub threatened: SquareSet,
    pub pawn_hash: Hash,
    pub eval_feature_hash: u16,
}

#[inline]
fn formula(x: HistoryValue, gain: HistoryValue) -> HistoryValue {
    let clamped = x.clamp(-HISTORY_LIMIT, HISTORY_LIMIT);
    gain * HISTORY_MULTIPLIER - clamped * gain.abs() / HISTORY_DIVISOR
}

/// One addressing scheme into a flat i16 table.
trait HistoryInfo {
    const N: usize;
    fn is_applicable(ctx: &HistoryContext, mv: Move) -> bool;
    fn compute_index(ctx: &HistoryContext, mv: Move) -> usize;
}

/// `[is-threatened][from][to]`, quiet moves.
struct ThreatInfo;

impl HistoryInfo for ThreatInfo {
    const N: usize = NUM_THREAT_STATES * NUM_SQUARES * NUM_SQUARES;

    fn is_applicable(_ctx: &HistoryContext, mv: Move) -> bool {
        mv.is_quiet()
    }

    fn compute_index(ctx: &HistoryContext, mv: Move) -> usize {
        let t = usize::from(ctx.threatened.is_member(mv.from()));
        t * NUM_SQUARES * NUM_SQUARES + mv.from().index() * NUM_SQUARES + mv.to().index()
    }
}

/// `[pawn-hash-bucket][piece][to]`, quiet moves.
struct PawnStructureInfo;

impl HistoryInfo for PawnStructureInfo {
    const N: usize = NUM_PAWN_STATES * NUM_PIECES * NUM_SQUARES;

    fn is_applicable(ctx: &HistoryContext, mv: Move) -> bool {
        ctx.pawn_hash != 0 && mv.is_quiet()
    }

    fn compute_index(ctx: &HistoryContext, mv: Move) -> usize {
        let pawns = (ctx.pawn_hash & PAWN_HASH_MASK) as usize;
        pawns * NUM_PIECES * NUM_SQUARES + mv.piece().index() * NUM_SQUARES + mv.to().index()
    }
}

/// `[eval-feature-bucket][piece][to]`, quiet moves.
struct EvalFeatureInfo;

impl HistoryInfo for EvalFeatureInfo {
    const N: usize = NUM_EVAL_FEATURE_STATES * NUM_PIECES * NUM_SQUARES;

    fn is_applicable(ctx: &HistoryContext, mv: Move) -> bool {
        ctx.eval_feature_hash != 0 && mv.is_quiet()
    }

    fn compute_index(ctx: &HistoryContext, mv: Move) -> usize {
        let features = (ctx.eval_feature_hash & EVAL_FEATURE_HASH_MASK) as usize;
        features * NUM_PIECES * NUM_SQUARES + mv.piece().index() * NUM_SQUARES + mv.to().index()
    }
}

/// `[prev-piece][prev-to][piece][to]` keyed by the opponent's last move.
struct CounterInfo;

impl HistoryInfo for CounterInfo {
    const N: usize = NUM_PIECES * NUM_SQUARES * NUM_PIECES * NUM_SQUARES;

    fn is_applicable(ctx: &HistoryContext, mv: Move) -> bool {
        !ctx.counter.is_null() && mv.is_quiet()
    }

    fn compute_index(ctx: &HistoryContext, mv: Move) -> usize {
        let p0 = ctx.counter.piece().index();
        let to0 = ctx.counter.to().index();
        let p1 = mv.piece().index();
        let to1 = mv.to().index();
        ((p0 * NUM_SQUARES + to0) * NUM_PIECES + p1) * NUM_SQUARES + to1
    }
}

/// Same shape as `CounterInfo`, keyed by our move two plies ago.
struct FollowInfo;

impl HistoryInfo for FollowInfo {
    const N: usize = NUM_PIECES * NUM_SQUARES * NUM_PIECES * NUM_SQUARES;

    fn is_applicable(ctx: &HistoryContext, mv: Move) -> bool {
        !ctx.follow.is_null() && mv.is_quiet()
    }

    fn compute_index(ctx: &HistoryContext, mv: Move) -> usize {
        let p0 = ctx.follow.piece().index();
        let to0 = ctx.follow.to().index();
        let p1 = mv.piece().index();
        let to1 = mv.to().index();
        ((p0 * NUM_SQUARES + to0) * NUM_PIECES + p1) * NUM_SQUARES + to1
    }
}

/// `[piece][to][captured]`, captures.
struct CaptureInfo;

impl HistoryInfo for CaptureInfo {
    const N: usize = NUM_PIECES * NUM_SQUARES * NUM_PIECES;

    fn is_applicable(_ctx: &HistoryContext, mv: Move) -> bool {
        mv.is_capture()
    }

    fn compute_index(_ctx: &HistoryContext, mv: Move) -> usize {
        (mv.piece().index() * NUM_SQUARES + mv.to().index()) * NUM_PIECES + mv.captured().index()
    }
}

struct Table<T> {
    data: Box<[i16]>,
    _info: std::marker::PhantomData<T>,
}

impl<T: HistoryInfo> Table<T> {
    fn new() -> Self {
        Table {
            data: vec![0; T::N].into_boxed_slice(),
            _info: std::marker::PhantomData,
        }
    }

    #[inline]
    fn value(&self, ctx: &HistoryContext, mv: Move) -> HistoryValue {
        if T::is_applicable(ctx, mv) {
            HistoryValue::from(self.data[T::compute_index(ctx, mv)])
        } else {
            0
        }
    }

    #[inline]
    fn bump(&mut self, ctx: &HistoryContext, mv: Move, delta: HistoryValue) {
        if T::is_applicable(ctx, mv) {
            let cell = &mut self.data[T::compute_index(ctx, mv)];
            let updated = delta + HistoryValue::from(*cell);
            *cell = updated.clamp(i16::MIN.into(), i16::MAX.into()) as i16;
        }
    }

    fn clear(&mut self) {
        self.data.fill(0);
    }
}

/// The combined per-side history.
pub struct HistoryHeuristic {
    threat: Table<ThreatInfo>,
    pawn: Table<PawnStructureInfo>,
    eval_feature: Table<EvalFeatureInfo>,
    counter: Table<CounterInfo>,
    follow: Table<FollowInfo>,
    capture: Table<CaptureInfo>,
}

impl HistoryHeuristic {
    #[must_use]
    pub fn new() -> Self {
        HistoryHeuristic {
            threat: Table::new(),
            pawn: Table::new(),
            eval_feature: Table::new(),
            counter: Table::new(),
            follow: Table::new(),
            capture: Table::new(),
        }
    }

    /// Sum of every applicable table's value for the move.
    #[must_use]
    pub fn compute_value(&self, ctx: &HistoryContext, mv: Move) -> HistoryValue {
        self.threat.value(ctx, mv)
            + self.pawn.value(ctx, mv)
            + self.eval_feature.value(ctx, mv)
            + self.counter.value(ctx, mv)
            + self.follow.value(ctx, mv)
            + self.capture.value(ctx, mv)
    }

    fn single_update(&mut self, ctx: &HistoryContext, mv: Move, gain: HistoryValue) {
        let delta = formula(self.compute_value(ctx, mv), gain);
        self.threat.bump(ctx, mv, delta);
        self.pawn.bump(ctx, mv, delta);
        self.eval_feature.bump(ctx, mv, delta);
        self.counter.bump(ctx, mv, delta);
        self.follow.bump(ctx, mv, delta);
        self.capture.bump(ctx, mv, delta);
    }

    /// Reward the cutoff move and penalize the moves tried before it.
    pub fn update(&mut self, ctx: &HistoryContext, best_move: Move, tried: &MoveList, depth: Depth) {
        let gain = HistoryValue::min(HISTORY_MAX_GAIN, depth * depth);
        for &mv in tried {
            if mv != best_move {
                self.single_update(ctx, mv, -gain);
            }
        }
        self.single_update(ctx, best_move, gain);
    }

    pub fn clear(&mut self) {
        self.threat.clear();
        self.pawn.clear();
        self.eval_feature.clear();
        self.counter.clear();
        self.follow.clear();
        self.capture.clear();
    }
}

impl Default for HistoryHeuristic {
    fn default() -> Self {
        HistoryHeuristic::new()
    }
}
