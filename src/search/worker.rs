//! The search worker: static evaluation plumbing, quiescence, the main
//! PVS routine and the aspiration-window iterative-deepening driver.
//!
//! One worker owns all of its mutable state (stack, evaluator arena,
//! histories, caches) behind a mutex its search thread holds for the whole
//! search; the shared world (weights, transposition table, constants,
//! tablebases) is read through `Arc`s. Control flows through relaxed
//! atomics so the orchestrator and UCI thread can observe progress without
//! touching the search state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::board::movegen::GenMode;
use crate::board::types::{ByColor, Color, Move, MoveList};
use crate::board::zobrist::{self, Hash};
use crate::board::{Board, BoardHistory};
use crate::eval;
use crate::nnue::eval_node::EvalStack;
use crate::nnue::weights::Weights;

use super::constants::SearchConstants;
use super::correction::CorrectionHistory;
use super::eval_cache::{EvalCache, EvalCacheEntry};
use super::history_tables::{HistoryContext, HistoryHeuristic};
use super::orderer::{MoveOrderer, OrdererData};
use super::stack::SearchStack;
use super::syzygy::{SyzygyOracle, Wdl};
use super::tt::{TableEntry, TranspositionTable};
use super::{
    Bound, Depth, Score, ASPIRATION_DELTA, BIG_NUMBER, DRAW_SCORE, MAX_DEPTH, MAX_MATE_SCORE,
    NODES_PER_UPDATE,
};

/// Snapshot handed to the iteration callback.
#[derive(Clone, Debug)]
pub struct IterationReport {
    pub depth: Depth,
    pub selective_depth: Depth,
    pub score: Score,
    pub nodes: u64,
    pub tb_hits: u64,
    pub best_move: Move,
    pub ponder_move: Move,
    pub pv: String,
}

pub type OnIter = Arc<dyn Fn(&IterationReport) + Send + Sync>;
pub type OnUpdate = Arc<dyn Fn(u64) + Send + Sync>;

/// Shared, read-only context.
pub struct ExternalState {
    pub weights: Arc<Weights>,
    pub tt: Arc<TranspositionTable>,
    pub constants: Arc<SearchConstants>,
    pub tb: Arc<dyn SyzygyOracle>,
    pub on_iter: OnIter,
    pub on_update: OnUpdate,
}

/// Per-worker mutable search state.
pub struct InternalState {
    pub stack: SearchStack,
    pub eval_stack: EvalStack,
    pub cache: EvalCache,
    pub hh: ByColor<HistoryHeuristic>,
    pub correction: ByColor<CorrectionHistory>,
    pub node_distribution: HashMap<Move, u64>,
}

struct WorkerCounters {
    go: AtomicBool,
    nodes: AtomicU64,
    tb_hits: AtomicU64,
    depth: AtomicI32,
    score: AtomicI32,
    best_move: AtomicU32,
    ponder_move: AtomicU32,
}

struct EvaluateInfo {
    feature_hash: Hash,
    static_value: Score,
    value: Score,
}

pub struct SearchWorker {
    pub external: ExternalState,
    pub internal: Mutex<InternalState>,
    counters: WorkerCounters,
}

impl SearchWorker {
    #[must_use]
    pub fn new(external: ExternalState) -> Self {
        let internal = InternalState {
            stack: SearchStack::new(BoardHistory::new(), Board::start_pos()),
            eval_stack: EvalStack::new(Arc::clone(&external.weights)),
            cache: EvalCache::new(),
            hh: ByColor {
                white: HistoryHeuristic::new(),
                black: HistoryHeuristic::new(),
            },
            correction: ByColor {
                white: CorrectionHistory::new(),
                black: CorrectionHistory::new(),
            },
            node_distribution: HashMap::new(),
        };
        SearchWorker {
            external,
            internal: Mutex::new(internal),
            counters: WorkerCounters {
                go: AtomicBool::new(false),
                nodes: AtomicU64::new(0),
                tb_hits: AtomicU64::new(0),
                depth: AtomicI32::new(0),
                score: AtomicI32::new(0),
                best_move: AtomicU32::new(0),
                ponder_move: AtomicU32::new(0),
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn keep_going(&self) -> bool {
        self.counters.go.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn nodes(&self) -> u64 {
        self.counters.nodes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn tb_hits(&self) -> u64 {
        self.counters.tb_hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn depth(&self) -> Depth {
        self.counters.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn score(&self) -> Score {
        self.counters.score.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn best_move(&self) -> Move {
        Move::from_data(self.counters.best_move.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn ponder_move(&self) -> Move {
        Move::from_data(self.counters.ponder_move.load(Ordering::Relaxed))
    }

    /// Arm the worker for a new search from `bd` with the given history.
    pub fn go(&self, past: &BoardHistory, bd: &Board, start_depth: Depth) {
        let mut int = self.internal.lock();
        self.counters.go.store(true, Ordering::Relaxed);
        int.node_distribution.clear();
        self.counters.nodes.store(0, Ordering::Relaxed);
        self.counters.tb_hits.store(0, Ordering::Relaxed);
        self.counters.depth.store(start_depth, Ordering::Relaxed);
        let fallback = bd
            .generate_moves(GenMode::ALL)
            .as_slice()
            .first()
            .copied()
            .unwrap_or(Move::null());
        self.counters.best_move.store(fallback.data(), Ordering::Relaxed);
        self.counters.ponder_move.store(0, Ordering::Relaxed);
        int.stack = SearchStack::new(past.clone(), bd.clone());
    }

    pub fn stop(&self) {
        self.counters.go.store(false, Ordering::Relaxed);
    }

    /// Clear everything that persists across searches.
    pub fn reset(&self) {
        let mut int = self.internal.lock();
        int.stack = SearchStack::new(BoardHistory::new(), Board::start_pos());
        int.hh.white.clear();
        int.hh.black.clear();
        int.cache.clear();
        int.correction.white.clear();
        int.correction.black.clear();
        int.node_distribution.clear();
        self.counters.go.store(false, Ordering::Relaxed);
        self.counters.nodes.store(0, Ordering::Relaxed);
        self.counters.tb_hits.store(0, Ordering::Relaxed);
        self.counters.depth.store(0, Ordering::Relaxed);
        self.counters.score.store(0, Ordering::Relaxed);
        self.counters.best_move.store(0, Ordering::Relaxed);
        self.counters.ponder_move.store(0, Ordering::Relaxed);
    }

    #[inline]
    fn one_of(&self, period: u64) -> bool {
        let pattern = period - 1;
        self.counters.nodes.load(Ordering::Relaxed) & pattern == pattern
    }

    /// Static evaluation with caching, correction history and TT-score
    /// tightening.
    fn evaluate(
        &self,
        int: &mut InternalState,
        height: usize,
        bd: &Board,
        maybe: Option<TableEntry>,
        is_pv: bool,
        use_tt: bool,
    ) -> EvaluateInfo {
        let is_check = bd.is_check();

        let entry = if is_check {
            EvalCacheEntry::make(0, 0, SearchStack::loss_score(height))
        } else if let Some(cached) = (!is_pv).then(|| int.cache.find(bd.hash())).flatten() {
            cached
        } else {
            let (feature_hash, score) = if self.external.weights.is_loaded() {
                int.eval_stack.evaluate(height, bd)
            } else {
                (0, eval::classical(bd))
            };
            EvalCacheEntry::make(bd.hash(), feature_hash, score)
        };

        let counter_hash = zobrist::COUNTER_MOVE_HASHER.compute_hash(int.stack.counter(height));
        let follow_hash = zobrist::FOLLOW_MOVE_HASHER.compute_hash(int.stack.follow(height));
        let cont_feature = zobrist::lower_quarter(counter_hash ^ follow_hash);
        let pawn_feature = zobrist::lower_quarter(bd.pawn_hash());
        let feature_hash =
            zobrist::composite_feature_hash(cont_feature, pawn_feature, entry.feature_hash());

        let mut static_value = entry.eval();
        if !is_check {
            int.cache.insert(bd.hash(), entry);
            static_value += int.correction.us(bd.turn()).correction_for(feature_hash);
        }

        let mut value = static_value;
        if use_tt {
            if let Some(tt) = maybe {
                if tt.bound() == Bound::Upper && static_value > tt.score() {
                    value = tt.score();
                }
                if tt.bound() == Bound::Lower && static_value < tt.score() {
                    value = tt.score();
                }
            }
        }

        let entry_mut = int.stack.at_mut(height);
        entry_mut.eval = static_value;
        entry_mut.eval_feature_hash = entry.feature_hash();
        EvaluateInfo {
            feature_hash,
            static_value,
            value,
        }
    }

    /// Quiescence: noisy-and-check moves only, with stand-pat, SEE
    /// skipping, delta pruning and the good-capture beta cut.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    fn q_search(
        &self,
        int: &mut InternalState,
        height: usize,
        bd: &Board,
        mut alpha: Score,
        beta: Score,
        elevation: Depth,
        is_pv: bool,
        use_tt: bool,
    ) -> Score {
        let constants = Arc::clone(&self.external.constants);
        if self.keep_going() && self.one_of(NODES_PER_UPDATE) {
            (self.external.on_update)(self.nodes());
        }
        self.counters.nodes.fetch_add(1, Ordering::Relaxed);
        int.stack.update_selective_depth(height);

        let is_check = bd.is_check();
        if bd.is_trivially_drawn() {
            return DRAW_SCORE;
        }
        if int.stack.upcoming_cycle_exists(bd, height) {
            if DRAW_SCORE >= beta {
                return DRAW_SCORE;
            }
            alpha = alpha.max(DRAW_SCORE);
        }

        let maybe = self.external.tt.find(bd.hash());
        if let Some(entry) = maybe {
            let is_cutoff = match entry.bound() {
                Bound::Lower => entry.score() >= beta,
                Bound::Exact => true,
                Bound::Upper => entry.score() <= alpha,
            };
            if use_tt && is_cutoff {
                return entry.score();
            }
        }

        let info = self.evaluate(int, height, bd, maybe, is_pv, use_tt);
        let value = info.value;

        if !is_check && value >= beta {
            return value;
        }
        if SearchStack::reached_max_height(height) {
            return value;
        }

        let context = HistoryContext {
            follow: Move::null(),
            counter: Move::null(),
            threatened: crate::board::types::SquareSet::EMPTY,
            pawn_hash: 0,
            eval_feature_hash: 0,
        };
        let mut data = OrdererData::new(context);
        if let Some(entry) = maybe {
            data = data.set_first(entry.best_move());
        }
        let mut orderer = MoveOrderer::new(GenMode::NOISY_AND_CHECK, data);

        alpha = alpha.max(value);
        let mut best_score = value;
        let mut best_move = Move::null();

        int.stack.at_mut(height).hash = bd.hash();
        let mut legal_count = 0usize;
        loop {
            let next = orderer.next(bd, int.hh.us(bd.turn()));
            let Some((_, mv)) = next else { break };
            legal_count += 1;
            if !self.keep_going() {
                break;
            }

            if !is_check && !bd.see_ge(mv, 0) {
                break;
            }

            let delta_prune = !is_pv
                && !is_check
                && !bd.see_gt(mv, 0)
                && value + constants.delta_margin() < alpha;
            if delta_prune {
                break;
            }

            let good_capture_prune = !is_pv
                && !is_check
                && maybe.is_none()
                && bd.see_ge(mv, constants.good_capture_prune_see_margin())
                && value + constants.good_capture_prune_score_margin() > beta;
            if good_capture_prune {
                return beta;
            }

            int.stack.at_mut(height).played = mv;
            let bd_next = bd.forward(mv);
            int.eval_stack.set_dirty_with(height + 1, &bd_next, bd.turn(), mv);

            let score = -self.q_search(
                int,
                height + 1,
                &bd_next,
                -beta,
                -alpha,
                elevation + 1,
                is_pv,
                use_tt,
            );

            if score > best_score {
                best_score = score;
                best_move = mv;
                if score > alpha {
                    if score < beta {
                        alpha = score;
                    }
                    if is_pv {
                        int.stack.prepend_to_pv(height, mv);
                    }
                }
            }
            if best_score >= beta {
                break;
            }
        }

        if legal_count == 0 && is_check {
            return SearchStack::loss_score(height);
        }
        if legal_count == 0 {
            return value;
        }

        if use_tt && self.keep_going() {
            let bound = if best_score >= beta {
                Bound::Lower
            } else {
                Bound::Upper
            };
            self.external
                .tt
                .insert(TableEntry::new(bd.hash(), bound, best_score, best_move, 0, false));
        }

        best_score
    }

    /// Principal variation search. Returns the score and, at the root, the
    /// best move.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    fn pv_search(
        &self,
        int: &mut InternalState,
        height: usize,
        bd: &Board,
        mut alpha: Score,
        beta: Score,
        mut depth: Depth,
        reducer: Option<Color>,
        is_pv: bool,
        is_root: bool,
    ) -> (Score, Move) {
        debug_assert!(!is_root || is_pv);
        let constants = Arc::clone(&self.external.constants);

        // Callback on entering the node.
        if self.keep_going() && (is_root || self.one_of(NODES_PER_UPDATE)) {
            (self.external.on_update)(self.nodes());
        }

        // Step 1: drop into quiescence at horizon.
        if depth <= 0 {
            let score = self.q_search(int, height, bd, alpha, beta, 0, is_pv, true);
            return (score, Move::null());
        }
        self.counters.nodes.fetch_add(1, Ordering::Relaxed);
        int.stack.update_selective_depth(height);

        // Step 2: terminal draws and reachable repetitions.
        let is_check = bd.is_check();
        if !is_root && bd.is_trivially_drawn() {
            return (DRAW_SCORE, Move::null());
        }
        if !is_root
            && bd.is_rule50_draw()
            && (!is_check || !bd.generate_moves(GenMode::ALL).is_empty())
        {
            return (DRAW_SCORE, Move::null());
        }
        if !is_root && int.stack.upcoming_cycle_exists(bd, height) {
            // At least a draw is reachable; only claim it inside the window.
            if DRAW_SCORE >= beta {
                return (DRAW_SCORE, Move::null());
            }
            alpha = alpha.max(DRAW_SCORE);
        }

        if is_root {
            if let Some(dtz) = self.external.tb.probe_dtz(bd) {
                return (dtz.score, dtz.best_move);
            }
        }

        // Step 3: transposition table probe.
        let maybe = if int.stack.has_excluded(height) {
            None
        } else {
            self.external.tt.find(bd.hash())
        };
        if let Some(entry) = maybe {
            let is_cutoff = !is_pv
                && entry.depth() >= depth
                && match entry.bound() {
                    Bound::Lower => entry.score() >= beta,
                    Bound::Exact => true,
                    Bound::Upper => entry.score() <= alpha,
                };
            if is_cutoff {
                return (entry.score(), entry.best_move());
            }
        }
        let original_alpha = alpha;
        let tt_pv = is_pv || maybe.is_some_and(|entry| entry.tt_pv());

        if !is_root {
            if let Some(wdl) = self.external.tb.probe_wdl(bd) {
                self.counters.tb_hits.fetch_add(1, Ordering::Relaxed);
                return match wdl {
                    Wdl::Loss => (SearchStack::loss_score(height), Move::null()),
                    Wdl::Draw => (DRAW_SCORE, Move::null()),
                    Wdl::Win => (SearchStack::win_score(height), Move::null()),
                };
            }
        }

        // Step 4: internal iterative reductions.
        let should_iir =
            maybe.is_none() && !int.stack.has_excluded(height) && depth >= constants.iir_depth();
        if should_iir {
            depth -= 1;
        }

        // Step 5: static evaluation, TT-adjusted and correction-adjusted.
        let EvaluateInfo {
            feature_hash,
            static_value,
            value,
        } = self.evaluate(int, height, bd, maybe, is_pv, true);

        if SearchStack::reached_max_height(height) {
            return (value, Move::null());
        }

        // Step 6: record the node on the stack.
        int.stack.at_mut(height).hash = bd.hash();
        let improving = !is_check && int.stack.improving(height);
        let threatened = bd.them_threat_mask();

        // Step 7: razoring.
        let try_razor = !is_pv
            && !is_check
            && !int.stack.has_excluded(height)
            && depth <= constants.razor_depth()
            && value + constants.razor_margin(depth) <= alpha;
        if try_razor {
            let razor_score = self.q_search(int, height, bd, alpha, alpha + 1, 0, false, true);
            if razor_score <= alpha {
                return (razor_score, Move::null());
            }
        }

        // Step 8: static null move pruning.
        let snm_prune = !is_pv
            && !int.stack.has_excluded(height)
            && !is_check
            && depth <= constants.snmp_depth()
            && value > beta + constants.snmp_margin(improving, threatened.any(), depth)
            && value > SearchStack::loss_score(height);
        if snm_prune {
            return ((beta + value) / 2, Move::null());
        }

        // Step 9: null move pruning.
        let try_nmp = !is_pv
            && !int.stack.has_excluded(height)
            && !is_check
            && depth >= constants.nmp_depth()
            && value > beta
            && int.stack.nmp_valid(height)
            && bd.has_non_pawn_material()
            && (!threatened.any() || depth >= 4)
            && maybe.map_or(true, |entry| {
                entry.bound() == Bound::Lower
                    && bd.is_legal(GenMode::ALL, entry.best_move())
                    && !bd.see_gt(entry.best_move(), constants.nmp_see_threshold())
            });
        if try_nmp {
            int.stack.at_mut(height).played = Move::null();
            let adjusted_depth = Depth::max(0, depth - constants.nmp_reduction(depth, beta, value));
            let bd_null = bd.forward(Move::null());
            int.eval_stack
                .set_dirty_with(height + 1, &bd_null, bd.turn(), Move::null());
            let nmp_score = -self
                .pv_search(
                    int,
                    height + 1,
                    &bd_null,
                    -beta,
                    -beta + 1,
                    adjusted_depth,
                    Some(bd.turn().other()),
                    false,
                    false,
                )
                .0;
            if nmp_score >= beta {
                return (nmp_score, Move::null());
            }
        }

        // Step 10: ProbCut.
        let probcut_depth = constants.probcut_search_depth(depth);
        let probcut_beta = constants.probcut_beta(beta);
        let try_probcut = !is_pv
            && !int.stack.has_excluded(height)
            && depth >= constants.probcut_depth()
            && !maybe.is_some_and(|entry| entry.best_move().is_quiet())
            && !maybe.is_some_and(|entry| {
                entry.depth() >= probcut_depth && entry.score() < probcut_beta
            });
        if try_probcut {
            let context = HistoryContext {
                follow: Move::null(),
                counter: Move::null(),
                threatened,
                pawn_hash: 0,
                eval_feature_hash: 0,
            };
            let mut data = OrdererData::new(context);
            if let Some(entry) = maybe {
                data = data.set_first(entry.best_move());
            }
            let mut probcut_orderer = MoveOrderer::new(GenMode::NOISY_AND_CHECK, data);
            loop {
                let next = probcut_orderer.next(bd, int.hh.us(bd.turn()));
                let Some((_, mv)) = next else { break };
                if !self.keep_going() {
                    break;
                }
                if mv == int.stack.excluded(height) {
                    continue;
                }
                if !bd.see_ge(mv, 0) {
                    continue;
                }

                int.stack.at_mut(height).played = mv;
                let bd_next = bd.forward(mv);
                int.eval_stack.set_dirty_with(height + 1, &bd_next, bd.turn(), mv);

                let q_score = -self.q_search(
                    int,
                    height + 1,
                    &bd_next,
                    -probcut_beta,
                    -probcut_beta + 1,
                    0,
                    false,
                    true,
                );
                // Verify a passed scout with a reduced full search.
                let probcut_score = if q_score >= probcut_beta {
                    -self
                        .pv_search(
                            int,
                            height + 1,
                            &bd_next,
                            -probcut_beta,
                            -probcut_beta + 1,
                            probcut_depth,
                            reducer,
                            false,
                            false,
                        )
                        .0
                } else {
                    q_score
                };
                if probcut_score >= probcut_beta {
                    return (probcut_score, mv);
                }
            }
        }

        // Step 11: the move loop.
        let killer = int.stack.killer(height);
        let follow = int.stack.follow(height);
        let counter = int.stack.counter(height);
        let pawn_hash = bd.pawn_hash();
        let eval_feature_hash = int.stack.at(height).eval_feature_hash;
        let context = HistoryContext {
            follow,
            counter,
            threatened,
            pawn_hash,
            eval_feature_hash,
        };

        let mut data = OrdererData::new(context).set_killer(killer);
        if let Some(entry) = maybe {
            data = data.set_first(entry.best_move());
        }
        let mut orderer = MoveOrderer::new(GenMode::ALL, data);

        let mut moves_tried = MoveList::new();
        let mut best_score = SearchStack::loss_score(height);
        let mut best_move = Move::null();
        let mut did_double_extend = false;
        let mut legal_count = 0usize;

        loop {
            let next = orderer.next(bd, int.hh.us(bd.turn()));
            let Some((idx, mv)) = next else { break };
            legal_count += 1;
            if !self.keep_going() {
                break;
            }
            if mv == int.stack.excluded(height) {
                continue;
            }

            let nodes_before = self.nodes();
            let history_value = int.hh.us(bd.turn()).compute_value(&context, mv);
            let bd_next = bd.forward(mv);

            // Step 12: move-count, futility, SEE and history pruning.
            let try_pruning = !is_root && idx >= 2 && best_score > MAX_MATE_SCORE;
            if try_pruning {
                let lm_prune = !bd_next.is_check()
                    && depth <= constants.lmp_depth()
                    && idx > constants.lmp_count(improving, depth);
                if lm_prune {
                    break;
                }

                let futility_prune = mv.is_quiet()
                    && depth <= constants.futility_prune_depth()
                    && value + constants.futility_margin(depth) < alpha;
                if futility_prune {
                    continue;
                }

                let quiet_see_prune = mv.is_quiet()
                    && depth <= constants.quiet_see_prune_depth()
                    && !bd.see_ge(mv, constants.quiet_see_prune_threshold(depth));
                if quiet_see_prune {
                    continue;
                }

                let noisy_see_prune = mv.is_noisy()
                    && depth <= constants.noisy_see_prune_depth()
                    && !bd.see_ge(mv, constants.noisy_see_prune_threshold(depth));
                if noisy_see_prune {
                    continue;
                }

                let history_prune =
                    mv.is_quiet() && history_value <= constants.history_prune_threshold(depth);
                if history_prune {
                    continue;
                }
            }

            // Step 13: singular extension and multicut.
            let mut multicut = false;
            let extension: Depth = 'ext: {
                let try_singular = !is_root
                    && !int.stack.has_excluded(height)
                    && depth >= constants.singular_extension_depth()
                    && maybe.is_some_and(|entry| {
                        mv == entry.best_move()
                            && entry.bound() != Bound::Upper
                            && entry.depth() + constants.singular_extension_depth_margin() >= depth
                    });
                if try_singular {
                    let entry = maybe.expect("checked above");
                    let singular_depth = constants.singular_search_depth(depth);
                    let singular_beta = constants.singular_beta(entry.score(), depth);
                    int.stack.at_mut(height).excluded = mv;
                    let excluded_score = self
                        .pv_search(
                            int,
                            height,
                            bd,
                            singular_beta - 1,
                            singular_beta,
                            singular_depth,
                            reducer,
                            false,
                            false,
                        )
                        .0;
                    int.stack.at_mut(height).excluded = Move::null();

                    if !is_pv
                        && excluded_score + constants.singular_double_extension_margin()
                            < singular_beta
                    {
                        did_double_extend = true;
                        break 'ext 2;
                    }
                    if excluded_score < singular_beta {
                        break 'ext 1;
                    }
                    if excluded_score >= beta {
                        multicut = true;
                    }
                    if !is_pv {
                        break 'ext -1;
                    }
                }
                0
            };
            if !is_root && multicut {
                return (beta, Move::null());
            }

            int.stack.at_mut(height).played = mv;
            int.eval_stack.set_dirty_with(height + 1, &bd_next, bd.turn(), mv);

            // Step 14: principal variation search with late move reductions.
            let next_depth = depth + extension - 1;
            let score = if is_pv && idx == 0 {
                -self
                    .pv_search(int, height + 1, &bd_next, -beta, -alpha, next_depth, reducer, is_pv, false)
                    .0
            } else {
                let try_lmr = !is_check
                    && (mv.is_quiet() || !bd.see_ge(mv, 0))
                    && idx >= 2
                    && depth >= constants.reduce_depth();

                let mut lmr_depth = next_depth;
                let mut zw_score = 0;
                let mut searched = false;
                if try_lmr {
                    let mut reduction = constants.reduction(depth, idx);
                    if improving {
                        reduction -= 1;
                    }
                    if bd_next.is_check() {
                        reduction -= 1;
                    }
                    if bd.creates_threat(mv) {
                        reduction -= 1;
                    }
                    if mv == killer {
                        reduction -= 1;
                    }
                    if !tt_pv {
                        reduction += 1;
                    }
                    if did_double_extend {
                        reduction += 1;
                    }
                    // An errant fail low on the reducing player's side only
                    // costs a re-search.
                    if reducer == Some(bd.turn().other()) {
                        reduction += 1;
                    }
                    if mv.is_quiet() {
                        reduction += constants.history_reduction(history_value);
                    }
                    let reduction = reduction.max(0);
                    lmr_depth = Depth::max(1, next_depth - reduction);
                    let next_reducer = if is_pv || lmr_depth < next_depth {
                        Some(bd.turn())
                    } else {
                        reducer
                    };
                    zw_score = -self
                        .pv_search(
                            int,
                            height + 1,
                            &bd_next,
                            -alpha - 1,
                            -alpha,
                            lmr_depth,
                            next_reducer,
                            false,
                            false,
                        )
                        .0;
                    searched = true;
                }

                if !searched || (zw_score > alpha && lmr_depth < next_depth) {
                    let next_reducer = if is_pv { Some(bd.turn()) } else { reducer };
                    zw_score = -self
                        .pv_search(
                            int,
                            height + 1,
                            &bd_next,
                            -alpha - 1,
                            -alpha,
                            next_depth,
                            next_reducer,
                            false,
                            false,
                        )
                        .0;
                }

                if is_pv && alpha < zw_score && zw_score < beta {
                    -self
                        .pv_search(int, height + 1, &bd_next, -beta, -alpha, next_depth, reducer, is_pv, false)
                        .0
                } else {
                    zw_score
                }
            };

            if score < beta && (mv.is_quiet() || !bd.see_gt(mv, 0)) {
                moves_tried.push(mv);
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
                if score > alpha {
                    if score < beta {
                        alpha = score;
                    }
                    if is_pv {
                        int.stack.prepend_to_pv(height, mv);
                    }
                }
            }

            if is_root {
                let spent = self.nodes() - nodes_before;
                *int.node_distribution.entry(mv).or_insert(0) += spent;
            }

            if best_score >= beta {
                break;
            }
        }

        // Step 15: mate and stalemate.
        if legal_count == 0 {
            return if is_check {
                (SearchStack::loss_score(height), Move::null())
            } else {
                (DRAW_SCORE, Move::null())
            };
        }

        // Step 16: histories, correction, and the TT store.
        if self.keep_going() && !int.stack.has_excluded(height) {
            let bound = if best_score >= beta {
                Bound::Lower
            } else if is_pv && best_score > original_alpha {
                Bound::Exact
            } else {
                Bound::Upper
            };

            if bound == Bound::Lower && (best_move.is_quiet() || !bd.see_gt(best_move, 0)) {
                let turn = bd.turn();
                int.hh
                    .us_mut(turn)
                    .update(&context, best_move, &moves_tried, depth);
                int.stack.at_mut(height).killer = best_move;
            }

            if !is_check && best_move.is_quiet() {
                let error = best_score - static_value;
                int.correction
                    .us_mut(bd.turn())
                    .update(feature_hash, bound, error);
            }

            self.external.tt.insert(TableEntry::new(
                bd.hash(),
                bound,
                best_score,
                best_move,
                depth,
                tt_pv,
            ));
        }

        (best_score, best_move)
    }

    /// The aspiration-window iterative-deepening driver. Runs until the
    /// `go` flag clears or the depth limit is reached.
    pub fn iterative_deepening_loop(&self) {
        let mut int = self.internal.lock();
        let int = &mut *int;

        int.eval_stack.reinitialize();
        let root_bd = int.stack.root().clone();
        int.eval_stack.set_root(&root_bd);
        let constants = Arc::clone(&self.external.constants);

        let mut alpha = -BIG_NUMBER;
        let mut beta = BIG_NUMBER;
        while self.keep_going() {
            let depth = self.depth().min(MAX_DEPTH);
            self.counters.depth.store(depth, Ordering::Relaxed);

            // Narrow the window once the previous score is meaningful.
            if depth >= constants.aspiration_depth() {
                let previous = self.score();
                alpha = previous - ASPIRATION_DELTA;
                beta = previous + ASPIRATION_DELTA;
            }

            let mut delta = ASPIRATION_DELTA;
            let mut failed_high_count: Depth = 0;

            loop {
                int.stack.clear_future();
                let adjusted_depth = Depth::max(1, depth - failed_high_count);
                let (search_score, search_move) =
                    self.pv_search(int, 0, &root_bd, alpha, beta, adjusted_depth, None, true, true);

                if !self.keep_going() {
                    break;
                }

                if search_score <= alpha {
                    beta = (alpha + beta) / 2;
                    alpha = search_score - delta;
                    failed_high_count = 0;
                } else if search_score >= beta {
                    beta = search_score + delta;
                    failed_high_count += 1;
                } else {
                    self.counters.score.store(search_score, Ordering::Relaxed);
                    if !search_move.is_null() {
                        self.counters
                            .best_move
                            .store(search_move.data(), Ordering::Relaxed);
                        self.counters
                            .ponder_move
                            .store(int.stack.ponder_move().data(), Ordering::Relaxed);
                    }
                    break;
                }

                // Grow the window exponentially on repeated failures.
                delta += delta / 3;
            }

            if self.keep_going() {
                let report = IterationReport {
                    depth,
                    selective_depth: int.stack.selective_depth(),
                    score: self.score(),
                    nodes: self.nodes(),
                    tb_hits: self.tb_hits(),
                    best_move: self.best_move(),
                    ponder_move: self.ponder_move(),
                    pv: int.stack.pv_string(),
                };
                (self.external.on_iter)(&report);
            }

            if depth >= MAX_DEPTH {
                break;
            }
            self.counters.depth.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::syzygy::NullOracle;

    fn make_worker() -> SearchWorker {
        let external = ExternalState {
            weights: Arc::new(Weights::zeroed()),
            tt: Arc::new(TranspositionTable::new(8)),
            constants: Arc::new(SearchConstants::new(1)),
            tb: Arc::new(NullOracle),
            on_iter: Arc::new(|_| {}),
            on_update: Arc::new(|_| {}),
        };
        SearchWorker::new(external)
    }

    /// Drive the search loop on this thread to a fixed depth, full-window,
    /// the way a fixed-depth orchestrator would via callbacks.
    fn search_fen(worker: &SearchWorker, fen: &str, depth: Depth) -> (Score, Move) {
        let bd = Board::parse_fen(fen).unwrap();
        worker.go(&BoardHistory::new(), &bd, 1);
        {
            let mut int = worker.internal.lock();
            let int = &mut *int;
            int.eval_stack.reinitialize();
            let root = int.stack.root().clone();
            int.eval_stack.set_root(&root);
            for d in 1..=depth {
                int.stack.clear_future();
                let (score, mv) =
                    worker.pv_search(int, 0, &root, -BIG_NUMBER, BIG_NUMBER, d, None, true, true);
                worker.counters.score.store(score, Ordering::Relaxed);
                if !mv.is_null() {
                    worker.counters.best_move.store(mv.data(), Ordering::Relaxed);
                }
            }
        }
        worker.stop();
        (worker.score(), worker.best_move())
    }

    #[test]
    fn test_finds_mate_in_one() {
        let worker = make_worker();
        // Back-rank mate: Ra8#.
        let (score, mv) = search_fen(&worker, "6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1", 4);
        assert_eq!(mv.uci_name(Color::White), "a1a8");
        assert!(score > -MAX_MATE_SCORE - 100);
    }

    #[test]
    fn test_avoids_hanging_queen() {
        let fen = "rnb1kbnr/pppp1ppp/8/4p3/3PP2q/6P1/PPP2P1P/RNBQKBNR b KQkq - 0 3";
        let worker = make_worker();
        // The g3 pawn attacks the queen; any sane search saves it.
        let (score, mv) = search_fen(&worker, fen, 4);
        assert!(!mv.is_null());
        assert!(score > -2000, "queen should be savable, got {score}");
        let bd = Board::parse_fen(fen).unwrap();
        // The chosen move must not leave the queen en prise.
        if mv.from() == crate::board::types::Square::from_name("h4").unwrap() {
            assert!(bd.see_ge(mv, 0));
        }
    }

    #[test]
    fn test_draw_detection_insufficient_material() {
        let worker = make_worker();
        let (score, _) = search_fen(&worker, "4k3/8/8/8/8/8/8/3NK3 w - - 0 1", 6);
        assert_eq!(score, DRAW_SCORE);
    }

    #[test]
    fn test_single_worker_determinism() {
        let worker_a = make_worker();
        let worker_b = make_worker();
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let (score_a, move_a) = search_fen(&worker_a, fen, 5);
        let (score_b, move_b) = search_fen(&worker_b, fen, 5);
        assert_eq!(score_a, score_b);
        assert_eq!(move_a, move_b);
    }

    #[test]
    fn test_mate_score_encodes_distance() {
        let worker = make_worker();
        let (score, _) = search_fen(&worker, "6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1", 4);
        // Mate delivered at height one scores exactly the negated
        // mated-at-one value.
        assert_eq!(score, -(crate::search::MATE_SCORE + 1));
        assert!(crate::search::is_mate_score(score));
    }
}
