//! Lazy-SMP worker orchestration.
//!
//! All workers share the transposition table and search constants and
//! otherwise search independently; staggered start depths (1, 2, 1, 2, ...)
//! widen the pool's effective aspiration coverage. The primary worker (id
//! zero) carries the reporting callbacks and its best move is the one the
//! engine plays.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::board::{Board, BoardHistory};
use crate::nnue::weights::Weights;

use super::constants::SearchConstants;
use super::syzygy::{NullOracle, SyzygyOracle};
use super::tt::TranspositionTable;
use super::worker::{ExternalState, OnIter, OnUpdate, SearchWorker};
use super::Depth;

pub const PRIMARY_ID: usize = 0;

/// Worker thread stack size; the search recursion is deep and carries
/// move lists in its frames.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

pub struct WorkerOrchestrator {
    weights: Arc<Weights>,
    tt: Arc<TranspositionTable>,
    constants: Arc<SearchConstants>,
    tb: Arc<dyn SyzygyOracle>,
    on_iter: OnIter,
    on_update: OnUpdate,

    access: Mutex<()>,
    is_searching: AtomicBool,
    workers: Vec<Arc<SearchWorker>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerOrchestrator {
    /// Build with one worker and the given table size in MiB. Callbacks
    /// fire on the primary worker only.
    #[must_use]
    pub fn new(
        weights: Arc<Weights>,
        hash_size_mib: usize,
        on_iter: OnIter,
        on_update: OnUpdate,
    ) -> Self {
        let mut orchestrator = WorkerOrchestrator {
            weights,
            tt: Arc::new(TranspositionTable::new(hash_size_mib)),
            constants: Arc::new(SearchConstants::new(1)),
            tb: Arc::new(NullOracle),
            on_iter,
            on_update,
            access: Mutex::new(()),
            is_searching: AtomicBool::new(false),
            workers: Vec::new(),
            threads: Mutex::new(Vec::new()),
        };
        orchestrator.resize(1);
        orchestrator
    }

    fn make_worker(&self, id: usize) -> Arc<SearchWorker> {
        let (on_iter, on_update): (OnIter, OnUpdate) = if id == PRIMARY_ID {
            (Arc::clone(&self.on_iter), Arc::clone(&self.on_update))
        } else {
            (Arc::new(|_| {}), Arc::new(|_| {}))
        };
        Arc::new(SearchWorker::new(ExternalState {
            weights: Arc::clone(&self.weights),
            tt: Arc::clone(&self.tt),
            constants: Arc::clone(&self.constants),
            tb: Arc::clone(&self.tb),
            on_iter,
            on_update,
        }))
    }

    /// Change the worker count: drain the pool and rebuild.
    pub fn resize(&mut self, count: usize) {
        self.stop();
        let count = count.max(1);
        self.constants = Arc::new(SearchConstants::new(count));
        self.workers.clear();
        for id in 0..count {
            self.workers.push(self.make_worker(id));
        }
    }

    /// Install new network weights, rebuilding the workers around them.
    pub fn set_weights(&mut self, weights: Arc<Weights>) {
        self.stop();
        self.weights = weights;
        let count = self.workers.len().max(1);
        self.workers.clear();
        for id in 0..count {
            self.workers.push(self.make_worker(id));
        }
    }

    /// Install a tablebase oracle, rebuilding the workers around it.
    pub fn set_oracle(&mut self, tb: Arc<dyn SyzygyOracle>) {
        self.stop();
        self.tb = tb;
        let count = self.workers.len().max(1);
        self.workers.clear();
        for id in 0..count {
            self.workers.push(self.make_worker(id));
        }
    }

    /// Resize the shared transposition table (MiB), dropping its contents.
    pub fn resize_hash(&mut self, size_mib: usize) {
        self.stop();
        self.tt = Arc::new(TranspositionTable::new(size_mib));
        let count = self.workers.len().max(1);
        self.workers.clear();
        for id in 0..count {
            self.workers.push(self.make_worker(id));
        }
    }

    /// Launch a search from `bd` with the given game history.
    pub fn go(&self, history: &BoardHistory, bd: &Board) {
        let _guard = self.access.lock();
        self.stop_and_join();

        #[cfg(feature = "logging")]
        log::debug!(
            "go: {} workers, position {}",
            self.workers.len(),
            bd.fen()
        );

        self.tt.update_gen();
        for (id, worker) in self.workers.iter().enumerate() {
            // Alternating start depths widen half the pool by one ply.
            let start_depth = 1 + (id % 2) as Depth;
            worker.go(history, bd, start_depth);
        }

        let mut threads = self.threads.lock();
        for (id, worker) in self.workers.iter().enumerate() {
            let worker = Arc::clone(worker);
            let handle = std::thread::Builder::new()
                .name(format!("search-{id}"))
                .stack_size(SEARCH_STACK_SIZE)
                .spawn(move || {
                    worker.iterative_deepening_loop();
                })
                .expect("failed to spawn search worker");
            threads.push(handle);
        }
        self.is_searching.store(true, Ordering::Relaxed);
    }

    fn stop_and_join(&self) {
        for worker in &self.workers {
            worker.stop();
        }
        for handle in self.threads.lock().drain(..) {
            let _ = handle.join();
        }
        self.is_searching.store(false, Ordering::Relaxed);
    }

    /// Stop the running search and join the worker threads.
    pub fn stop(&self) {
        let _guard = self.access.lock();
        self.stop_and_join();
    }

    #[must_use]
    pub fn is_searching(&self) -> bool {
        self.is_searching.load(Ordering::Relaxed)
    }

    /// Clear the table and all per-worker state (a `ucinewgame`).
    pub fn reset(&self) {
        let _guard = self.access.lock();
        self.stop_and_join();
        self.tt.clear();
        for worker in &self.workers {
            worker.reset();
        }
    }

    #[must_use]
    pub fn nodes(&self) -> u64 {
        self.workers.iter().map(|w| w.nodes()).sum()
    }

    #[must_use]
    pub fn tb_hits(&self) -> u64 {
        self.workers.iter().map(|w| w.tb_hits()).sum()
    }

    #[must_use]
    pub fn primary_worker(&self) -> &Arc<SearchWorker> {
        &self.workers[PRIMARY_ID]
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Busy-wait (with short sleeps) until the primary worker finishes the
    /// target depth, then stop. Used by fixed-depth searches and tests;
    /// time-based stopping lives with the caller's clock.
    pub fn block_until_depth(&self, depth: Depth) {
        let primary = self.primary_worker();
        while primary.keep_going() && primary.depth() <= depth {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        self.stop();
    }
}

impl Drop for WorkerOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::Color;
    use crate::board::movegen::GenMode;

    fn make_orchestrator(threads: usize) -> WorkerOrchestrator {
        let mut orchestrator = WorkerOrchestrator::new(
            Arc::new(Weights::zeroed()),
            8,
            Arc::new(|_| {}),
            Arc::new(|_| {}),
        );
        orchestrator.resize(threads);
        orchestrator
    }

    #[test]
    fn test_single_thread_search_returns_legal_move() {
        let orchestrator = make_orchestrator(1);
        let bd = Board::start_pos();
        orchestrator.go(&BoardHistory::new(), &bd);
        orchestrator.block_until_depth(6);
        let best = orchestrator.primary_worker().best_move();
        assert!(bd.generate_moves(GenMode::ALL).has(best));
        assert!(orchestrator.nodes() > 0);
        assert!(!orchestrator.is_searching());
    }

    #[test]
    fn test_multi_thread_search_completes() {
        let orchestrator = make_orchestrator(3);
        assert_eq!(orchestrator.worker_count(), 3);
        let bd = Board::parse_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        orchestrator.go(&BoardHistory::new(), &bd);
        orchestrator.block_until_depth(5);
        let best = orchestrator.primary_worker().best_move();
        assert!(bd.generate_moves(GenMode::ALL).has(best));
    }

    #[test]
    fn test_stop_is_idempotent_and_restartable() {
        let orchestrator = make_orchestrator(2);
        let bd = Board::start_pos();
        orchestrator.go(&BoardHistory::new(), &bd);
        orchestrator.stop();
        orchestrator.stop();

        // A second search after a stop must work.
        orchestrator.go(&BoardHistory::new(), &bd);
        orchestrator.block_until_depth(3);
        let best = orchestrator.primary_worker().best_move();
        assert!(bd.generate_moves(GenMode::ALL).has(best));
    }

    #[test]
    fn test_reset_clears_counters() {
        let orchestrator = make_orchestrator(1);
        let bd = Board::start_pos();
        orchestrator.go(&BoardHistory::new(), &bd);
        orchestrator.block_until_depth(3);
        assert!(orchestrator.nodes() > 0);
        orchestrator.reset();
        assert_eq!(orchestrator.nodes(), 0);
    }

    #[test]
    fn test_opening_search_is_sane() {
        let orchestrator = make_orchestrator(1);
        let bd = Board::start_pos();
        orchestrator.go(&BoardHistory::new(), &bd);
        orchestrator.block_until_depth(8);
        let best = orchestrator.primary_worker().best_move();
        let score = orchestrator.primary_worker().score();

        let name = best.uci_name(Color::White);
        let reasonable = ["d2d4", "e2e4", "g1f3", "c2c4", "e2e3", "d2d3", "b1c3"];
        assert!(
            reasonable.contains(&name.as_str()),
            "unexpected opening move {name}"
        );
        // Centipawn-scaled score stays modest in the start position.
        assert!(crate::search::score_to_centipawns(score).abs() < 100);
    }
}
