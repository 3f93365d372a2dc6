//! Fixed-position throughput bench.
//!
//! Searches a small FEN suite to a fixed depth and reports per-position
//! node counts plus an aggregate nodes-per-second figure. The node total is
//! deterministic in single-threaded mode, which makes it a cheap
//! search-behavior checksum between changes.

use std::sync::Arc;
use std::time::Instant;

use crate::board::{Board, BoardHistory};
use crate::nnue::weights::Weights;
use crate::search::orchestrator::WorkerOrchestrator;
use crate::search::Depth;

pub const BENCH_DEPTH: Depth = 9;

pub const BENCH_FENS: [&str; 8] = [
    crate::board::START_FEN,
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
    "6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1",
];

/// Run the bench and return the total node count.
pub fn run(depth: Depth) -> u64 {
    let orchestrator = WorkerOrchestrator::new(
        Arc::new(Weights::zeroed()),
        16,
        Arc::new(|_| {}),
        Arc::new(|_| {}),
    );

    let start = Instant::now();
    let mut total_nodes = 0u64;
    for (idx, fen) in BENCH_FENS.iter().enumerate() {
        let bd = Board::parse_fen(fen).expect("bench FEN is valid");
        orchestrator.reset();
        orchestrator.go(&BoardHistory::new(), &bd);
        orchestrator.block_until_depth(depth);

        let nodes = orchestrator.nodes();
        let best = orchestrator.primary_worker().best_move();
        total_nodes += nodes;
        println!(
            "position {:>2}: nodes {:>10} best {}",
            idx + 1,
            nodes,
            best.uci_name(bd.turn())
        );
    }

    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    let nps = (total_nodes as f64 / elapsed) as u64;
    println!("bench: {total_nodes} nodes {nps} nps");
    total_nodes
}
