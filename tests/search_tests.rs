//! End-to-end search behavior through the orchestrator.

use std::sync::Arc;

use basalt::board::movegen::GenMode;
use basalt::board::types::{Color, PieceType};
use basalt::board::{Board, BoardHistory};
use basalt::nnue::weights::Weights;
use basalt::search::orchestrator::WorkerOrchestrator;
use basalt::search::{score_to_centipawns, Depth};

fn search(fen: &str, depth: Depth, threads: usize) -> (i32, basalt::board::types::Move) {
    let mut orchestrator = WorkerOrchestrator::new(
        Arc::new(Weights::zeroed()),
        16,
        Arc::new(|_| {}),
        Arc::new(|_| {}),
    );
    orchestrator.resize(threads);

    let bd = Board::parse_fen(fen).unwrap();
    orchestrator.go(&BoardHistory::new(), &bd);
    orchestrator.block_until_depth(depth);

    let worker = orchestrator.primary_worker();
    (worker.score(), worker.best_move())
}

#[test]
fn startpos_depth_8_plays_a_main_line_opening() {
    let (score, best) = search(basalt::board::START_FEN, 8, 1);
    let name = best.uci_name(Color::White);
    let reasonable = ["d2d4", "e2e4", "g1f3", "c2c4", "b1c3", "e2e3", "d2d3"];
    assert!(
        reasonable.contains(&name.as_str()),
        "unexpected opening move {name}"
    );
    assert!(
        score_to_centipawns(score).abs() < 100,
        "startpos should be near balanced, got {score}"
    );
}

#[test]
fn kpk_endgame_presses_toward_promotion() {
    let fen = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1";
    let (score, best) = search(fen, 12, 1);

    assert!(
        score_to_centipawns(score) > 0,
        "the pawn-up side must be better, got {score}"
    );

    // The chosen move advances the pawn or brings the king forward.
    let bd = Board::parse_fen(fen).unwrap();
    assert!(bd.generate_moves(GenMode::ALL).has(best));
    assert!(
        best.to().rank() > best.from().rank(),
        "expected progress toward promotion, got {best}"
    );
}

#[test]
fn multithreaded_search_returns_a_legal_move() {
    let fen = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";
    let (_, best) = search(fen, 7, 4);
    let bd = Board::parse_fen(fen).unwrap();
    assert!(bd.generate_moves(GenMode::ALL).has(best));
}

#[test]
fn repeated_single_threaded_searches_are_identical() {
    let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    let (score_a, best_a) = search(fen, 7, 1);
    let (score_b, best_b) = search(fen, 7, 1);
    assert_eq!(score_a, score_b);
    assert_eq!(best_a, best_b);
}

#[test]
fn winning_material_is_taken() {
    // A queen hangs on d5.
    let fen = "4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1";
    let (score, best) = search(fen, 6, 1);
    assert_eq!(best.uci_name(Color::White), "d1d5");
    assert_eq!(best.captured(), PieceType::Queen);
    assert!(score_to_centipawns(score) > 200);
}
