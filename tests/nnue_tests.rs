//! NNUE incremental-update consistency over played-out lines.

use std::sync::Arc;

use basalt::board::movegen::GenMode;
use basalt::board::Board;
use basalt::nnue::eval_node::EvalStack;
use basalt::nnue::weights::Weights;

/// Every legal move's incremental delta must equal a from-scratch rebuild
/// of the successor position, per element.
#[test]
fn incremental_delta_matches_full_reset_along_a_game() {
    let weights = Arc::new(Weights::pseudo_random(0xB1A5));
    let mut stack = EvalStack::new(Arc::clone(&weights));
    stack.reinitialize();
    let mut fresh = EvalStack::new(Arc::clone(&weights));

    // A line that includes a capture, a castle, king moves and a promotion
    // race would be ideal; this walk greedily prefers special moves.
    let mut bd =
        Board::parse_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();

    for _ in 0..24 {
        stack.set_root(&bd);
        let moves = bd.generate_moves(GenMode::ALL);
        if moves.is_empty() {
            break;
        }
        for mv in &moves {
            stack.set_dirty(1, &bd, *mv);
            stack.materialize(1);
            fresh.set_root(&bd.forward(*mv));
            assert_eq!(stack.slice(1), fresh.slice(0), "mv: {mv}");
        }

        // Prefer castles, then king moves, then captures, to exercise the
        // reset paths; otherwise take the first move.
        let next = moves
            .iter()
            .copied()
            .find(|m| m.is_castle(bd.turn()))
            .or_else(|| moves.iter().copied().find(|m| m.is_king_move()))
            .or_else(|| moves.iter().copied().find(|m| m.is_capture()))
            .unwrap_or(moves.as_slice()[0]);
        bd = bd.forward(next);
    }
}

#[test]
fn evaluation_is_symmetric_under_mirroring() {
    let weights = Arc::new(Weights::pseudo_random(0xB1A5));
    let mut stack = EvalStack::new(Arc::clone(&weights));
    stack.reinitialize();

    let bd = Board::parse_fen("r2qk2r/ppp2ppp/2n2n2/3pp3/3PP3/2N2N2/PPP2PPP/R2QK2R w KQkq - 0 1")
        .unwrap();
    stack.set_root(&bd);
    let (_, score) = stack.evaluate(0, &bd);

    // The mirrored position seen by the other side must evaluate equal:
    // the HalfKA mirror makes the network color-blind.
    let mirrored = bd.mirrored();
    let mut mirror_stack = EvalStack::new(Arc::clone(&weights));
    mirror_stack.reinitialize();
    mirror_stack.set_root(&mirrored);
    let (_, mirror_score) = mirror_stack.evaluate(0, &mirrored);

    assert_eq!(score, mirror_score);
}
