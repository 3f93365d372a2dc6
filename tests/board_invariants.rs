//! Property tests over randomly played-out games.

use basalt::board::movegen::GenMode;
use basalt::board::types::Move;
use basalt::board::Board;
use proptest::prelude::*;

/// Walk a pseudo-random legal game of up to `plies` moves, driven by the
/// proptest-provided index stream.
fn random_walk(choices: &[usize], plies: usize) -> Vec<Board> {
    let mut boards = vec![Board::start_pos()];
    for ply in 0..plies {
        let bd = boards.last().unwrap();
        let moves = bd.generate_moves(GenMode::ALL);
        if moves.is_empty() || bd.is_rule50_draw() {
            break;
        }
        let mv = moves.as_slice()[choices[ply] % moves.len()];
        boards.push(bd.forward(mv));
    }
    boards
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn fen_hash_round_trip(choices in prop::collection::vec(0usize..4096, 40)) {
        for bd in random_walk(&choices, 40) {
            let reparsed = Board::parse_fen(&bd.fen()).unwrap();
            prop_assert_eq!(reparsed.hash(), bd.hash());
        }
    }

    #[test]
    fn mirror_is_an_involution(choices in prop::collection::vec(0usize..4096, 30)) {
        for bd in random_walk(&choices, 30) {
            prop_assert_eq!(bd.mirrored().mirrored().hash(), bd.hash());
        }
    }

    #[test]
    fn null_move_changes_hash(choices in prop::collection::vec(0usize..4096, 30)) {
        for bd in random_walk(&choices, 30) {
            if !bd.is_check() {
                prop_assert_ne!(bd.forward(Move::null()).hash(), bd.hash());
            }
        }
    }

    #[test]
    fn generated_moves_are_legal_and_vice_versa(
        choices in prop::collection::vec(0usize..4096, 24),
    ) {
        for bd in random_walk(&choices, 24) {
            let legal = bd.generate_moves(GenMode::ALL);
            for mv in &legal {
                prop_assert!(bd.is_legal(GenMode::ALL, *mv));
            }
            // Probe the validator with moves from sibling positions too.
            for sibling in bd.generate_moves(GenMode::ALL).iter().take(4) {
                let next = bd.forward(*sibling);
                for mv in &next.generate_moves(GenMode::ALL) {
                    prop_assert_eq!(next.is_legal(GenMode::ALL, *mv), true);
                    prop_assert_eq!(bd.is_legal(GenMode::ALL, *mv), legal.has(*mv));
                }
            }
        }
    }

    #[test]
    fn see_ge_is_monotone_in_threshold(choices in prop::collection::vec(0usize..4096, 16)) {
        for bd in random_walk(&choices, 16) {
            for mv in &bd.generate_moves(GenMode::ALL) {
                let exact = bd.see(*mv);
                for threshold in [-500, -100, 0, 100, 500] {
                    prop_assert_eq!(bd.see_ge(*mv, threshold), exact >= threshold);
                }
            }
        }
    }

    #[test]
    fn kings_always_present(choices in prop::collection::vec(0usize..4096, 60)) {
        for bd in random_walk(&choices, 60) {
            prop_assert_eq!(bd.man.white.king().count(), 1);
            prop_assert_eq!(bd.man.black.king().count(), 1);
            // Planes are pairwise disjoint and union to the occupancy.
            let mut seen = basalt::board::types::SquareSet::EMPTY;
            for pt in basalt::board::types::piece::ALL_PIECE_TYPES {
                for side in [&bd.man.white, &bd.man.black] {
                    let plane = side.plane(pt);
                    prop_assert!((seen & plane).none());
                    seen |= plane;
                }
            }
            prop_assert_eq!(seen, bd.occupancy());
        }
    }
}
