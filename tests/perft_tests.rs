//! Canonical perft node counts and generation symmetry.

use basalt::board::movegen::perft;
use basalt::board::Board;

#[test]
fn perft_startpos_depth_5() {
    let bd = Board::start_pos();
    assert_eq!(perft(&bd, 5), 4_865_609);
}

#[test]
fn perft_kiwipete_depth_4() {
    let bd = Board::parse_fen(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    )
    .unwrap();
    assert_eq!(perft(&bd, 4), 4_085_603);
}

#[test]
fn perft_position_3_depth_5() {
    let bd = Board::parse_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
    assert_eq!(perft(&bd, 5), 674_624);
}

#[test]
fn perft_position_4_depth_4() {
    let bd = Board::parse_fen(
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    )
    .unwrap();
    assert_eq!(perft(&bd, 4), 422_333);
}

#[test]
fn perft_mirror_symmetry() {
    let fens = [
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    ];
    for fen in fens {
        let bd = Board::parse_fen(fen).unwrap();
        let mirror = bd.mirrored();
        for depth in 1..=4 {
            assert_eq!(
                perft(&bd, depth),
                perft(&mirror, depth),
                "fen: {fen} depth: {depth}"
            );
        }
    }
}
