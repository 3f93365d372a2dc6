//! Classical fallback evaluation: tapered material + piece-square tables.
//!
//! Used whenever no network file has been installed, so the engine stays
//! playable out of the box. Scores are produced directly in the internal
//! scale (1024 internal units correspond to 288 centipawns, the same
//! conversion the UCI layer applies on output).

use crate::board::types::piece::ALL_PIECE_TYPES;
use crate::board::types::{Color, PieceType, Square};
use crate::board::Board;

/// Middlegame material values, centipawns.
const MATERIAL_MG: [i32; 6] = [82, 337, 365, 477, 1025, 0];
/// Endgame material values, centipawns.
const MATERIAL_EG: [i32; 6] = [94, 281, 297, 512, 936, 0];

const BISHOP_PAIR_BONUS: i32 = 18;
const TEMPO_BONUS: i32 = 15;
const PHASE_TOTAL: i32 = 24;

/// Piece-square tables in visual order: rank 8 first, files a to h.
#[rustfmt::skip]
const PST_MG: [[i32; 64]; 6] = [
    // pawn
    [
          0,   0,   0,   0,   0,   0,   0,   0,
         50,  50,  50,  50,  50,  50,  50,  50,
         10,  10,  20,  30,  30,  20,  10,  10,
          5,   5,  10,  25,  25,  10,   5,   5,
          0,   0,   0,  20,  20,   0,   0,   0,
          5,  -5, -10,   0,   0, -10,  -5,   5,
          5,  10,  10, -20, -20,  10,  10,   5,
          0,   0,   0,   0,   0,   0,   0,   0,
    ],
    // knight
    [
        -50, -40, -30, -30, -30, -30, -40, -50,
        -40, -20,   0,   0,   0,   0, -20, -40,
        -30,   0,  10,  15,  15,  10,   0, -30,
        -30,   5,  15,  20,  20,  15,   5, -30,
        -30,   0,  15,  20,  20,  15,   0, -30,
        -30,   5,  10,  15,  15,  10,   5, -30,
        -40, -20,   0,   5,   5,   0, -20, -40,
        -50, -40, -30, -30, -30, -30, -40, -50,
    ],
    // bishop
    [
        -20, -10, -10, -10, -10, -10, -10, -20,
        -10,   0,   0,   0,   0,   0,   0, -10,
        -10,   0,   5,  10,  10,   5,   0, -10,
        -10,   5,   5,  10,  10,   5,   5, -10,
        -10,   0,  10,  10,  10,  10,   0, -10,
        -10,  10,  10,  10,  10,  10,  10, -10,
        -10,   5,   0,   0,   0,   0,   5, -10,
        -20, -10, -10, -10, -10, -10, -10, -20,
    ],
    // rook
    [
          0,   0,   0,   0,   0,   0,   0,   0,
          5,  10,  10,  10,  10,  10,  10,   5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
          0,   0,   0,   5,   5,   0,   0,   0,
    ],
    // queen
    [
        -20, -10, -10,  -5,  -5, -10, -10, -20,
        -10,   0,   0,   0,   0,   0,   0, -10,
        -10,   0,   5,   5,   5,   5,   0, -10,
         -5,   0,   5,   5,   5,   5,   0,  -5,
          0,   0,   5,   5,   5,   5,   0,  -5,
        -10,   5,   5,   5,   5,   5,   0, -10,
        -10,   0,   5,   0,   0,   0,   0, -10,
        -20, -10, -10,  -5,  -5, -10, -10, -20,
    ],
    // king
    [
        -30, -40, -40, -50, -50, -40, -40, -30,
        -30, -40, -40, -50, -50, -40, -40, -30,
        -30, -40, -40, -50, -50, -40, -40, -30,
        -30, -40, -40, -50, -50, -40, -40, -30,
        -20, -30, -30, -40, -40, -30, -30, -20,
        -10, -20, -20, -20, -20, -20, -20, -10,
         20,  20,   0,   0,   0,   0,  20,  20,
         20,  30,  10,   0,   0,  10,  30,  20,
    ],
];

#[rustfmt::skip]
const PST_EG: [[i32; 64]; 6] = [
    // pawn
    [
          0,   0,   0,   0,   0,   0,   0,   0,
         80,  80,  80,  80,  80,  80,  80,  80,
         50,  50,  50,  50,  50,  50,  50,  50,
         30,  30,  30,  30,  30,  30,  30,  30,
         20,  20,  20,  20,  20,  20,  20,  20,
         10,  10,  10,  10,  10,  10,  10,  10,
         10,  10,  10,  10,  10,  10,  10,  10,
          0,   0,   0,   0,   0,   0,   0,   0,
    ],
    // knight
    [
        -50, -40, -30, -30, -30, -30, -40, -50,
        -40, -20,   0,   0,   0,   0, -20, -40,
        -30,   0,  10,  15,  15,  10,   0, -30,
        -30,   5,  15,  20,  20,  15,   5, -30,
        -30,   0,  15,  20,  20,  15,   0, -30,
        -30,   5,  10,  15,  15,  10,   5, -30,
        -40, -20,   0,   5,   5,   0, -20, -40,
        -50, -40, -30, -30, -30, -30, -40, -50,
    ],
    // bishop
    [
        -20, -10, -10, -10, -10, -10, -10, -20,
        -10,   0,   0,   0,   0,   0,   0, -10,
        -10,   0,   5,  10,  10,   5,   0, -10,
        -10,   5,   5,  10,  10,   5,   5, -10,
        -10,   0,  10,  10,  10,  10,   0, -10,
        -10,  10,  10,  10,  10,  10,  10, -10,
        -10,   5,   0,   0,   0,   0,   5, -10,
        -20, -10, -10, -10, -10, -10, -10, -20,
    ],
    // rook
    [
          0,   0,   0,   0,   0,   0,   0,   0,
          5,  10,  10,  10,  10,  10,  10,   5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
         -5,   0,   0,   0,   0,   0,   0,  -5,
          0,   0,   0,   0,   0,   0,   0,   0,
    ],
    // queen
    [
        -20, -10, -10,  -5,  -5, -10, -10, -20,
        -10,   0,   0,   0,   0,   0,   0, -10,
        -10,   0,   5,   5,   5,   5,   0, -10,
         -5,   0,   5,   5,   5,   5,   0,  -5,
          0,   0,   5,   5,   5,   5,   0,  -5,
        -10,   5,   5,   5,   5,   5,   0, -10,
        -10,   0,   5,   0,   0,   0,   0, -10,
        -20, -10, -10,  -5,  -5, -10, -10, -20,
    ],
    // king
    [
        -50, -40, -30, -20, -20, -30, -40, -50,
        -30, -20, -10,   0,   0, -10, -20, -30,
        -30, -10,  20,  30,  30,  20, -10, -30,
        -30, -10,  30,  40,  40,  30, -10, -30,
        -30, -10,  30,  40,  40,  30, -10, -30,
        -30, -10,  20,  30,  30,  20, -10, -30,
        -30, -30,   0,   0,   0,   0, -30, -30,
        -50, -30, -30, -30, -30, -30, -30, -50,
    ],
];

/// Map an internal square index to its visual-table position for `c`.
#[inline]
fn pst_index(c: Color, sq: Square) -> usize {
    let rank = match c {
        Color::White => 7 - sq.rank(),
        Color::Black => sq.rank(),
    };
    // Internal file 0 is the h-file; visual column 0 is the a-file.
    let col = 7 - sq.file();
    rank * 8 + col
}

/// Evaluate from the side-to-move's perspective, internal scale.
#[must_use]
pub fn classical(bd: &Board) -> i32 {
    let mut mg = 0;
    let mut eg = 0;

    for (c, sign) in [(Color::White, 1), (Color::Black, -1)] {
        let man = bd.man.us(c);
        for pt in ALL_PIECE_TYPES {
            for sq in man.plane(pt) {
                let idx = pst_index(c, sq);
                mg += sign * (MATERIAL_MG[pt.index()] + PST_MG[pt.index()][idx]);
                eg += sign * (MATERIAL_EG[pt.index()] + PST_EG[pt.index()][idx]);
            }
        }
        if man.plane(PieceType::Bishop).count() >= 2 {
            mg += sign * BISHOP_PAIR_BONUS;
            eg += sign * BISHOP_PAIR_BONUS;
        }
    }

    let midphase = {
        let mut value = 0;
        for pt in ALL_PIECE_TYPES {
            let count = (bd.man.white.plane(pt) | bd.man.black.plane(pt)).count() as i32;
            value += pt.phase_value() * count;
        }
        value.min(PHASE_TOTAL)
    };
    let tapered_cp = (mg * midphase + eg * (PHASE_TOTAL - midphase)) / PHASE_TOTAL;

    let pov = if bd.turn() == Color::White { 1 } else { -1 };
    let cp = pov * tapered_cp + TEMPO_BONUS;

    // Centipawns to the internal scale (1024 internal = 288 cp), clamped to
    // the same logit range the network output respects.
    (cp * 32 / 9).clamp(-crate::search::BIG_NUMBER + 1, crate::search::BIG_NUMBER - 1)
}
