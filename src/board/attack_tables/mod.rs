//! Precomputed attack and geometry tables.
//!
//! Stepper tables (knight, king, pawn), pawn push tables, passed-pawn fans,
//! the ray-between table, and magic-hashed slider tables. Everything is
//! built once on first use from compiled-in constants.

mod magics;
mod tables;

use super::types::{Color, Square, SquareSet};

#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> SquareSet {
    SquareSet(tables::KNIGHT_ATTACKS[sq.index()])
}

#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> SquareSet {
    SquareSet(tables::KING_ATTACKS[sq.index()])
}

#[inline]
#[must_use]
pub fn pawn_attacks(c: Color, sq: Square) -> SquareSet {
    SquareSet(tables::PAWN_ATTACKS[c.index()][sq.index()])
}

/// Single and (from the start rank) double pushes, blocked by `occ`.
#[inline]
#[must_use]
pub fn pawn_pushes(c: Color, sq: Square, occ: SquareSet) -> SquareSet {
    tables::pawn_pushes(c, sq, occ)
}

/// The three-file fan of squares a pawn must clear to be passed.
#[inline]
#[must_use]
pub fn passer_mask(c: Color, sq: Square) -> SquareSet {
    SquareSet(tables::PASSER_MASKS[c.index()][sq.index()])
}

/// Squares strictly between two collinear squares; empty otherwise.
#[inline]
#[must_use]
pub fn ray_between(a: Square, b: Square) -> SquareSet {
    SquareSet(tables::RAY_BETWEEN[a.index()][b.index()])
}

#[inline]
#[must_use]
pub fn bishop_attacks(sq: Square, occ: SquareSet) -> SquareSet {
    magics::bishop_attacks(sq, occ)
}

#[inline]
#[must_use]
pub fn rook_attacks(sq: Square, occ: SquareSet) -> SquareSet {
    magics::rook_attacks(sq, occ)
}

#[inline]
#[must_use]
pub fn queen_attacks(sq: Square, occ: SquareSet) -> SquareSet {
    bishop_attacks(sq, occ) | rook_attacks(sq, occ)
}
