//! Castling geometry and pawn rank constants.
//!
//! Castling is encoded internally as the king capturing its own rook, so the
//! constants here carry both the encoding squares (king start, rook start)
//! and the resulting squares after the castle is played.

use super::types::{Color, Square, SquareSet};

/// Per-color castling squares and the masks used for legality checks.
#[derive(Clone, Copy, Debug)]
pub struct CastleInfo {
    pub start_king: Square,
    pub oo_rook: Square,
    pub ooo_rook: Square,
    pub after_oo_king: Square,
    pub after_oo_rook: Square,
    pub after_ooo_king: Square,
    pub after_ooo_rook: Square,
    /// Squares the king crosses castling short; must be empty and unattacked.
    pub oo_mask: SquareSet,
    /// Squares the king crosses castling long; must be unattacked.
    pub ooo_danger_mask: SquareSet,
    /// Squares between king and rook castling long; must be empty.
    pub ooo_occ_mask: SquareSet,
}

const fn castle_info_for(rank_base: usize) -> CastleInfo {
    let b = rank_base;
    CastleInfo {
        start_king: Square::from_index(b + 3),
        oo_rook: Square::from_index(b),
        ooo_rook: Square::from_index(b + 7),
        after_oo_king: Square::from_index(b + 1),
        after_oo_rook: Square::from_index(b + 2),
        after_ooo_king: Square::from_index(b + 5),
        after_ooo_rook: Square::from_index(b + 4),
        oo_mask: SquareSet((1u64 << (b + 1)) | (1u64 << (b + 2))),
        ooo_danger_mask: SquareSet((1u64 << (b + 4)) | (1u64 << (b + 5))),
        ooo_occ_mask: SquareSet((1u64 << (b + 4)) | (1u64 << (b + 5)) | (1u64 << (b + 6))),
    }
}

pub const WHITE_CASTLE: CastleInfo = castle_info_for(0);
pub const BLACK_CASTLE: CastleInfo = castle_info_for(56);

#[inline]
#[must_use]
pub const fn castle_info(c: Color) -> &'static CastleInfo {
    match c {
        Color::White => &WHITE_CASTLE,
        Color::Black => &BLACK_CASTLE,
    }
}

/// Per-color pawn rank geometry.
#[derive(Clone, Copy, Debug)]
pub struct PawnInfo {
    pub start_rank: SquareSet,
    pub double_rank: SquareSet,
    pub last_rank: SquareSet,
}

pub const WHITE_PAWN: PawnInfo = PawnInfo {
    start_rank: SquareSet::rank(1),
    double_rank: SquareSet::rank(3),
    last_rank: SquareSet::rank(7),
};

pub const BLACK_PAWN: PawnInfo = PawnInfo {
    start_rank: SquareSet::rank(6),
    double_rank: SquareSet::rank(4),
    last_rank: SquareSet::rank(0),
};

#[inline]
#[must_use]
pub const fn pawn_info(c: Color) -> &'static PawnInfo {
    match c {
        Color::White => &WHITE_PAWN,
        Color::Black => &BLACK_PAWN,
    }
}
