//! HalfKA feature indexing.
//!
//! Each side's half of the transformer indexes into
//! `(our king square, colored piece type, piece square)`. Black's view is
//! mirrored over the rank midline (square index XOR 56) so one weight set
//! serves both sides.

use crate::board::types::{Color, PieceType, Square};

use super::BASE_DIM;

/// Total number of binary input features per half.
pub const NUM_FEATURES: usize = 64 * 12 * 64;

/// Upper bound on simultaneously active features in one half.
pub const MAX_ACTIVE_HALF_FEATURES: usize = 32;

const MAJOR: usize = 64 * 12;
const MINOR: usize = 64;

#[inline]
fn piece_offset(us: bool, pt: PieceType) -> usize {
    let base = if us { 0 } else { 6 * MINOR };
    base + pt.index() * MINOR
}

/// Feature index seen from `pov` for a `piece_color` piece of type `pt` on
/// `sq`, with `pov`'s king on `king_sq`.
#[inline]
#[must_use]
pub fn index(pov: Color, piece_color: Color, king_sq: Square, pt: PieceType, sq: Square) -> usize {
    let mirror = pov.mirror();
    MAJOR * (king_sq.index() ^ mirror) + piece_offset(pov == piece_color, pt) + (sq.index() ^ mirror)
}

/// Start of the weight column for a feature.
#[inline]
#[must_use]
pub const fn column_offset(feature: usize) -> usize {
    feature * BASE_DIM
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::from_name(name).unwrap()
    }

    #[test]
    fn test_index_bounds() {
        for pov in [Color::White, Color::Black] {
            for piece_color in [Color::White, Color::Black] {
                for pt in crate::board::types::piece::ALL_PIECE_TYPES {
                    let idx = index(pov, piece_color, sq("e1"), pt, sq("a8"));
                    assert!(idx < NUM_FEATURES);
                }
            }
        }
    }

    #[test]
    fn test_mirror_symmetry() {
        // A white pawn seen by white equals the mirrored black pawn seen by
        // black: the network is color-agnostic through the mirror.
        let white_view = index(Color::White, Color::White, sq("e1"), PieceType::Pawn, sq("d4"));
        let black_view = index(Color::Black, Color::Black, sq("e8"), PieceType::Pawn, sq("d5"));
        assert_eq!(white_view, black_view);
    }

    #[test]
    fn test_us_them_disjoint() {
        let us = index(Color::White, Color::White, sq("e1"), PieceType::Queen, sq("d1"));
        let them = index(Color::White, Color::Black, sq("e1"), PieceType::Queen, sq("d1"));
        assert_ne!(us, them);
    }
}
