//! Colors, piece types and color-indexed pairs.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Side to move or piece ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The opposing color.
    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Horizontal mirror constant used by HalfKA feature indexing:
    /// 0 for white, 56 for black (flips the rank component of a square index).
    #[inline]
    #[must_use]
    pub const fn mirror(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 56,
        }
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }
}

/// The six piece types, ordered by conventional material value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PieceType {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// All piece types, iteration order used by feature resets and FEN output.
pub const ALL_PIECE_TYPES: [PieceType; 6] = [
    PieceType::Pawn,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Rook,
    PieceType::Queen,
    PieceType::King,
];

impl PieceType {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decode from a three-bit field; out-of-range values collapse to king.
    #[inline]
    #[must_use]
    pub const fn from_index(idx: usize) -> Self {
        match idx {
            0 => PieceType::Pawn,
            1 => PieceType::Knight,
            2 => PieceType::Bishop,
            3 => PieceType::Rook,
            4 => PieceType::Queen,
            _ => PieceType::King,
        }
    }

    /// Lowercase FEN letter for this piece type.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        }
    }

    /// Parse a FEN piece letter (either case).
    #[must_use]
    pub fn from_letter(ch: char) -> Option<Self> {
        match ch.to_ascii_lowercase() {
            'p' => Some(PieceType::Pawn),
            'n' => Some(PieceType::Knight),
            'b' => Some(PieceType::Bishop),
            'r' => Some(PieceType::Rook),
            'q' => Some(PieceType::Queen),
            'k' => Some(PieceType::King),
            _ => None,
        }
    }

    /// Contribution to the game-phase sum (pawns and kings contribute nothing).
    #[inline]
    #[must_use]
    pub const fn phase_value(self) -> i32 {
        match self {
            PieceType::Pawn | PieceType::King => 0,
            PieceType::Knight | PieceType::Bishop => 1,
            PieceType::Rook => 2,
            PieceType::Queen => 4,
        }
    }
}

/// A pair of values indexed by color.
///
/// Replaces the original CRTP "sided" pattern with a plain struct and
/// color-taking accessors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByColor<T> {
    pub white: T,
    pub black: T,
}

impl<T> ByColor<T> {
    #[inline]
    pub fn us(&self, c: Color) -> &T {
        match c {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    #[inline]
    pub fn us_mut(&mut self, c: Color) -> &mut T {
        match c {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    #[inline]
    pub fn them(&self, c: Color) -> &T {
        self.us(c.other())
    }

    #[inline]
    pub fn them_mut(&mut self, c: Color) -> &mut T {
        self.us_mut(c.other())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_other() {
        assert_eq!(Color::White.other(), Color::Black);
        assert_eq!(Color::Black.other(), Color::White);
    }

    #[test]
    fn test_piece_type_round_trip() {
        for pt in ALL_PIECE_TYPES {
            assert_eq!(PieceType::from_index(pt.index()), pt);
            assert_eq!(PieceType::from_letter(pt.letter()), Some(pt));
        }
    }

    #[test]
    fn test_phase_values() {
        let total: i32 = ALL_PIECE_TYPES
            .iter()
            .map(|pt| {
                let count = match pt {
                    PieceType::Pawn => 16,
                    PieceType::King => 2,
                    PieceType::Queen => 2,
                    _ => 4,
                };
                pt.phase_value() * count
            })
            .sum();
        // Full starting material sums to the phase normalization constant.
        assert_eq!(total, 24);
    }

    #[test]
    fn test_by_color_accessors() {
        let mut pair = ByColor { white: 1, black: 2 };
        assert_eq!(*pair.us(Color::White), 1);
        assert_eq!(*pair.them(Color::White), 2);
        *pair.us_mut(Color::Black) = 7;
        assert_eq!(pair.black, 7);
    }
}
