//! King-bucket feature reset cache.
//!
//! A king move invalidates every feature of the moving side's half. Rather
//! than rebuilding from the bias vector, each side caches, per king square,
//! the last activation produced for that square together with the piece
//! configuration it reflects. A reset then replays only the symmetric
//! difference between the cached configuration and the current board,
//! which after a typical king shuffle is a handful of columns.

use crate::board::types::piece::ALL_PIECE_TYPES;
use crate::board::types::{ByColor, Color, Square, SquareSet};
use crate::board::Board;

use super::feature;
use super::weights::Weights;
use super::BASE_DIM;

type Config = ByColor<[SquareSet; 6]>;

/// Per-side cache: one activation slice and configuration per king square.
pub struct FeatureResetCache {
    scratchpad: Box<[i16]>,
    configs: Box<[Config; 64]>,
}

impl FeatureResetCache {
    #[must_use]
    pub fn new() -> Self {
        FeatureResetCache {
            scratchpad: vec![0; 64 * BASE_DIM].into_boxed_slice(),
            configs: Box::new([Config::default(); 64]),
        }
    }

    /// Reset every entry to the bias vector over an empty configuration.
    pub fn reinitialize(&mut self, weights: &Weights) {
        for entry in self.scratchpad.chunks_exact_mut(BASE_DIM) {
            entry.copy_from_slice(&weights.shared.b);
        }
        self.configs.fill(Config::default());
    }

    #[inline]
    fn slice_mut(&mut self, king: Square) -> &mut [i16] {
        let start = king.index() * BASE_DIM;
        &mut self.scratchpad[start..start + BASE_DIM]
    }

    #[inline]
    fn slice(&self, king: Square) -> &[i16] {
        let start = king.index() * BASE_DIM;
        &self.scratchpad[start..start + BASE_DIM]
    }

    /// Bring the entry for `pov`'s current king square up to date with
    /// `bd`, then copy its activation into `dst` (one half slice).
    pub fn refresh_half_into(&mut self, weights: &Weights, bd: &Board, pov: Color, dst: &mut [i16]) {
        let king = bd.king_sq(pov);
        let config = &mut self.configs[king.index()];

        let start = king.index() * BASE_DIM;
        let slice = &mut self.scratchpad[start..start + BASE_DIM];

        for p in [Color::White, Color::Black] {
            for pt in ALL_PIECE_TYPES {
                let board_plane = bd.man.us(p).plane(pt);
                let cached_plane = config.us(p)[pt.index()];

                for sq in cached_plane & !board_plane {
                    weights
                        .shared
                        .erase_idx(feature::index(pov, p, king, pt, sq), slice);
                }
                for sq in board_plane & !cached_plane {
                    weights
                        .shared
                        .insert_idx(feature::index(pov, p, king, pt, sq), slice);
                }
                config.us_mut(p)[pt.index()] = board_plane;
            }
        }

        dst.copy_from_slice(self.slice(king));
    }
}

impl Default for FeatureResetCache {
    fn default() -> Self {
        FeatureResetCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_half(weights: &Weights, bd: &Board, pov: Color) -> Vec<i16> {
        let mut half = vec![0i16; BASE_DIM];
        half.copy_from_slice(&weights.shared.b);
        let king = bd.king_sq(pov);
        for p in [Color::White, Color::Black] {
            for pt in ALL_PIECE_TYPES {
                for sq in bd.man.us(p).plane(pt) {
                    weights
                        .shared
                        .insert_idx(feature::index(pov, p, king, pt, sq), &mut half);
                }
            }
        }
        half
    }

    #[test]
    fn test_refresh_matches_full_rebuild() {
        let weights = Weights::pseudo_random(7);
        let mut cache = FeatureResetCache::new();
        cache.reinitialize(&weights);

        let bd = Board::start_pos();
        let mut dst = vec![0i16; BASE_DIM];
        cache.refresh_half_into(&weights, &bd, Color::White, &mut dst);
        assert_eq!(dst, full_half(&weights, &bd, Color::White));

        // A second refresh from the warm cache must agree as well.
        let bd2 = crate::board::Board::parse_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        cache.refresh_half_into(&weights, &bd2, Color::White, &mut dst);
        assert_eq!(dst, full_half(&weights, &bd2, Color::White));
    }
}
