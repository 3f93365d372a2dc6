//! The dense tail of the network and the final score shaping.

use crate::board::types::Color;
use crate::board::zobrist;

use super::layers::QuantDenseLayer;
use super::weights::Weights;
use super::{FINAL_DIM, FT_DIM};

/// Scores are logits scaled by this factor.
pub const LOGIT_SCALE: f32 = 1024.0;
pub const MAX_LOGIT: f32 = 8.0;
pub const MIN_LOGIT: f32 = -8.0;

/// Phase blend coefficients; empirical constants, not trained weights.
const MG_BLEND: f32 = 0.7;
const EG_BLEND: f32 = 0.55;

/// Forward the dense tail over a materialized transformer slice.
///
/// The input is the concatenated (white half, black half) activation; the
/// side to move selects which fc0 copy reads it, so no runtime swap is
/// needed. Returns the 24-dim pre-output activation and the raw prediction.
#[must_use]
pub fn propagate(weights: &Weights, base: &[i16], pov: Color) -> ([f32; FINAL_DIM], f32) {
    debug_assert_eq!(base.len(), FT_DIM);
    let fc0 = match pov {
        Color::White => &weights.white_fc0,
        Color::Black => &weights.black_fc0,
    };

    let acc = fc0.forward_crelu255(base);
    let x1 = QuantDenseLayer::dequantized(&acc, 8);

    let mut x2 = [0.0f32; 16];
    x2[..8].copy_from_slice(&x1);
    {
        let (head, tail) = x2.split_at_mut(8);
        weights.fc1.forward_relu(head, tail);
    }

    let mut x3 = [0.0f32; FINAL_DIM];
    x3[..16].copy_from_slice(&x2);
    {
        let (head, tail) = x3.split_at_mut(16);
        weights.fc2.forward_relu(head, tail);
    }

    let mut out = [0.0f32; 1];
    weights.fc3.forward_relu(&x3, &mut out);
    (x3, out[0])
}

/// Evaluate a materialized slice: phase-blended, clamped to the logit range
/// and scaled to the integer score space. Also returns the quarter-hash of
/// the final activation's sign pattern, the "what kind of position is this"
/// fingerprint consumed by the history and correction tables.
#[must_use]
pub fn evaluate(weights: &Weights, base: &[i16], pov: Color, phase: f32) -> (u16, i32) {
    let (final_output, prediction) = propagate(weights, base, pov);

    let feature_hash = zobrist::quarter_hash_of(|i| final_output[i] > 0.0);

    let eval = phase * MG_BLEND * prediction + (1.0 - phase) * EG_BLEND * prediction;
    let value = LOGIT_SCALE * eval.clamp(MIN_LOGIT, MAX_LOGIT);
    (feature_hash, value as i32)
}
