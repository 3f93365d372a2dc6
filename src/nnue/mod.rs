//! Quantized HalfKA NNUE evaluation.
//!
//! The feature transformer is a sparse affine layer over
//! `64 (king square) x 12 (colored piece) x 64 (piece square)` binary
//! features, kept incrementally updated per search ply in a ring
//! scratchpad. The tail is a small dense network: a side-to-move keyed
//! int16 layer followed by three float layers with two residual
//! concatenations, blended by game phase into the final score.

pub mod eval_node;
pub mod evaluator;
pub mod feature;
pub mod layers;
pub mod reset_cache;
pub mod weights;

/// Width of one half of the feature transformer output.
pub const BASE_DIM: usize = 768;

/// Width of the concatenated (us, them) transformer output.
pub const FT_DIM: usize = 2 * BASE_DIM;

/// Ring scratchpad depth: one slice per search ply.
pub const SCRATCHPAD_DEPTH: usize = 256;

/// Dimension of the final pre-output activation (the fingerprinted one).
pub const FINAL_DIM: usize = 24;

/// Quantization scale of the shared feature transformer.
pub const SHARED_QUANTIZATION_SCALE: f32 = 512.0;

/// Quantization scale of the first dense layer's weights.
pub const FC0_WEIGHT_QUANTIZATION_SCALE: f32 = 1024.0;

/// Scale applied to the first dense layer's biases.
pub const FC0_BIAS_QUANTIZATION_SCALE: f32 =
    SHARED_QUANTIZATION_SCALE * FC0_WEIGHT_QUANTIZATION_SCALE;

/// Multiplier taking the int32 fc0 accumulator back to float space.
pub const DEQUANTIZATION_SCALE: f32 = 1.0 / FC0_BIAS_QUANTIZATION_SCALE;
