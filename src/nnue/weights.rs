//! Network weights and the streaming loader.
//!
//! Two on-disk variants are understood: a float master (quantized while
//! streaming, so the 150M-parameter transformer never exists as floats in
//! memory) and a pre-quantized int16 dump loaded directly. Both accumulate
//! a 32-bit XOR signature over the streamed bytes, truncated per element to
//! `min(4, size_of::<element>())` bytes, which the UCI layer reports so a
//! mismatched file is visible without aborting the engine.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::layers::{FloatDenseLayer, QuantDenseLayer, SparseAffineLayer};
use super::{
    feature, BASE_DIM, FC0_BIAS_QUANTIZATION_SCALE, FC0_WEIGHT_QUANTIZATION_SCALE, FINAL_DIM,
    FT_DIM, SHARED_QUANTIZATION_SCALE,
};

/// Byte stream with a running XOR signature.
pub struct WeightsStreamer<R> {
    reader: R,
    signature: u32,
}

impl<R: Read> WeightsStreamer<R> {
    pub fn new(reader: R) -> Self {
        WeightsStreamer {
            reader,
            signature: 0,
        }
    }

    #[must_use]
    pub fn signature(&self) -> u32 {
        self.signature
    }

    fn stream_f32(&mut self) -> io::Result<f32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        self.signature ^= u32::from_le_bytes(buf);
        Ok(f32::from_le_bytes(buf))
    }

    fn stream_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        self.signature ^= u32::from_le_bytes(buf);
        Ok(i32::from_le_bytes(buf))
    }

    fn stream_i16(&mut self) -> io::Result<i16> {
        let mut buf = [0u8; 2];
        self.reader.read_exact(&mut buf)?;
        self.signature ^= u32::from(u16::from_le_bytes(buf));
        Ok(i16::from_le_bytes(buf))
    }
}

/// All network parameters, quantized and ready for inference.
pub struct Weights {
    signature: u32,
    loaded: bool,
    /// Shared feature transformer (int16).
    pub shared: SparseAffineLayer,
    /// First dense layer for white to move.
    pub white_fc0: QuantDenseLayer,
    /// The same layer with its input halves swapped, for black to move.
    pub black_fc0: QuantDenseLayer,
    pub fc1: FloatDenseLayer,
    pub fc2: FloatDenseLayer,
    pub fc3: FloatDenseLayer,
}

impl Weights {
    /// An all-zero network. The engine falls back to the classical
    /// evaluation while this is installed.
    #[must_use]
    pub fn zeroed() -> Self {
        Weights {
            signature: 0,
            loaded: false,
            shared: SparseAffineLayer::zeroed(),
            white_fc0: QuantDenseLayer::zeroed(FT_DIM, 8),
            black_fc0: QuantDenseLayer::zeroed(FT_DIM, 8),
            fc1: FloatDenseLayer::zeroed(8, 8),
            fc2: FloatDenseLayer::zeroed(16, 8),
            fc3: FloatDenseLayer::zeroed(FINAL_DIM, 1),
        }
    }

    #[must_use]
    pub fn signature(&self) -> u32 {
        self.signature
    }

    /// Whether real parameters were streamed in (as opposed to the zeroed
    /// fallback stub).
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn load_float_dense<R: Read>(
        streamer: &mut WeightsStreamer<R>,
        input_dim: usize,
        output_dim: usize,
    ) -> io::Result<FloatDenseLayer> {
        let mut layer = FloatDenseLayer::zeroed(input_dim, output_dim);
        for w in layer.w.iter_mut() {
            *w = streamer.stream_f32()?;
        }
        for b in layer.b.iter_mut() {
            *b = streamer.stream_f32()?;
        }
        Ok(layer)
    }

    /// Load the float master format, quantizing element-wise while
    /// streaming.
    pub fn load_float<R: Read>(reader: R) -> io::Result<Self> {
        let mut s = WeightsStreamer::new(reader);
        let mut weights = Weights::zeroed();

        for w in weights.shared.w.iter_mut() {
            *w = (s.stream_f32()? * SHARED_QUANTIZATION_SCALE).round() as i16;
        }
        for b in weights.shared.b.iter_mut() {
            *b = (s.stream_f32()? * SHARED_QUANTIZATION_SCALE).round() as i16;
        }

        for w in weights.white_fc0.w.iter_mut() {
            *w = (s.stream_f32()? * FC0_WEIGHT_QUANTIZATION_SCALE).round() as i16;
        }
        for b in weights.white_fc0.b.iter_mut() {
            *b = (s.stream_f32()? * FC0_BIAS_QUANTIZATION_SCALE).round() as i32;
        }
        weights.black_fc0 = weights.white_fc0.half_input_flipped();

        weights.fc1 = Self::load_float_dense(&mut s, 8, 8)?;
        weights.fc2 = Self::load_float_dense(&mut s, 16, 8)?;
        weights.fc3 = Self::load_float_dense(&mut s, FINAL_DIM, 1)?;

        weights.signature = s.signature();
        weights.loaded = true;
        Ok(weights)
    }

    /// Load the pre-quantized format: int16 transformer and fc0 (int32 fc0
    /// biases), float tail.
    pub fn load_quantized<R: Read>(reader: R) -> io::Result<Self> {
        let mut s = WeightsStreamer::new(reader);
        let mut weights = Weights::zeroed();

        for w in weights.shared.w.iter_mut() {
            *w = s.stream_i16()?;
        }
        for b in weights.shared.b.iter_mut() {
            *b = s.stream_i16()?;
        }

        for w in weights.white_fc0.w.iter_mut() {
            *w = s.stream_i16()?;
        }
        for b in weights.white_fc0.b.iter_mut() {
            *b = s.stream_i32()?;
        }
        weights.black_fc0 = weights.white_fc0.half_input_flipped();

        weights.fc1 = Self::load_float_dense(&mut s, 8, 8)?;
        weights.fc2 = Self::load_float_dense(&mut s, 16, 8)?;
        weights.fc3 = Self::load_float_dense(&mut s, FINAL_DIM, 1)?;

        weights.signature = s.signature();
        weights.loaded = true;
        #[cfg(feature = "logging")]
        log::info!("loaded quantized weights, signature {:#010x}", weights.signature);
        Ok(weights)
    }

    /// Load from a file, picking the variant by its exact size: the float
    /// master is four bytes per parameter, the quantized dump two bytes for
    /// each int16 parameter.
    pub fn load_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        let reader = BufReader::new(file);
        let float_len = Self::num_parameters() as u64 * 4;
        if len == float_len {
            Self::load_float(reader)
        } else {
            Self::load_quantized(reader)
        }
    }

    /// Total streamed parameter count.
    #[must_use]
    pub const fn num_parameters() -> usize {
        feature::NUM_FEATURES * BASE_DIM
            + BASE_DIM
            + FT_DIM * 8
            + 8
            + (8 * 8 + 8)
            + (16 * 8 + 8)
            + (FINAL_DIM + 1)
    }

    /// Parameters stored as int16 in the quantized variant.
    #[must_use]
    pub const fn num_quantized_parameters() -> usize {
        feature::NUM_FEATURES * BASE_DIM + BASE_DIM + FT_DIM * 8
    }

    /// Deterministic pseudo-random parameters; used by tests and the bench
    /// harness to exercise the incremental-update paths with non-trivial
    /// weight columns.
    #[must_use]
    pub fn pseudo_random(seed: u64) -> Self {
        use crate::board::zobrist::XorshiftGenerator;

        let mut gen = XorshiftGenerator::new(seed | 1);
        let mut weights = Weights::zeroed();
        for w in weights.shared.w.iter_mut() {
            *w = (gen.next_hash() % 33) as i16 - 16;
        }
        for b in weights.shared.b.iter_mut() {
            *b = (gen.next_hash() % 65) as i16 - 32;
        }
        for w in weights.white_fc0.w.iter_mut() {
            *w = (gen.next_hash() % 9) as i16 - 4;
        }
        for b in weights.white_fc0.b.iter_mut() {
            *b = (gen.next_hash() % 1025) as i32 - 512;
        }
        weights.black_fc0 = weights.white_fc0.half_input_flipped();
        for layer in [&mut weights.fc1, &mut weights.fc2, &mut weights.fc3] {
            for w in layer.w.iter_mut() {
                *w = ((gen.next_hash() % 2001) as f32 - 1000.0) / 4000.0;
            }
            for b in layer.b.iter_mut() {
                *b = ((gen.next_hash() % 2001) as f32 - 1000.0) / 4000.0;
            }
        }
        weights.signature = 0x5eed_0000 | (seed as u32 & 0xFFFF);
        weights.loaded = true;
        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_accumulates_truncated_elements() {
        let bytes: Vec<u8> = vec![0x01, 0x00, 0x02, 0x00, 0xAA, 0xBB, 0xCC, 0xDD];
        let mut s = WeightsStreamer::new(&bytes[..]);
        assert_eq!(s.stream_i16().unwrap(), 1);
        assert_eq!(s.stream_i16().unwrap(), 2);
        let _ = s.stream_f32().unwrap();
        // Two i16 elements truncate to their own width; the f32 uses all
        // four bytes.
        assert_eq!(s.signature(), 0x0001 ^ 0x0002 ^ 0xDDCC_BBAA);
    }

    #[test]
    fn test_streamer_eof_errors() {
        let bytes: Vec<u8> = vec![0x01];
        let mut s = WeightsStreamer::new(&bytes[..]);
        assert!(s.stream_i16().is_err());
    }

    #[test]
    fn test_zeroed_is_stub() {
        let w = Weights::zeroed();
        assert!(!w.is_loaded());
        assert_eq!(w.signature(), 0);
    }

    #[test]
    fn test_black_fc0_is_flipped_white() {
        let w = Weights::pseudo_random(42);
        assert_eq!(w.black_fc0.half_input_flipped().w, w.white_fc0.w);
        assert!(w.is_loaded());
    }
}
