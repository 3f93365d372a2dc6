//! Network layers: the sparse feature transformer and the dense tail.

use super::{feature, BASE_DIM, DEQUANTIZATION_SCALE};

/// Sparse affine layer: int16 weight columns indexed by active feature.
///
/// The accumulator update paths are fused add/sub loops over a whole
/// 768-wide column, the shape autovectorizers reliably turn into SIMD.
pub struct SparseAffineLayer {
    /// `NUM_FEATURES x BASE_DIM`, column per feature.
    pub w: Box<[i16]>,
    /// `BASE_DIM` biases.
    pub b: Box<[i16]>,
}

impl SparseAffineLayer {
    #[must_use]
    pub fn zeroed() -> Self {
        SparseAffineLayer {
            w: vec![0; feature::NUM_FEATURES * BASE_DIM].into_boxed_slice(),
            b: vec![0; BASE_DIM].into_boxed_slice(),
        }
    }

    #[inline]
    fn column(&self, feature_idx: usize) -> &[i16] {
        let start = feature::column_offset(feature_idx);
        &self.w[start..start + BASE_DIM]
    }

    /// `x += W[idx]`
    pub fn insert_idx(&self, idx: usize, x: &mut [i16]) {
        for (dst, &w) in x.iter_mut().zip(self.column(idx)) {
            *dst = dst.wrapping_add(w);
        }
    }

    /// `x -= W[idx]`
    pub fn erase_idx(&self, idx: usize, x: &mut [i16]) {
        for (dst, &w) in x.iter_mut().zip(self.column(idx)) {
            *dst = dst.wrapping_sub(w);
        }
    }

    /// `dst = src + W[insert] - W[erase]`
    pub fn insert_erase_idx(&self, insert: usize, erase: usize, src: &[i16], dst: &mut [i16]) {
        let ins = self.column(insert);
        let ers = self.column(erase);
        for i in 0..BASE_DIM {
            dst[i] = src[i].wrapping_add(ins[i]).wrapping_sub(ers[i]);
        }
    }

    /// `dst = src + W[insert] - W[erase0] - W[erase1]`
    pub fn insert_erase_erase_idx(
        &self,
        insert: usize,
        erase_0: usize,
        erase_1: usize,
        src: &[i16],
        dst: &mut [i16],
    ) {
        let ins = self.column(insert);
        let ers_0 = self.column(erase_0);
        let ers_1 = self.column(erase_1);
        for i in 0..BASE_DIM {
            dst[i] = src[i]
                .wrapping_add(ins[i])
                .wrapping_sub(ers_0[i])
                .wrapping_sub(ers_1[i]);
        }
    }
}

/// Quantized first dense layer: clipped-ReLU on the int16 input, int16
/// weights, int32 bias accumulators.
pub struct QuantDenseLayer {
    pub input_dim: usize,
    pub output_dim: usize,
    /// Row-major, input fastest: `w[out * input_dim + in]`.
    pub w: Box<[i16]>,
    pub b: Box<[i32]>,
}

impl QuantDenseLayer {
    #[must_use]
    pub fn zeroed(input_dim: usize, output_dim: usize) -> Self {
        QuantDenseLayer {
            input_dim,
            output_dim,
            w: vec![0; input_dim * output_dim].into_boxed_slice(),
            b: vec![0; output_dim].into_boxed_slice(),
        }
    }

    /// Clamp inputs to [0, 255] and accumulate; the result carries the
    /// combined shared and fc0 quantization scales.
    #[must_use]
    pub fn forward_crelu255(&self, x: &[i16]) -> [i32; 8] {
        debug_assert_eq!(x.len(), self.input_dim);
        debug_assert!(self.output_dim <= 8);
        let mut out = [0i32; 8];
        for (j, out_j) in out.iter_mut().enumerate().take(self.output_dim) {
            let row = &self.w[j * self.input_dim..(j + 1) * self.input_dim];
            let mut acc = self.b[j];
            for (&w, &v) in row.iter().zip(x) {
                let clipped = i32::from(v).clamp(0, 255);
                acc += i32::from(w) * clipped;
            }
            *out_j = acc;
        }
        out
    }

    /// Dequantize an fc0 accumulator into float space.
    #[must_use]
    pub fn dequantized(out: &[i32; 8], n: usize) -> [f32; 8] {
        let mut result = [0.0f32; 8];
        for i in 0..n {
            result[i] = out[i] as f32 * DEQUANTIZATION_SCALE;
        }
        result
    }

    /// Copy with the two input halves swapped in every row, so the same
    /// weights read a (them, us) ordered input.
    #[must_use]
    pub fn half_input_flipped(&self) -> Self {
        debug_assert_eq!(self.input_dim % 2, 0);
        let half = self.input_dim / 2;
        let mut w = self.w.clone();
        for row in w.chunks_exact_mut(self.input_dim) {
            let (a, b) = row.split_at_mut(half);
            a.swap_with_slice(b);
        }
        QuantDenseLayer {
            input_dim: self.input_dim,
            output_dim: self.output_dim,
            w,
            b: self.b.clone(),
        }
    }
}

/// Float dense layer with ReLU applied to its input.
pub struct FloatDenseLayer {
    pub input_dim: usize,
    pub output_dim: usize,
    /// Row-major, input fastest.
    pub w: Box<[f32]>,
    pub b: Box<[f32]>,
}

impl FloatDenseLayer {
    #[must_use]
    pub fn zeroed(input_dim: usize, output_dim: usize) -> Self {
        FloatDenseLayer {
            input_dim,
            output_dim,
            w: vec![0.0; input_dim * output_dim].into_boxed_slice(),
            b: vec![0.0; output_dim].into_boxed_slice(),
        }
    }

    /// `out[j] = b[j] + sum_i w[j][i] * relu(x[i])`, written into `out`.
    pub fn forward_relu(&self, x: &[f32], out: &mut [f32]) {
        debug_assert_eq!(x.len(), self.input_dim);
        debug_assert_eq!(out.len(), self.output_dim);
        for (j, out_j) in out.iter_mut().enumerate() {
            let row = &self.w[j * self.input_dim..(j + 1) * self.input_dim];
            let mut acc = self.b[j];
            for (&w, &v) in row.iter().zip(x) {
                acc += w * v.max(0.0);
            }
            *out_j = acc;
        }
    }
}
