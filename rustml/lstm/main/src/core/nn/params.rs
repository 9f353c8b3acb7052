//! Parameter set of one stacked LSTM layer.
//!
//! The same structure doubles as gradient accumulator and optimizer moment
//! buffer, so every operation here is shape-generic over the four gate
//! matrices, the output projection and the five bias vectors.

use rand::Rng;

use crate::core::math::vector;
use crate::core::nn::init::random_vector;

/// Number of parameter buffers in a layer.
pub const PARAM_BUFFERS: usize = 10;

/// Buffer names in storage order.
pub const PARAM_NAMES: [&str; PARAM_BUFFERS] =
    ["Wy", "Wi", "Wc", "Wo", "Wf", "by", "bi", "bc", "bf", "bo"];

/// Weights and biases of one layer.
///
/// Gate matrices are `n x s` row-major with columns `0..n` reading the
/// previous hidden state and columns `n..s` reading the layer input.
/// `wy` is `y x n`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSet {
    x: usize,
    n: usize,
    y: usize,
    pub wy: Vec<f64>,
    pub wi: Vec<f64>,
    pub wc: Vec<f64>,
    pub wo: Vec<f64>,
    pub wf: Vec<f64>,
    pub by: Vec<f64>,
    pub bi: Vec<f64>,
    pub bc: Vec<f64>,
    pub bf: Vec<f64>,
    pub bo: Vec<f64>,
}

impl ParamSet {
    pub fn zeros(x: usize, n: usize, y: usize) -> Self {
        let s = x + n;
        Self {
            x,
            n,
            y,
            wy: vec![0.0; y * n],
            wi: vec![0.0; n * s],
            wc: vec![0.0; n * s],
            wo: vec![0.0; n * s],
            wf: vec![0.0; n * s],
            by: vec![0.0; y],
            bi: vec![0.0; n],
            bc: vec![0.0; n],
            bf: vec![0.0; n],
            bo: vec![0.0; n],
        }
    }

    /// Random gate and projection weights, zero biases.
    pub fn random<R: Rng + ?Sized>(x: usize, n: usize, y: usize, rng: &mut R) -> Self {
        let s = x + n;
        let mut set = Self::zeros(x, n, y);
        set.wf = random_vector(n * s, s, rng);
        set.wi = random_vector(n * s, s, rng);
        set.wc = random_vector(n * s, s, rng);
        set.wo = random_vector(n * s, s, rng);
        set.wy = random_vector(y * n, n, rng);
        set
    }

    pub fn input_size(&self) -> usize {
        self.x
    }

    pub fn neurons(&self) -> usize {
        self.n
    }

    pub fn output_size(&self) -> usize {
        self.y
    }

    /// `x + n`, the width of the concatenated gate input.
    pub fn concat_size(&self) -> usize {
        self.x + self.n
    }

    /// Total number of scalars across all buffers.
    pub fn len(&self) -> usize {
        self.buffers().iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffers in storage order: `Wy, Wi, Wc, Wo, Wf, by, bi, bc, bf, bo`.
    pub fn buffers(&self) -> [&[f64]; PARAM_BUFFERS] {
        [
            &self.wy, &self.wi, &self.wc, &self.wo, &self.wf, &self.by, &self.bi, &self.bc,
            &self.bf, &self.bo,
        ]
    }

    pub fn buffers_mut(&mut self) -> [&mut [f64]; PARAM_BUFFERS] {
        [
            &mut self.wy,
            &mut self.wi,
            &mut self.wc,
            &mut self.wo,
            &mut self.wf,
            &mut self.by,
            &mut self.bi,
            &mut self.bc,
            &mut self.bf,
            &mut self.bo,
        ]
    }

    pub fn zero(&mut self) {
        for buf in self.buffers_mut() {
            vector::zero(buf);
        }
    }

    /// Elementwise `self += other`.
    pub fn accumulate(&mut self, other: &ParamSet) {
        for (dst, src) in self.buffers_mut().into_iter().zip(other.buffers()) {
            vector::add(dst, src);
        }
    }

    /// Per-element clamp of every buffer. Returns whether any buffer changed.
    pub fn clip(&mut self, limit: f64) -> bool {
        let mut clipped = false;
        for buf in self.buffers_mut() {
            clipped |= vector::clip(buf, limit);
        }
        clipped
    }

    /// Per-buffer L1 rescale. Returns whether any buffer was rescaled.
    pub fn fit(&mut self, limit: f64) -> bool {
        let mut fitted = false;
        for buf in self.buffers_mut() {
            fitted |= vector::fit(buf, limit);
        }
        fitted
    }

    /// L2 penalty gradient: `self += lambda * params`.
    pub fn regularize(&mut self, params: &ParamSet, lambda: f64) {
        for (dst, src) in self.buffers_mut().into_iter().zip(params.buffers()) {
            vector::add_scaled(dst, src, lambda);
        }
    }

    /// Grow the input width to `new_x` and the output width to `new_y`.
    ///
    /// The learned sub-block is kept in place; new gate columns and new `Wy`
    /// rows are drawn like a fresh layer, new `by` entries start at zero.
    pub fn expand<R: Rng + ?Sized>(&mut self, new_x: usize, new_y: usize, rng: &mut R) {
        let mut grown = Self::random(new_x, self.n, new_y, rng);
        let n = self.n;
        let old_s = self.concat_size();
        let new_s = grown.concat_size();
        debug_assert!(new_s >= old_s && grown.y >= self.y);

        let gates = [
            (&self.wf, &mut grown.wf),
            (&self.wi, &mut grown.wi),
            (&self.wc, &mut grown.wc),
            (&self.wo, &mut grown.wo),
        ];
        for (old, new) in gates {
            for row in 0..n {
                new[row * new_s..row * new_s + old_s]
                    .copy_from_slice(&old[row * old_s..(row + 1) * old_s]);
            }
        }
        grown.wy[..self.y * n].copy_from_slice(&self.wy);
        grown.by[..self.y].copy_from_slice(&self.by);
        grown.bf.copy_from_slice(&self.bf);
        grown.bi.copy_from_slice(&self.bi);
        grown.bc.copy_from_slice(&self.bc);
        grown.bo.copy_from_slice(&self.bo);

        *self = grown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_buffer_lengths_match_dimensions() {
        let set = ParamSet::random(5, 3, 7, &mut StdRng::seed_from_u64(1));
        let s = 8;
        let expected = [7 * 3, 3 * s, 3 * s, 3 * s, 3 * s, 7, 3, 3, 3, 3];
        for (buf, len) in set.buffers().iter().zip(expected) {
            assert_eq!(buf.len(), len);
        }
        assert_eq!(set.concat_size(), set.input_size() + set.neurons());
        assert_eq!(set.len(), expected.iter().sum::<usize>());
    }

    #[test]
    fn test_random_biases_start_at_zero() {
        let set = ParamSet::random(4, 4, 4, &mut StdRng::seed_from_u64(2));
        assert!(set.by.iter().chain(&set.bf).all(|&v| v == 0.0));
        assert!(set.wf.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_accumulate_and_regularize() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = ParamSet::random(2, 2, 2, &mut rng);
        let mut grads = ParamSet::zeros(2, 2, 2);
        grads.accumulate(&params);
        grads.accumulate(&params);
        assert_eq!(grads.wc[1], 2.0 * params.wc[1]);

        grads.zero();
        grads.regularize(&params, 0.5);
        assert_eq!(grads.wo[3], 0.5 * params.wo[3]);
    }

    #[test]
    fn test_expand_keeps_learned_block() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut set = ParamSet::random(3, 2, 3, &mut rng);
        set.by = vec![0.1, 0.2, 0.3];
        let before = set.clone();

        set.expand(5, 6, &mut rng);
        assert_eq!(set.input_size(), 5);
        assert_eq!(set.output_size(), 6);
        assert_eq!(set.wf.len(), 2 * 7);
        for row in 0..2 {
            assert_eq!(&set.wf[row * 7..row * 7 + 5], &before.wf[row * 5..(row + 1) * 5]);
        }
        assert_eq!(&set.wy[..6], &before.wy[..]);
        assert_eq!(&set.by[..3], &[0.1, 0.2, 0.3]);
        assert_eq!(&set.by[3..], &[0.0; 3]);
        assert!(set.buffers().iter().all(|b| b.iter().all(|v| v.is_finite())));
    }
}
