use rand::Rng;

use crate::api::types::Interlayer;
use crate::core::math::dense::{
    cross_entropy, fully_connected_backward, fully_connected_forward, sigmoid_backward,
    sigmoid_forward, softmax_forward, softmax_loss_backward, tanh_backward, tanh_forward,
};
use crate::core::math::vector;
use crate::core::nn::cache::{NextDeltas, StepCache};
use crate::core::nn::params::ParamSet;

/// How a layer turns `Wy·h + by` into its output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputActivation {
    Softmax { temperature: f64, stable: bool },
    Linear,
    Sigmoid,
}

impl OutputActivation {
    /// Activation for a layer that feeds another layer.
    pub fn interlayer(mode: Interlayer) -> Self {
        match mode {
            Interlayer::Linear => OutputActivation::Linear,
            Interlayer::Sigmoid => OutputActivation::Sigmoid,
        }
    }
}

/// Where the output gradient of a backward step comes from.
#[derive(Debug, Clone, Copy)]
pub enum Upstream<'a> {
    /// Output layer: softmax + cross-entropy against this class.
    Target(usize),
    /// Inner layer: `dldY_pass` of the layer this one feeds.
    Delta(&'a [f64]),
}

/// Named scratch buffers reused by every backward step.
#[derive(Debug, Clone)]
struct Scratch {
    pre_gate: Vec<f64>,
    pre_out: Vec<f64>,
    dldy: Vec<f64>,
    dldh: Vec<f64>,
    dldc: Vec<f64>,
    dldho: Vec<f64>,
    dldhf: Vec<f64>,
    dldhi: Vec<f64>,
    dldhc: Vec<f64>,
    prod: Vec<f64>,
    dldxf: Vec<f64>,
    dldxi: Vec<f64>,
    dldxc: Vec<f64>,
    dldxo: Vec<f64>,
    dldx: Vec<f64>,
}

impl Scratch {
    fn new(x: usize, n: usize, y: usize) -> Self {
        let s = x + n;
        Self {
            pre_gate: vec![0.0; n],
            pre_out: vec![0.0; y],
            dldy: vec![0.0; y],
            dldh: vec![0.0; n],
            dldc: vec![0.0; n],
            dldho: vec![0.0; n],
            dldhf: vec![0.0; n],
            dldhi: vec![0.0; n],
            dldhc: vec![0.0; n],
            prod: vec![0.0; n],
            dldxf: vec![0.0; s],
            dldxi: vec![0.0; s],
            dldxc: vec![0.0; s],
            dldxo: vec![0.0; s],
            dldx: vec![0.0; s],
        }
    }
}

/// One LSTM layer: parameters plus the scratch its kernels write into.
///
/// Forward and backward operate on one timestep; the caller owns the cache
/// ring and walks it.
#[derive(Debug, Clone)]
pub struct LstmLayer {
    params: ParamSet,
    scratch: Scratch,
}

impl LstmLayer {
    pub fn from_params(params: ParamSet) -> Self {
        let scratch = Scratch::new(params.input_size(), params.neurons(), params.output_size());
        Self { params, scratch }
    }

    pub fn random<R: Rng + ?Sized>(x: usize, n: usize, y: usize, rng: &mut R) -> Self {
        Self::from_params(ParamSet::random(x, n, y, rng))
    }

    pub fn zeros(x: usize, n: usize, y: usize) -> Self {
        Self::from_params(ParamSet::zeros(x, n, y))
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    pub fn input_size(&self) -> usize {
        self.params.input_size()
    }

    pub fn neurons(&self) -> usize {
        self.params.neurons()
    }

    pub fn output_size(&self) -> usize {
        self.params.output_size()
    }

    /// One forward timestep: read `prev`'s state, write everything into `out`.
    pub fn forward(
        &mut self,
        input: &[f64],
        prev: &StepCache,
        out: &mut StepCache,
        activation: OutputActivation,
    ) {
        let n = self.neurons();
        let p = &self.params;
        let s = &mut self.scratch;
        debug_assert_eq!(input.len(), p.input_size());

        out.x[..n].copy_from_slice(&prev.h);
        out.x[n..].copy_from_slice(input);
        out.h_old.copy_from_slice(&prev.h);
        out.c_old.copy_from_slice(&prev.c);

        fully_connected_forward(&mut s.pre_gate, &p.wf, &out.x, &p.bf);
        sigmoid_forward(&mut out.hf, &s.pre_gate);
        fully_connected_forward(&mut s.pre_gate, &p.wi, &out.x, &p.bi);
        sigmoid_forward(&mut out.hi, &s.pre_gate);
        fully_connected_forward(&mut s.pre_gate, &p.wo, &out.x, &p.bo);
        sigmoid_forward(&mut out.ho, &s.pre_gate);
        fully_connected_forward(&mut s.pre_gate, &p.wc, &out.x, &p.bc);
        tanh_forward(&mut out.hc, &s.pre_gate);

        // c = hf ⊙ c_old + hi ⊙ hc
        vector::hadamard(&mut out.c, &out.hf, &out.c_old);
        vector::hadamard(&mut s.prod, &out.hi, &out.hc);
        vector::add(&mut out.c, &s.prod);

        tanh_forward(&mut out.tanh_c, &out.c);
        vector::hadamard(&mut out.h, &out.ho, &out.tanh_c);

        fully_connected_forward(&mut s.pre_out, &p.wy, &out.h, &p.by);
        match activation {
            OutputActivation::Softmax { temperature, stable } => {
                softmax_forward(&mut out.probs, &s.pre_out, temperature, stable);
            }
            OutputActivation::Linear => out.probs.copy_from_slice(&s.pre_out),
            OutputActivation::Sigmoid => {
                sigmoid_forward(&mut out.probs, &s.pre_out);
                out.interlayer_sigmoid.copy_from_slice(&out.probs);
            }
        }
    }

    /// One backward timestep.
    ///
    /// `grads` is overwritten with this step's gradients. `deltas` holds the
    /// incoming `dldh_next`/`dldc_next` on entry and the outgoing ones plus
    /// `dldY_pass` on return.
    pub fn backward(
        &mut self,
        upstream: Upstream<'_>,
        interlayer: Interlayer,
        cache: &StepCache,
        grads: &mut ParamSet,
        deltas: &mut NextDeltas,
    ) {
        let n = self.neurons();
        let p = &self.params;
        let s = &mut self.scratch;

        match upstream {
            Upstream::Target(correct) => softmax_loss_backward(&cache.probs, correct, &mut s.dldy),
            Upstream::Delta(dldy) => match interlayer {
                Interlayer::Sigmoid => {
                    sigmoid_backward(dldy, &cache.interlayer_sigmoid, &mut s.dldy)
                }
                Interlayer::Linear => s.dldy.copy_from_slice(dldy),
            },
        }

        fully_connected_backward(&s.dldy, &p.wy, &cache.h, &mut grads.wy, &mut s.dldh, &mut grads.by);
        vector::add(&mut s.dldh, &deltas.dldh);

        // dldho = σ'(ho) ⊙ (dldh ⊙ tanh(c))
        vector::hadamard(&mut s.prod, &s.dldh, &cache.tanh_c);
        sigmoid_backward(&s.prod, &cache.ho, &mut s.dldho);

        // dldc = tanh'(tanh(c)) ⊙ (dldh ⊙ ho) + dldc_next
        vector::hadamard(&mut s.prod, &s.dldh, &cache.ho);
        tanh_backward(&s.prod, &cache.tanh_c, &mut s.dldc);
        vector::add(&mut s.dldc, &deltas.dldc);

        vector::hadamard(&mut s.prod, &s.dldc, &cache.c_old);
        sigmoid_backward(&s.prod, &cache.hf, &mut s.dldhf);

        vector::hadamard(&mut s.prod, &cache.hc, &s.dldc);
        sigmoid_backward(&s.prod, &cache.hi, &mut s.dldhi);

        vector::hadamard(&mut s.prod, &cache.hi, &s.dldc);
        tanh_backward(&s.prod, &cache.hc, &mut s.dldhc);

        fully_connected_backward(&s.dldhf, &p.wf, &cache.x, &mut grads.wf, &mut s.dldxf, &mut grads.bf);
        fully_connected_backward(&s.dldhi, &p.wi, &cache.x, &mut grads.wi, &mut s.dldxi, &mut grads.bi);
        fully_connected_backward(&s.dldhc, &p.wc, &cache.x, &mut grads.wc, &mut s.dldxc, &mut grads.bc);
        fully_connected_backward(&s.dldho, &p.wo, &cache.x, &mut grads.wo, &mut s.dldxo, &mut grads.bo);

        vector::copy(&mut s.dldx, &s.dldxf);
        vector::add(&mut s.dldx, &s.dldxi);
        vector::add(&mut s.dldx, &s.dldxc);
        vector::add(&mut s.dldx, &s.dldxo);

        deltas.dldh.copy_from_slice(&s.dldx[..n]);
        vector::hadamard(&mut deltas.dldc, &cache.hf, &s.dldc);
        deltas.dldy_pass.copy_from_slice(&s.dldx[n..]);
    }

    /// Cross-entropy of the distribution cached at `cache` against `correct`.
    pub fn loss(cache: &StepCache, correct: usize) -> f64 {
        cross_entropy(&cache.probs, correct)
    }

    /// Grow input and/or output width, keeping learned weights.
    pub fn expand<R: Rng + ?Sized>(&mut self, new_x: usize, new_y: usize, rng: &mut R) {
        self.params.expand(new_x, new_y, rng);
        self.scratch = Scratch::new(new_x, self.neurons(), new_y);
    }
}
