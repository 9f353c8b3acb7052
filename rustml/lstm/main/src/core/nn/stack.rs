//! Stacked LSTM layers and the per-timestep sweeps through them.

use rand::Rng;

use crate::api::error::{LstmError, LstmResult};
use crate::api::types::{Interlayer, MAX_LAYERS};
use crate::core::nn::cache::{NextDeltas, StepCache};
use crate::core::nn::lstm::{LstmLayer, OutputActivation, Upstream};
use crate::core::nn::params::ParamSet;

/// Options shared by every forward step of a run.
#[derive(Debug, Clone, Copy)]
pub struct ForwardOptions {
    pub temperature: f64,
    pub stable_softmax: bool,
    pub interlayer: Interlayer,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            stable_softmax: false,
            interlayer: Interlayer::Linear,
        }
    }
}

/// A stack of LSTM layers, indexed output-first.
///
/// Index `0` is the output layer (its `Y` is the feature count and it ends in
/// a softmax). The last index is the input layer (its `X` is the feature
/// count and it reads the one-hot input). Layer `p` reads the output of layer
/// `p + 1`, so `layers[p].input_size() == layers[p + 1].output_size()`.
///
/// Use [`LayerStack::output_layer`] and [`LayerStack::input_layer`] instead of
/// raw indices where the role matters.
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<LstmLayer>,
}

impl LayerStack {
    /// Build `layers` layers of `neurons` cells over a `features`-symbol
    /// vocabulary. `zero_init` leaves every weight at zero.
    pub fn new<R: Rng + ?Sized>(
        features: usize,
        neurons: usize,
        layers: usize,
        zero_init: bool,
        rng: &mut R,
    ) -> LstmResult<Self> {
        if layers == 0 || layers > MAX_LAYERS {
            return Err(LstmError::InvalidConfig(format!(
                "layer count must be in 1..={MAX_LAYERS}, got {layers}"
            )));
        }
        if features == 0 || neurons == 0 {
            return Err(LstmError::InvalidConfig(
                "feature and neuron counts must be > 0".into(),
            ));
        }

        let stack = (0..layers)
            .map(|p| {
                let (x, y) = match (layers, p) {
                    (1, _) => (features, features),
                    (_, 0) => (neurons, features),
                    (_, p) if p == layers - 1 => (features, neurons),
                    _ => (neurons, neurons),
                };
                if zero_init {
                    LstmLayer::zeros(x, neurons, y)
                } else {
                    LstmLayer::random(x, neurons, y, rng)
                }
            })
            .collect();

        Ok(Self { layers: stack })
    }

    /// Wrap existing layers, checking that adjacent widths line up.
    pub fn from_layers(layers: Vec<LstmLayer>) -> LstmResult<Self> {
        if layers.is_empty() || layers.len() > MAX_LAYERS {
            return Err(LstmError::InvalidConfig(format!(
                "layer count must be in 1..={MAX_LAYERS}, got {}",
                layers.len()
            )));
        }
        for p in 0..layers.len() - 1 {
            let consumer = layers[p].input_size();
            let producer = layers[p + 1].output_size();
            if consumer != producer {
                return Err(LstmError::ShapeMismatch {
                    expected: vec![consumer],
                    got: vec![producer],
                });
            }
        }
        Ok(Self { layers })
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[LstmLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [LstmLayer] {
        &mut self.layers
    }

    pub fn output_layer(&self) -> &LstmLayer {
        &self.layers[0]
    }

    pub fn input_layer(&self) -> &LstmLayer {
        &self.layers[self.layers.len() - 1]
    }

    /// Width of the one-hot input.
    pub fn features(&self) -> usize {
        self.input_layer().input_size()
    }

    /// Width of the output distribution.
    pub fn classes(&self) -> usize {
        self.output_layer().output_size()
    }

    pub fn neurons(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.neurons()).collect()
    }

    /// Bytes held by the parameters of every layer.
    pub fn parameter_bytes(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.params().len() * std::mem::size_of::<f64>())
            .sum()
    }

    /// Zero-filled parameter sets matching every layer, output-first.
    pub fn zeroed_params(&self) -> Vec<ParamSet> {
        self.layers
            .iter()
            .map(|l| ParamSet::zeros(l.input_size(), l.neurons(), l.output_size()))
            .collect()
    }

    /// Cache rings with `slots` entries per layer.
    pub fn cache_rings(&self, slots: usize) -> Vec<Vec<StepCache>> {
        self.layers
            .iter()
            .map(|l| {
                (0..slots)
                    .map(|_| StepCache::new(l.input_size(), l.neurons(), l.output_size()))
                    .collect()
            })
            .collect()
    }

    pub fn next_deltas(&self) -> Vec<NextDeltas> {
        self.layers
            .iter()
            .map(|l| NextDeltas::new(l.input_size(), l.neurons()))
            .collect()
    }

    /// Grow the vocabulary to `features` symbols.
    ///
    /// The input layer gains gate columns, the output layer gains `Wy` rows.
    /// Returns `false` when the stack already has that many features.
    pub fn expand_vocabulary<R: Rng + ?Sized>(
        &mut self,
        features: usize,
        rng: &mut R,
    ) -> LstmResult<bool> {
        let current = self.features();
        let classes = self.classes();
        if features < current || features < classes {
            return Err(LstmError::ShapeMismatch {
                expected: vec![current, classes],
                got: vec![features],
            });
        }
        if features == current && features == classes {
            return Ok(false);
        }

        let last = self.layers.len() - 1;
        if last == 0 {
            self.layers[0].expand(features, features, rng);
        } else {
            let out = &mut self.layers[0];
            let x = out.input_size();
            out.expand(x, features, rng);
            let inp = &mut self.layers[last];
            let y = inp.output_size();
            inp.expand(features, y, rng);
        }
        Ok(true)
    }

    /// Forward one timestep through every layer, input layer first.
    ///
    /// `rings[p][prev]` supplies layer `p`'s previous state and
    /// `rings[p][cur]` receives the new step. The output distribution ends up
    /// in `rings[0][cur].probs`.
    pub fn forward_step(
        &mut self,
        input: &[f64],
        rings: &mut [Vec<StepCache>],
        prev: usize,
        cur: usize,
        opts: ForwardOptions,
    ) {
        let top = self.layers.len() - 1;
        for p in (0..=top).rev() {
            let activation = if p == 0 {
                OutputActivation::Softmax {
                    temperature: opts.temperature,
                    stable: opts.stable_softmax,
                }
            } else {
                OutputActivation::interlayer(opts.interlayer)
            };

            let (below, above) = rings.split_at_mut(p + 1);
            let (prev_cache, cur_cache) = slot_pair(&mut below[p], prev, cur);
            let layer_input: &[f64] = if p == top { input } else { &above[0][cur].probs };
            self.layers[p].forward(layer_input, prev_cache, cur_cache, activation);
        }
    }

    /// Backward one timestep through every layer, output layer first.
    ///
    /// Per-layer step gradients land in `entry` and are summed into `grads`.
    pub fn backward_step(
        &mut self,
        rings: &[Vec<StepCache>],
        slot: usize,
        target: usize,
        interlayer: Interlayer,
        entry: &mut [ParamSet],
        grads: &mut [ParamSet],
        deltas: &mut [NextDeltas],
    ) {
        for p in 0..self.layers.len() {
            let (below, current) = deltas.split_at_mut(p);
            let upstream = match below.last() {
                None => Upstream::Target(target),
                Some(d) => Upstream::Delta(&d.dldy_pass),
            };
            self.layers[p].backward(
                upstream,
                interlayer,
                &rings[p][slot],
                &mut entry[p],
                &mut current[0],
            );
            grads[p].accumulate(&entry[p]);
        }
    }
}

/// Borrow `ring[prev]` shared and `ring[cur]` exclusively.
fn slot_pair(ring: &mut [StepCache], prev: usize, cur: usize) -> (&StepCache, &mut StepCache) {
    debug_assert_ne!(prev, cur);
    if prev < cur {
        let (lo, hi) = ring.split_at_mut(cur);
        (&lo[prev], &mut hi[0])
    } else {
        let (lo, hi) = ring.split_at_mut(prev);
        (&hi[0], &mut lo[cur])
    }
}
