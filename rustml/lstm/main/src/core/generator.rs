//! Autoregressive symbol generation through a trained stack.

use rand::Rng;

use crate::api::types::SamplingStrategy;
use crate::core::data::symbols::SymbolTable;
use crate::core::nn::cache::StepCache;
use crate::core::nn::stack::{ForwardOptions, LayerStack};

/// Feeds symbols through the stack one at a time, keeping recurrent state
/// in two cache slots per layer that swap roles every step.
pub struct Generator<'a> {
    stack: &'a mut LayerStack,
    symbols: &'a SymbolTable,
    rings: Vec<Vec<StepCache>>,
    input: Vec<f64>,
    step: usize,
    options: ForwardOptions,
    strategy: SamplingStrategy,
}

impl<'a> Generator<'a> {
    pub fn new(stack: &'a mut LayerStack, symbols: &'a SymbolTable) -> Self {
        let rings = stack.cache_rings(2);
        let input = vec![0.0; stack.features()];
        Self {
            stack,
            symbols,
            rings,
            input,
            step: 0,
            options: ForwardOptions::default(),
            strategy: SamplingStrategy::Weighted,
        }
    }

    pub fn with_options(mut self, options: ForwardOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Feed one symbol index, or a zero vector for `None`, and return the
    /// output distribution.
    pub fn feed(&mut self, index: Option<usize>) -> &[f64] {
        self.input.fill(0.0);
        if let Some(i) = index {
            self.input[i] = 1.0;
        }
        let prev = self.step % 2;
        let cur = (self.step + 1) % 2;
        self.stack
            .forward_step(&self.input, &mut self.rings, prev, cur, self.options);
        self.step += 1;
        &self.rings[0][cur].probs
    }

    /// Pick the next index from the latest distribution.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let probs = &self.rings[0][self.step % 2].probs;
        match self.strategy {
            SamplingStrategy::Weighted => self.symbols.probability_choice(probs, rng),
            SamplingStrategy::Greedy => self.symbols.greedy_argmax(probs),
        }
    }

    /// Generate `count` symbols, the first conditioned on symbol `first`.
    pub fn generate_from_index<R: Rng + ?Sized>(
        &mut self,
        first: usize,
        count: usize,
        rng: &mut R,
    ) -> Vec<u8> {
        let mut index = if first < self.symbols.features() {
            first
        } else {
            log::warn!("Symbol index {} outside the vocabulary, starting from 0", first);
            0
        };
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            self.feed(Some(index));
            index = self.pick(rng);
            out.extend(self.symbols.symbol_at(index));
        }
        out
    }

    /// Prime the state with `seed`, then generate one symbol plus `count`
    /// continuations. The returned text starts with the seed.
    ///
    /// Seed bytes missing from the vocabulary are fed as zero vectors.
    pub fn generate_from_seed<R: Rng + ?Sized>(
        &mut self,
        seed: &[u8],
        count: usize,
        rng: &mut R,
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(seed.len() + count + 1);
        out.extend_from_slice(seed);
        for &byte in seed {
            let index = self.symbols.index_of(byte);
            if index.is_none() {
                log::warn!("Seed symbol {:?} not in the vocabulary", byte as char);
            }
            self.feed(index);
        }

        let mut index = if self.step > 0 {
            self.pick(rng)
        } else {
            0
        };
        out.extend(self.symbols.symbol_at(index));
        for _ in 0..count {
            self.feed(Some(index));
            index = self.pick(rng);
            out.extend(self.symbols.symbol_at(index));
        }
        out
    }
}
