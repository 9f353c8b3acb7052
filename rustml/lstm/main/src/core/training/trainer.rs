use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::api::error::{LstmError, LstmResult};
use crate::api::optim::{LRScheduler, Optimizer};
use crate::api::types::TrainingConfig;
use crate::core::data::corpus::Corpus;
use crate::core::data::symbols::SymbolTable;
use crate::core::generator::Generator;
use crate::core::nn::cache::{CarryState, NextDeltas, StepCache};
use crate::core::nn::lstm::LstmLayer;
use crate::core::nn::params::ParamSet;
use crate::core::nn::stack::{ForwardOptions, LayerStack};
use crate::core::optim::build_optimizer;
use crate::core::optim::grad_clip::GradConditioning;
use crate::core::optim::schedulers::InverseTimeDecay;
use crate::core::serde::json::store_network_json;
use crate::core::serde::progress::{append_progress, append_sample};
use crate::core::serde::raw::store_network;
use crate::core::training::metrics::LossTracker;

/// Summary of a finished training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub iterations: u64,
    pub epochs: u64,
    pub loss: f64,
    pub record_loss: f64,
    pub record_iteration: u64,
    /// Training ended on an external stop request.
    pub interrupted: bool,
}

/// Buffers of one truncated-BPTT window, all indexed output-first.
struct BpttState {
    rings: Vec<Vec<StepCache>>,
    deltas: Vec<NextDeltas>,
    carry: Vec<CarryState>,
    grads: Vec<ParamSet>,
    entry: Vec<ParamSet>,
}

impl BpttState {
    fn new(stack: &LayerStack, mini_batch_size: usize) -> Self {
        Self {
            rings: stack.cache_rings(mini_batch_size + 1),
            deltas: stack.next_deltas(),
            carry: stack
                .layers()
                .iter()
                .map(|l| CarryState::new(l.neurons()))
                .collect(),
            grads: stack.zeroed_params(),
            entry: stack.zeroed_params(),
        }
    }

    /// Seed slot 0 of every layer with the carried state or zeros.
    fn start_batch(&mut self, stateful: bool) {
        for (ring, carry) in self.rings.iter_mut().zip(&self.carry) {
            if stateful {
                carry.restore(&mut ring[0]);
            } else {
                ring[0].reset_state();
            }
        }
    }

    fn save_carry(&mut self, last_slot: usize) {
        for (carry, ring) in self.carry.iter_mut().zip(&self.rings) {
            carry.write(&ring[last_slot]);
        }
    }

    fn zero_gradients(&mut self) {
        for g in &mut self.grads {
            g.zero();
        }
        for d in &mut self.deltas {
            d.zero();
        }
    }
}

/// Mini-batch truncated-BPTT trainer over one continuous symbol stream.
///
/// The trainer never touches global state: an optional shared stop flag is
/// polled between iterations, and a raised flag stores the network before
/// [`Trainer::train`] returns.
pub struct Trainer {
    config: TrainingConfig,
    rng: StdRng,
    stop: Option<Arc<AtomicBool>>,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> LstmResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            rng,
            stop: None,
        })
    }

    /// Observe `flag` between iterations.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Random source used for initialization and sampling.
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn forward_options(&self) -> ForwardOptions {
        ForwardOptions {
            temperature: self.config.softmax_temperature,
            stable_softmax: self.config.stable_softmax,
            interlayer: self.config.interlayer,
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Train `stack` on `corpus` until the iteration or epoch bound, or a
    /// stop request.
    pub fn train(
        &mut self,
        stack: &mut LayerStack,
        symbols: &SymbolTable,
        corpus: &Corpus,
    ) -> LstmResult<TrainingOutcome> {
        if corpus.is_empty() {
            return Err(LstmError::EmptyCorpus);
        }
        if stack.features() != symbols.features() || stack.classes() != symbols.features() {
            return Err(LstmError::ShapeMismatch {
                expected: vec![symbols.features(), symbols.features()],
                got: vec![stack.features(), stack.classes()],
            });
        }

        let cfg = self.config.clone();
        let opts = self.forward_options();
        let tp = corpus.len();
        let mbs = cfg.mini_batch_size;

        let mut state = BpttState::new(stack, mbs);
        let mut optimizers: Vec<Box<dyn Optimizer>> = stack
            .layers()
            .iter()
            .map(|l| build_optimizer(&cfg, l.params()))
            .collect();
        let mut scheduler = cfg
            .decrease_lr
            .then(|| InverseTimeDecay::new(cfg.learning_rate, cfg.learning_rate_decrease));
        let conditioning = GradConditioning::from_config(&cfg);
        let mut tracker = LossTracker::new(cfg.loss_moving_avg);
        let mut input = vec![0.0; stack.features()];

        let mut i = 0usize;
        let mut n = 0u64;
        let mut epoch = 0u64;
        let mut interrupted = false;

        while n < cfg.iterations {
            if cfg.epochs > 0 && epoch >= cfg.epochs {
                break;
            }
            if self.stop_requested() {
                log::info!("Stop requested at iteration {}, storing the network", n);
                self.store(stack, symbols)?;
                interrupted = true;
                break;
            }

            let b = i;
            let trailing = if i + mbs >= tp { tp - i } else { mbs };

            state.start_batch(cfg.stateful);

            let mut batch_loss = 0.0;
            for q in 0..trailing {
                let k = (b + q) % tp;
                input.fill(0.0);
                input[corpus.input(k)] = 1.0;
                stack.forward_step(&input, &mut state.rings, q, q + 1, opts);
                batch_loss += LstmLayer::loss(&state.rings[0][q + 1], corpus.target(k));
            }
            batch_loss /= (trailing + 1) as f64;
            let loss = tracker.update(n, batch_loss);

            if cfg.stateful {
                state.save_carry(trailing);
            }

            state.zero_gradients();
            for q in (1..=trailing).rev() {
                let k = (b + q - 1) % tp;
                stack.backward_step(
                    &state.rings,
                    q,
                    corpus.target(k),
                    cfg.interlayer,
                    &mut state.entry,
                    &mut state.grads,
                    &mut state.deltas,
                );
            }

            let layers = stack.layers_mut().iter_mut().zip(optimizers.iter_mut());
            for (p, (layer, optimizer)) in layers.enumerate() {
                if conditioning.apply(&mut state.grads[p], layer.params()) {
                    log::debug!("Iteration {}: layer {} gradients clipped", n, p + 1);
                }
                optimizer.step(layer.params_mut(), &state.grads[p], n);
            }

            if cfg.print_progress && n % cfg.print_every == 0 {
                let lr = optimizers.first().map_or(cfg.learning_rate, |o| o.lr());
                self.report(stack, symbols, corpus.input(b), n, epoch, &tracker, lr)?;
            }
            if cfg.store_progress_every > 0 && n % cfg.store_progress_every == 0 {
                append_progress(&cfg.progress_file, n, loss)?;
            }
            if cfg.store_network_every > 0 && n % cfg.store_network_every == 0 {
                self.store(stack, symbols)?;
            }

            if b + mbs >= tp {
                epoch += 1;
            }
            i = (b + mbs) % tp;
            if i < mbs {
                i = 0;
            }

            if let Some(scheduler) = scheduler.as_mut() {
                for optimizer in optimizers.iter_mut() {
                    scheduler.step(&mut **optimizer, n);
                }
                log::debug!("Iteration {}: learning rate {:.8}", n, scheduler.get_lr());
            }

            n += 1;
        }

        if cfg.store_network_every == 0 && !interrupted {
            self.store(stack, symbols)?;
        }

        log::info!("Loss after training: {:.6}", tracker.loss());

        Ok(TrainingOutcome {
            iterations: n,
            epochs: epoch,
            loss: tracker.loss(),
            record_loss: tracker.record(),
            record_iteration: tracker.record_iteration(),
            interrupted,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &mut self,
        stack: &mut LayerStack,
        symbols: &SymbolTable,
        first: usize,
        n: u64,
        epoch: u64,
        tracker: &LossTracker,
        lr: f64,
    ) -> LstmResult<()> {
        log::info!(
            "Iteration: {} (epoch: {}), Loss: {:.6}, record: {:.6} (iteration: {}), LR: {:.6}",
            n,
            epoch,
            tracker.loss(),
            tracker.record(),
            tracker.record_iteration(),
            lr,
        );

        let to_file = self.config.sample_output_file.clone();
        if !self.config.print_sample_output && to_file.is_none() {
            return Ok(());
        }

        let opts = self.forward_options();
        let sample = Generator::new(stack, symbols)
            .with_options(opts)
            .with_strategy(self.config.sampling)
            .generate_from_index(first, self.config.sample_output_chars, &mut self.rng);

        if self.config.print_sample_output {
            log::info!(
                "Sample:\n=====================================================\n{}\n=====================================================",
                String::from_utf8_lossy(&sample)
            );
        }
        if let Some(path) = to_file {
            append_sample(path, n, tracker.loss(), &sample)?;
        }
        Ok(())
    }

    /// Write the raw and JSON network files named in the configuration.
    pub fn store(&self, stack: &LayerStack, symbols: &SymbolTable) -> LstmResult<()> {
        store_network(&self.config.network_raw_path, stack, symbols)?;
        store_network_json(
            &self.config.network_json_path,
            stack,
            symbols,
            &self.config.feature_map_key,
        )?;
        log::info!(
            "Stored network to {} and {}",
            self.config.network_raw_path.display(),
            self.config.network_json_path.display()
        );
        Ok(())
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// One-line description of a stack for the startup log.
pub fn network_summary(stack: &LayerStack) -> String {
    let neurons = stack
        .neurons()
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} Layers, Neurons: [{}], Features: {}, Parameter memory: {}",
        stack.len(),
        neurons,
        stack.features(),
        format_bytes(stack.parameter_bytes())
    )
}
