//! # RustML LSTM
//!
//! Character-level multi-layer LSTM training and generation on `f64`
//! buffers, with truncated backpropagation through time over one continuous
//! symbol stream.
//!
//! The crate provides:
//! - LSTM layers with explicit per-timestep caches and backward passes
//! - Layer stacks indexed output-first with vocabulary expansion
//! - Adam and momentum SGD with clip/fit/L2 gradient conditioning
//! - A stateful mini-batch trainer with checkpointing and progress files
//! - A raw network file format plus a JSON export
//!
//! ## Example
//!
//! ```rust,ignore
//! use rustml_lstm::{Corpus, LayerStack, SymbolTable, Trainer, TrainingConfig};
//!
//! let mut symbols = SymbolTable::new();
//! let corpus = Corpus::from_file("input.txt", &mut symbols)?;
//! let mut trainer = Trainer::new(TrainingConfig::default())?;
//! let config = trainer.config().clone();
//! let mut stack = LayerStack::new(
//!     symbols.features(), config.neurons, config.layers, false, trainer.rng_mut(),
//! )?;
//! let outcome = trainer.train(&mut stack, &symbols, &corpus)?;
//! ```

pub mod api;
mod core;
mod saf;

pub use saf::*;
