// SAF (Simple API Facade): re-exports for convenient access

// API traits and types
pub use crate::api::error::{LstmError, LstmResult};
pub use crate::api::optim::{LRScheduler, Optimizer};
pub use crate::api::types::{
    DEFAULT_SYMBOL_CAPACITY, Interlayer, MAX_LAYERS, NET_FILE_VERSION, OptimizerKind,
    SamplingStrategy, TrainingConfig,
};

// Numeric kernels
pub use crate::core::math::{dense, vector};

// Network
pub use crate::core::nn::cache::{CarryState, NextDeltas, StepCache};
pub use crate::core::nn::lstm::{LstmLayer, OutputActivation, Upstream};
pub use crate::core::nn::params::{PARAM_BUFFERS, PARAM_NAMES, ParamSet};
pub use crate::core::nn::stack::{ForwardOptions, LayerStack};

// Optimizers
pub use crate::core::optim::adam::Adam;
pub use crate::core::optim::build_optimizer;
pub use crate::core::optim::grad_clip::GradConditioning;
pub use crate::core::optim::schedulers::InverseTimeDecay;
pub use crate::core::optim::sgd::MomentumSgd;

// Data
pub use crate::core::data::corpus::Corpus;
pub use crate::core::data::symbols::SymbolTable;

// Training and generation
pub use crate::core::generator::Generator;
pub use crate::core::training::metrics::LossTracker;
pub use crate::core::training::trainer::{Trainer, TrainingOutcome, format_bytes, network_summary};

// Serialization
pub use crate::core::serde::json::{network_to_json, store_network_json};
pub use crate::core::serde::progress::{append_progress, append_sample};
pub use crate::core::serde::raw::{
    LoadedNetwork, decode_network, encode_network, load_network, store_network,
};
