//! Configuration record and shared enums for the training entry point.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::api::error::{LstmError, LstmResult};

/// Hard upper bound on the number of stacked layers.
pub const MAX_LAYERS: usize = 10;

/// Version written on the first line of a raw network file.
pub const NET_FILE_VERSION: u32 = 1;

/// Default capacity of the symbol table.
pub const DEFAULT_SYMBOL_CAPACITY: usize = 1000;

/// Parameter update rule, selected once per training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    Adam,
    GradientDescent,
}

impl FromStr for OptimizerKind {
    type Err = LstmError;

    fn from_str(s: &str) -> LstmResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(OptimizerKind::Adam),
            "sgd" | "gd" | "gradient_descent" | "gradient-descent" => {
                Ok(OptimizerKind::GradientDescent)
            }
            other => Err(LstmError::InvalidConfig(format!(
                "unsupported optimizer '{other}' (expected 'adam' or 'sgd')"
            ))),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Adam => write!(f, "adam"),
            OptimizerKind::GradientDescent => write!(f, "sgd"),
        }
    }
}

/// Activation applied to the output projection of every non-output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interlayer {
    /// Pass `Wy·h + by` through unmodified.
    #[default]
    Linear,
    /// Squash the projection with a sigmoid before handing it up the stack.
    Sigmoid,
}

/// How the next symbol is picked from an output distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Weighted random draw over the cumulative distribution.
    #[default]
    Weighted,
    /// Always the most probable symbol.
    Greedy,
}

/// Complete configuration surface of a training run.
///
/// Every field has a default so a partial JSON file is accepted by
/// [`TrainingConfig::from_json_file`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub momentum: f64,
    pub lambda: f64,
    pub softmax_temperature: f64,
    /// Subtract the max logit before exponentiating in the output softmax.
    pub stable_softmax: bool,
    pub beta1: f64,
    pub beta2: f64,
    pub gradient_clip: bool,
    pub gradient_clip_limit: f64,
    pub gradient_fit: bool,
    pub optimizer: OptimizerKind,
    pub regularize: bool,
    pub stateful: bool,
    pub interlayer: Interlayer,
    pub decrease_lr: bool,
    pub learning_rate_decrease: f64,
    pub layers: usize,
    pub neurons: usize,
    pub mini_batch_size: usize,
    pub iterations: u64,
    /// Zero means no epoch bound.
    pub epochs: u64,
    pub loss_moving_avg: f64,

    pub print_progress: bool,
    pub print_every: u64,
    pub print_sample_output: bool,
    pub sample_output_chars: usize,
    pub sampling: SamplingStrategy,
    /// Append generated samples to this file on every report.
    pub sample_output_file: Option<PathBuf>,
    /// Zero disables the progress CSV.
    pub store_progress_every: u64,
    pub progress_file: PathBuf,
    /// Zero stores the network once, after training.
    pub store_network_every: u64,
    pub network_raw_path: PathBuf,
    pub network_json_path: PathBuf,
    pub feature_map_key: String,
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            momentum: 0.0,
            lambda: 0.05,
            softmax_temperature: 1.0,
            stable_softmax: false,
            beta1: 0.9,
            beta2: 0.999,
            gradient_clip: true,
            gradient_clip_limit: 5.0,
            gradient_fit: false,
            optimizer: OptimizerKind::Adam,
            regularize: false,
            stateful: true,
            interlayer: Interlayer::Linear,
            decrease_lr: false,
            learning_rate_decrease: 100_000.0,
            layers: 3,
            neurons: 68,
            mini_batch_size: 100,
            iterations: 100_000_000,
            epochs: 0,
            loss_moving_avg: 0.01,
            print_progress: true,
            print_every: 100,
            print_sample_output: true,
            sample_output_chars: 200,
            sampling: SamplingStrategy::Weighted,
            sample_output_file: None,
            store_progress_every: 1000,
            progress_file: PathBuf::from("progress.csv"),
            store_network_every: 8000,
            network_raw_path: PathBuf::from("lstm_net.net"),
            network_json_path: PathBuf::from("lstm_net.json"),
            feature_map_key: "Feature mapping".to_string(),
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Load a (possibly partial) configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> LstmResult<Self> {
        let file = File::open(path)?;
        let config: TrainingConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Point both network outputs into `dir`, keeping the default file names.
    pub fn with_save_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.network_raw_path = dir.as_ref().join("lstm_net.net");
        self.network_json_path = dir.as_ref().join("lstm_net.json");
        self
    }

    pub fn validate(&self) -> LstmResult<()> {
        if self.layers == 0 {
            return Err(LstmError::InvalidConfig("layer count must be > 0".into()));
        }
        if self.layers > MAX_LAYERS {
            return Err(LstmError::InvalidConfig(format!(
                "layer count {} exceeds the maximum of {}",
                self.layers, MAX_LAYERS
            )));
        }
        if self.neurons == 0 {
            return Err(LstmError::InvalidConfig("neuron count must be > 0".into()));
        }
        if self.mini_batch_size == 0 {
            return Err(LstmError::InvalidConfig("mini-batch size must be > 0".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(LstmError::InvalidConfig(format!(
                "learning rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.softmax_temperature > 0.0) {
            return Err(LstmError::InvalidConfig(format!(
                "softmax temperature must be > 0, got {}",
                self.softmax_temperature
            )));
        }
        if self.decrease_lr && self.learning_rate_decrease == 0.0 {
            return Err(LstmError::InvalidConfig(
                "learning rate decay constant must be non-zero".into(),
            ));
        }
        if self.print_progress && self.print_every == 0 {
            return Err(LstmError::InvalidConfig("print cadence must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.momentum) {
            return Err(LstmError::InvalidConfig(format!(
                "momentum must be in [0, 1], got {}",
                self.momentum
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_too_many_layers_rejected() {
        let config = TrainingConfig {
            layers: MAX_LAYERS + 1,
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(LstmError::InvalidConfig(_))));
    }

    #[test]
    fn test_optimizer_from_str() {
        assert_eq!("adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!(
            "SGD".parse::<OptimizerKind>().unwrap(),
            OptimizerKind::GradientDescent
        );
        assert!("rmsprop".parse::<OptimizerKind>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"neurons": 16, "optimizer": "gradient_descent"}"#).unwrap();
        assert_eq!(config.neurons, 16);
        assert_eq!(config.optimizer, OptimizerKind::GradientDescent);
        assert_eq!(config.mini_batch_size, 100);
        assert_eq!(config.feature_map_key, "Feature mapping");
    }
}
