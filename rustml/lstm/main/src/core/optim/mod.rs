pub mod adam;
pub mod grad_clip;
pub mod schedulers;
pub mod sgd;

use crate::api::optim::Optimizer;
use crate::api::types::{OptimizerKind, TrainingConfig};
use crate::core::nn::params::ParamSet;

/// One optimizer per layer, shaped like `params`.
pub fn build_optimizer(config: &TrainingConfig, params: &ParamSet) -> Box<dyn Optimizer> {
    match config.optimizer {
        OptimizerKind::Adam => Box::new(
            adam::Adam::new(config.learning_rate, params).with_betas(config.beta1, config.beta2),
        ),
        OptimizerKind::GradientDescent => Box::new(
            sgd::MomentumSgd::new(config.learning_rate, params).with_momentum(config.momentum),
        ),
    }
}
