use crate::core::nn::params::ParamSet;

/// Parameter update rule applied once per mini-batch.
///
/// Each stacked layer owns one optimizer instance so accumulator shapes always
/// match the layer they update. `t` is the global iteration counter shared by
/// every layer.
pub trait Optimizer {
    fn step(&mut self, params: &mut ParamSet, gradients: &ParamSet, t: u64);
    fn lr(&self) -> f64;
    fn set_lr(&mut self, lr: f64);
}

pub trait LRScheduler {
    /// Advance to iteration `n` and push the new rate into `optimizer`.
    fn step(&mut self, optimizer: &mut dyn Optimizer, n: u64);
    fn get_lr(&self) -> f64;
}
