use crate::api::optim::Optimizer;
use crate::core::nn::params::ParamSet;

/// Gradient descent with an exponential-average momentum term:
/// `m ← μ·m + (1-μ)·g`, `θ ← θ - lr·m`.
///
/// With `μ = 0` this is plain gradient descent.
pub struct MomentumSgd {
    learning_rate: f64,
    momentum: f64,
    velocity: ParamSet,
}

impl MomentumSgd {
    pub fn new(learning_rate: f64, shape: &ParamSet) -> Self {
        Self {
            learning_rate,
            momentum: 0.0,
            velocity: ParamSet::zeros(shape.input_size(), shape.neurons(), shape.output_size()),
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }
}

impl Optimizer for MomentumSgd {
    fn step(&mut self, params: &mut ParamSet, gradients: &ParamSet, _t: u64) {
        let mu = self.momentum;
        let lr = self.learning_rate;
        for ((theta, m), g) in params
            .buffers_mut()
            .into_iter()
            .zip(self.velocity.buffers_mut())
            .zip(gradients.buffers())
        {
            for ((p, v), &gi) in theta.iter_mut().zip(m.iter_mut()).zip(g) {
                *v = mu * *v + (1.0 - mu) * gi;
                *p -= lr * *v;
            }
        }
    }

    fn lr(&self) -> f64 {
        self.learning_rate
    }

    fn set_lr(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_descent_step() {
        let mut params = ParamSet::zeros(1, 1, 1);
        params.bo = vec![1.0];
        let mut grads = ParamSet::zeros(1, 1, 1);
        grads.bo = vec![2.0];

        let mut sgd = MomentumSgd::new(0.1, &params);
        sgd.step(&mut params, &grads, 0);
        assert!((params.bo[0] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_momentum_persists_between_steps() {
        let mut params = ParamSet::zeros(1, 1, 1);
        let mut grads = ParamSet::zeros(1, 1, 1);
        grads.by = vec![1.0];
        let mut sgd = MomentumSgd::new(1.0, &params).with_momentum(0.5);

        sgd.step(&mut params, &grads, 0);
        assert!((params.by[0] + 0.5).abs() < 1e-12);

        grads.zero();
        sgd.step(&mut params, &grads, 1);
        // m = 0.5 * 0.5 + 0 = 0.25
        assert!((params.by[0] + 0.75).abs() < 1e-12);
    }
}
