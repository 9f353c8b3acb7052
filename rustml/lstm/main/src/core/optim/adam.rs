use crate::api::optim::Optimizer;
use crate::core::nn::params::ParamSet;

const EPSILON: f64 = 1e-7;

/// Adam with bias correction driven by the caller's global iteration count.
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    first_moment: ParamSet,
    second_moment: ParamSet,
}

impl Adam {
    pub fn new(learning_rate: f64, shape: &ParamSet) -> Self {
        let (x, n, y) = (shape.input_size(), shape.neurons(), shape.output_size());
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            first_moment: ParamSet::zeros(x, n, y),
            second_moment: ParamSet::zeros(x, n, y),
        }
    }

    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut ParamSet, gradients: &ParamSet, t: u64) {
        let (b1, b2, lr) = (self.beta1, self.beta2, self.learning_rate);
        let exp = (t + 1).min(i32::MAX as u64) as i32;
        let correction1 = 1.0 - b1.powi(exp);
        let correction2 = 1.0 - b2.powi(exp);

        let buffers = params
            .buffers_mut()
            .into_iter()
            .zip(self.first_moment.buffers_mut())
            .zip(self.second_moment.buffers_mut())
            .zip(gradients.buffers());

        for (((theta, m), r), g) in buffers {
            for i in 0..theta.len() {
                m[i] = b1 * m[i] + (1.0 - b1) * g[i];
                r[i] = b2 * r[i] + (1.0 - b2) * g[i] * g[i];
                let m_hat = m[i] / correction1;
                let r_hat = r[i] / correction2;
                theta[i] -= lr * m_hat / (r_hat.sqrt() + EPSILON);
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
