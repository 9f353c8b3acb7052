use crate::api::optim::{LRScheduler, Optimizer};

/// Inverse-time decay: `lr = lr0 / (1 + n / k)`.
pub struct InverseTimeDecay {
    initial_lr: f64,
    decay_constant: f64,
    current_lr: f64,
}

impl InverseTimeDecay {
    pub fn new(initial_lr: f64, decay_constant: f64) -> Self {
        Self {
            initial_lr,
            decay_constant,
            current_lr: initial_lr,
        }
    }
}

impl LRScheduler for InverseTimeDecay {
    fn step(&mut self, optimizer: &mut dyn Optimizer, n: u64) {
        self.current_lr = self.initial_lr / (1.0 + n as f64 / self.decay_constant);
        optimizer.set_lr(self.current_lr);
    }

    fn get_lr(&self) -> f64 {
        self.current_lr
    }
}
