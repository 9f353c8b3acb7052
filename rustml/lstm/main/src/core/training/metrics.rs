/// Exponential moving average of the mini-batch loss plus the best value seen.
#[derive(Debug, Clone)]
pub struct LossTracker {
    smoothing: f64,
    average: Option<f64>,
    record: f64,
    record_iteration: u64,
}

impl LossTracker {
    pub fn new(smoothing: f64) -> Self {
        Self {
            smoothing,
            average: None,
            record: 0.0,
            record_iteration: 0,
        }
    }

    /// Fold in the loss of iteration `n`. The first value seeds the average.
    pub fn update(&mut self, n: u64, batch_loss: f64) -> f64 {
        let previous = self.average.unwrap_or(batch_loss);
        let average = batch_loss * self.smoothing + (1.0 - self.smoothing) * previous;
        self.average = Some(average);

        if n == 0 {
            self.record = average;
        }
        if average < self.record {
            self.record = average;
            self.record_iteration = n;
        }
        average
    }

    /// Current average; `-1` before the first update.
    pub fn loss(&self) -> f64 {
        self.average.unwrap_or(-1.0)
    }

    pub fn record(&self) -> f64 {
        self.record
    }

    pub fn record_iteration(&self) -> u64 {
        self.record_iteration
    }
}
