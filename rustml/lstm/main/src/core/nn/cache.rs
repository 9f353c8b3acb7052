//! Per-timestep activations and cross-timestep state.

/// Everything one forward step records for its backward step.
#[derive(Debug, Clone)]
pub struct StepCache {
    pub h: Vec<f64>,
    pub c: Vec<f64>,
    pub h_old: Vec<f64>,
    pub c_old: Vec<f64>,
    /// Concatenated `[h_old, input]`.
    pub x: Vec<f64>,
    pub hf: Vec<f64>,
    pub hi: Vec<f64>,
    pub ho: Vec<f64>,
    pub hc: Vec<f64>,
    pub tanh_c: Vec<f64>,
    /// Layer output: softmax probabilities at the output layer, the
    /// interlayer projection elsewhere.
    pub probs: Vec<f64>,
    /// Sigmoid output of the interlayer projection, read by its backward rule.
    pub interlayer_sigmoid: Vec<f64>,
}

impl StepCache {
    pub fn new(x: usize, n: usize, y: usize) -> Self {
        Self {
            h: vec![0.0; n],
            c: vec![0.0; n],
            h_old: vec![0.0; n],
            c_old: vec![0.0; n],
            x: vec![0.0; x + n],
            hf: vec![0.0; n],
            hi: vec![0.0; n],
            ho: vec![0.0; n],
            hc: vec![0.0; n],
            tanh_c: vec![0.0; n],
            probs: vec![0.0; y],
            interlayer_sigmoid: vec![0.0; y],
        }
    }

    /// Zero the recurrent state this slot hands to the next step.
    pub fn reset_state(&mut self) {
        self.h.fill(0.0);
        self.c.fill(0.0);
    }
}

/// `slots` caches for one layer.
pub fn cache_ring(slots: usize, x: usize, n: usize, y: usize) -> Vec<StepCache> {
    (0..slots).map(|_| StepCache::new(x, n, y)).collect()
}

/// Deltas flowing from step `t` of a layer back into step `t-1` (`dldh`,
/// `dldc`) and down the stack into the layer feeding this one (`dldy_pass`).
#[derive(Debug, Clone)]
pub struct NextDeltas {
    pub dldh: Vec<f64>,
    pub dldc: Vec<f64>,
    pub dldy_pass: Vec<f64>,
}

impl NextDeltas {
    pub fn new(x: usize, n: usize) -> Self {
        Self {
            dldh: vec![0.0; n],
            dldc: vec![0.0; n],
            dldy_pass: vec![0.0; x],
        }
    }

    pub fn zero(&mut self) {
        self.dldh.fill(0.0);
        self.dldc.fill(0.0);
        self.dldy_pass.fill(0.0);
    }
}

/// Hidden and cell state carried between mini-batches.
#[derive(Debug, Clone, PartialEq)]
pub struct CarryState {
    pub h: Vec<f64>,
    pub c: Vec<f64>,
}

impl CarryState {
    pub fn new(n: usize) -> Self {
        Self {
            h: vec![0.0; n],
            c: vec![0.0; n],
        }
    }

    /// Snapshot the final state of a mini-batch.
    pub fn write(&mut self, cache: &StepCache) {
        self.h.copy_from_slice(&cache.h);
        self.c.copy_from_slice(&cache.c);
    }

    /// Install the snapshot as the state slot 0 hands to the first step.
    pub fn restore(&self, cache: &mut StepCache) {
        cache.h.copy_from_slice(&self.h);
        cache.c.copy_from_slice(&self.c);
    }
}
