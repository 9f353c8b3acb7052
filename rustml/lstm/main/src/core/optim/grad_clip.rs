use crate::api::types::TrainingConfig;
use crate::core::nn::params::ParamSet;

/// Gradient conditioning applied to a layer's batch gradient before the
/// optimizer step, in order: L2 penalty, clip, fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradConditioning {
    /// L2 coefficient `λ`.
    pub regularize: Option<f64>,
    /// Per-element clamp limit.
    pub clip: Option<f64>,
    /// L1 rescale limit.
    pub fit: Option<f64>,
}

impl GradConditioning {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            regularize: config.regularize.then_some(config.lambda),
            clip: config.gradient_clip.then_some(config.gradient_clip_limit),
            fit: config.gradient_fit.then_some(config.gradient_clip_limit),
        }
    }

    /// Returns whether clipping or fitting changed the gradient.
    pub fn apply(&self, gradients: &mut ParamSet, params: &ParamSet) -> bool {
        if let Some(lambda) = self.regularize {
            gradients.regularize(params, lambda);
        }
        let mut changed = false;
        if let Some(limit) = self.clip {
            changed |= gradients.clip(limit);
        }
        if let Some(limit) = self.fit {
            changed |= gradients.fit(limit);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_clips_only() {
        let cond = GradConditioning::from_config(&TrainingConfig::default());
        assert_eq!(cond.clip, Some(5.0));
        assert!(cond.fit.is_none());
        assert!(cond.regularize.is_none());

        let params = ParamSet::zeros(1, 2, 1);
        let mut grads = ParamSet::zeros(1, 2, 1);
        grads.wf = vec![10.0, -1.0, 0.0, -12.0, 0.5, 3.0];
        assert!(cond.apply(&mut grads, &params));
        assert_eq!(grads.wf, vec![5.0, -1.0, 0.0, -5.0, 0.5, 3.0]);
        assert!(!cond.apply(&mut grads, &params));
    }

    #[test]
    fn test_regularize_adds_weight_penalty() {
        let cond = GradConditioning {
            regularize: Some(0.1),
            ..Default::default()
        };
        let mut params = ParamSet::zeros(1, 1, 1);
        params.wc = vec![2.0, 4.0];
        let mut grads = ParamSet::zeros(1, 1, 1);
        assert!(!cond.apply(&mut grads, &params));
        assert!((grads.wc[0] - 0.2).abs() < 1e-12);
        assert!((grads.wc[1] - 0.4).abs() < 1e-12);
    }
}
