use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Gaussian weights scaled to `N(0, 5 / fan_in)`.
pub fn random_vector<R: Rng + ?Sized>(len: usize, fan_in: usize, rng: &mut R) -> Vec<f64> {
    let std = (5.0 / fan_in.max(1) as f64).sqrt();
    (0..len)
        .map(|_| {
            let z: f64 = StandardNormal.sample(rng);
            z * std
        })
        .collect()
}
