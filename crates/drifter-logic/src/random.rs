//! Random source handle for stochastic terms.
//!
//! Every stochastic draw goes through a [`RandomSource`] passed in by the
//! caller, so a run is reproducible from its seed and parallel workers can
//! hold independent streams.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of standard normal variates (mean 0, sd 1).
pub trait RandomSource {
    fn normal_variate(&mut self) -> f64;
}

/// Seeded normal generator (Box-Muller over a `StdRng`).
#[derive(Debug, Clone)]
pub struct SeededNormal {
    rng: StdRng,
    spare: Option<f64>,
}

impl SeededNormal {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            spare: None,
        }
    }

    /// Independent stream for a worker, derived from a base seed.
    pub fn stream(seed: u64, step: u64, worker: u64) -> Self {
        // splitmix-style mixing so neighbouring (step, worker) pairs diverge
        let mut z = seed
            .wrapping_add(step.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .wrapping_add(worker.wrapping_mul(0xBF58_476D_1CE4_E5B9));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        Self::new(z ^ (z >> 31))
    }
}

impl RandomSource for SeededNormal {
    fn normal_variate(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        let u1: f64 = self.rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = self.rng.gen::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        self.spare = Some(radius * theta.sin());
        radius * theta.cos()
    }
}

/// Always returns zero. For deterministic runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNoise;

impl RandomSource for NoNoise {
    fn normal_variate(&mut self) -> f64 {
        0.0
    }
}
