//! Seeded randomness for the harness.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reproducible RNG: the same seed yields the same sequence.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: u64,
    rng: StdRng,
}

impl DeterministicRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed this RNG was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Uniform value in `low..=high`.
    pub fn gen_range_inclusive(&mut self, low: u64, high: u64) -> u64 {
        debug_assert!(low <= high, "Empty range {}..={}", low, high);
        self.rng.gen_range(low..=high)
    }

    /// True with probability `p`.
    pub fn gen_bool(&mut self, p: f64) -> bool {
        debug_assert!((0.0..=1.0).contains(&p), "Probability out of range: {}", p);
        self.rng.gen_bool(p)
    }
}
