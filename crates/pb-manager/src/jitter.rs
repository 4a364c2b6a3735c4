//! Seeded phase-1 delays.
//!
//! Each worker draws from its own `StdRng` seeded with the run seed and
//! its TID, so a seed reproduces the same delays regardless of which
//! thread the OS schedules first.

use std::time::Duration;

use pb_core::Tid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Phase1Jitter;

/// Spreads TIDs across the seed space.
const TID_SEED_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// Delay `tid` sleeps before its phase-1 work.
#[must_use]
pub fn phase1_delay(jitter: &Phase1Jitter, tid: Tid) -> Duration {
    let max_us = jitter.max_delay.as_micros() as u64;
    if max_us == 0 {
        return Duration::ZERO;
    }
    let mut rng = StdRng::seed_from_u64(jitter.seed ^ tid.wrapping_mul(TID_SEED_MULTIPLIER));
    Duration::from_micros(rng.gen_range(0..=max_us))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jitter(seed: u64) -> Phase1Jitter {
        Phase1Jitter {
            seed,
            max_delay: Duration::from_micros(500),
        }
    }

    #[test]
    fn test_delay_is_reproducible() {
        for tid in 1..=10 {
            assert_eq!(phase1_delay(&jitter(42), tid), phase1_delay(&jitter(42), tid));
        }
    }

    #[test]
    fn test_delay_within_bound() {
        for tid in 1..=100 {
            assert!(phase1_delay(&jitter(7), tid) <= Duration::from_micros(500));
        }
    }

    #[test]
    fn test_delays_vary_by_tid() {
        let delays: Vec<_> = (1..=10).map(|tid| phase1_delay(&jitter(99), tid)).collect();
        assert!(delays.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_zero_bound_means_no_delay() {
        let none = Phase1Jitter {
            seed: 3,
            max_delay: Duration::ZERO,
        };
        assert_eq!(phase1_delay(&none, 1), Duration::ZERO);
    }
}
