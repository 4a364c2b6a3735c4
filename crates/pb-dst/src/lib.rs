//! # pb-dst
//!
//! Seeded simulation testing for the phased block manager.
//!
//! Each iteration derives a run configuration (population, capacity, turn
//! order, phase-1 jitter) from one seeded RNG, runs the real threaded
//! orchestrator, and checks every stack and protocol invariant on the
//! result. Thread scheduling itself is left to the OS; the seed fixes
//! everything the harness controls.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pb_dst::{get_or_generate_seed, DstHarness, HarnessConfig};
//!
//! let seed = get_or_generate_seed();
//! let result = DstHarness::new(seed, HarnessConfig::quick()).run();
//! assert!(result.all_invariants_held, "{}", result.format());
//! ```
//!
//! ## Reproducibility
//!
//! To replay the configurations of a failing run:
//! ```bash
//! DST_SEED=12345 cargo test -p pb-dst
//! ```

pub mod harness;
pub mod random;

pub use harness::{DstHarness, HarnessConfig, HarnessResult};
pub use random::DeterministicRng;

/// Get DST seed from environment or generate random one.
///
/// Prints the seed for reproduction. Use `DST_SEED=<seed>` to reproduce.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED") {
        Ok(s) => {
            let seed: u64 = s.parse().expect("DST_SEED must be a valid u64");
            println!("DST_SEED={} (from environment)", seed);
            seed
        }
        Err(_) => {
            let seed = rand::random::<u64>();
            println!("DST_SEED={} (randomly generated)", seed);
            seed
        }
    }
}
