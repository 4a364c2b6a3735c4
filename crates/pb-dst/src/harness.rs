//! DST harness for the threaded orchestrator.
//!
//! Every iteration:
//! 1. Draw a `ManagerConfig` from the seeded RNG
//! 2. Run it with `BlockManager::run`
//! 3. Check `StackPropertyChecker` and `ProtocolChecker` on the report
//!
//! The harness stops at the first violation or failed run.

use std::time::Duration;

use pb_core::config::{STACK_SIZE_MAX, STACK_SIZE_MIN};
use pb_core::invariants::{ProtocolChecker, StackPropertyChecker};
use pb_core::{PropertyChecker, TurnOrder};
use pb_manager::{BlockManager, ManagerConfig, Phase1Jitter, RunReport};
use tracing::debug;

use crate::random::DeterministicRng;

/// Configuration for the DST harness.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Runs to perform
    pub iterations: u64,
    /// Upper bound on each worker's phase-1 delay
    pub jitter_max: Duration,
    /// Draw role counts per iteration instead of using the defaults
    pub vary_population: bool,
    /// Most workers of any one role when varying the population
    pub role_count_max: u64,
    /// Draw the stack capacity per iteration
    pub vary_capacity: bool,
    /// Probability of a descending turn order
    pub descending_probability: f64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            jitter_max: Duration::from_micros(500),
            vary_population: true,
            role_count_max: 4,
            vary_capacity: true,
            descending_probability: 0.5,
        }
    }
}

impl HarnessConfig {
    /// Configuration for stress testing.
    pub fn stress() -> Self {
        Self {
            iterations: 200,
            jitter_max: Duration::from_millis(2),
            vary_population: true,
            role_count_max: 6,
            vary_capacity: true,
            descending_probability: 0.5,
        }
    }

    /// Configuration for quick testing.
    pub fn quick() -> Self {
        Self {
            iterations: 5,
            jitter_max: Duration::from_micros(200),
            vary_population: false,
            role_count_max: 4,
            vary_capacity: false,
            descending_probability: 0.5,
        }
    }
}

/// Result of running the harness.
#[derive(Debug, Clone)]
pub struct HarnessResult {
    /// Seed used for reproduction
    pub seed: u64,
    /// Runs completed
    pub iterations_count: u64,
    /// Workers run across all iterations
    pub workers_count: u64,
    /// Individual invariant checks evaluated
    pub checks_count: u64,
    /// Whether all invariants held
    pub all_invariants_held: bool,
    /// First violation (if any)
    pub first_violation: Option<String>,
}

impl HarnessResult {
    /// Format for display.
    pub fn format(&self) -> String {
        let status = if self.all_invariants_held { "PASS" } else { "FAIL" };

        let mut result = format!(
            "[{}] DST_SEED={} iterations={} workers={} checks={}",
            status, self.seed, self.iterations_count, self.workers_count, self.checks_count
        );

        if let Some(ref violation) = self.first_violation {
            result.push_str(&format!("\n  Violation: {}", violation));
        }

        result
    }
}

/// Runs the orchestrator repeatedly under seeded configurations.
pub struct DstHarness {
    rng: DeterministicRng,
    config: HarnessConfig,
}

impl DstHarness {
    /// Create a new harness with the given seed and config.
    pub fn new(seed: u64, config: HarnessConfig) -> Self {
        debug_assert!(config.iterations > 0, "Must run at least one iteration");
        debug_assert!(config.role_count_max > 0, "Role count bound must be positive");
        Self {
            rng: DeterministicRng::new(seed),
            config,
        }
    }

    /// Get the seed for reproduction.
    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    /// The configurations `run` will use, in order.
    #[must_use]
    pub fn planned_configs(&self) -> Vec<ManagerConfig> {
        let mut rng = self.rng.clone();
        (0..self.config.iterations)
            .map(|_| self.draw_config(&mut rng))
            .collect()
    }

    /// Run every iteration, stopping at the first failure.
    pub fn run(&self) -> HarnessResult {
        let mut result = HarnessResult {
            seed: self.seed(),
            iterations_count: 0,
            workers_count: 0,
            checks_count: 0,
            all_invariants_held: true,
            first_violation: None,
        };

        for (iteration, config) in self.planned_configs().into_iter().enumerate() {
            debug!(iteration, ?config, "dst iteration");
            let workers_count = config.workers_count() as u64;

            let report = match BlockManager::new(config).and_then(|m| m.run()) {
                Ok(report) => report,
                Err(e) => {
                    result.all_invariants_held = false;
                    result.first_violation = Some(format!("iteration {}: run failed: {}", iteration, e));
                    break;
                }
            };
            result.iterations_count += 1;
            result.workers_count += workers_count;

            if let Some(violation) = self.check(&report, &mut result.checks_count) {
                result.all_invariants_held = false;
                result.first_violation = Some(format!("iteration {}: {}", iteration, violation));
                break;
            }
        }

        result
    }

    fn check(&self, report: &RunReport, checks_count: &mut u64) -> Option<String> {
        let stack = StackPropertyChecker::new(&report.stack)
            .with_expected_accesses(report.accesses_performed)
            .check_all();
        let protocol = ProtocolChecker::new(&report.history, report.turn_order, report.workers_count())
            .with_max_occupancy(report.stack_max_occupancy)
            .with_seed(self.seed())
            .check_all();

        let results: Vec<_> = stack.into_iter().chain(protocol).collect();
        *checks_count += results.len() as u64;
        results.into_iter().find(|r| !r.passed).map(|r| r.to_string())
    }

    fn draw_config(&self, rng: &mut DeterministicRng) -> ManagerConfig {
        let defaults = ManagerConfig::default();
        let max = self.config.role_count_max;

        let (acquirers_count, releasers_count, observers_count) = if self.config.vary_population {
            loop {
                let counts = (
                    rng.gen_range_inclusive(0, max) as usize,
                    rng.gen_range_inclusive(0, max) as usize,
                    rng.gen_range_inclusive(0, max) as usize,
                );
                if counts.0 + counts.1 + counts.2 > 0 {
                    break counts;
                }
            }
        } else {
            (defaults.acquirers_count, defaults.releasers_count, defaults.observers_count)
        };

        let stack_capacity = if self.config.vary_capacity {
            rng.gen_range_inclusive(STACK_SIZE_MIN as u64, STACK_SIZE_MAX as u64) as usize
        } else {
            defaults.stack_capacity
        };

        let turn_order = if rng.gen_bool(self.config.descending_probability) {
            TurnOrder::Descending
        } else {
            TurnOrder::Ascending
        };

        ManagerConfig {
            acquirers_count,
            releasers_count,
            observers_count,
            stack_capacity,
            turn_order,
            phase1_jitter: Some(Phase1Jitter {
                seed: rng.next_u64(),
                max_delay: self.config.jitter_max,
            }),
            ..defaults
        }
    }
}
