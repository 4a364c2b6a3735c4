//! Run configuration.
//!
//! The `block-manager` binary always runs with the compile-time population
//! and capacity from `pb_core::config`. Tests and the simulation harness
//! override them here.

use std::time::Duration;

use pb_core::config::{
    ACQUIRERS_COUNT, OBSERVERS_COUNT, PROBER_STEPS_DEFAULT, RELEASERS_COUNT, STACK_SIZE_DEFAULT,
    STACK_SIZE_MAX, STACK_SIZE_MIN,
};
use pb_core::TurnOrder;

use crate::error::ManagerError;

/// Upper bound on workers in one run.
pub const WORKERS_COUNT_MAX: usize = 64;

/// Upper bound on a single phase-1 delay.
pub const JITTER_DELAY_MAX: Duration = Duration::from_millis(100);

/// Seeded random delay injected before each worker's phase-1 work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase1Jitter {
    /// Base seed; each worker derives its own stream from it and its TID
    pub seed: u64,
    /// Longest delay a worker may draw
    pub max_delay: Duration,
}

/// Configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub acquirers_count: usize,
    pub releasers_count: usize,
    pub observers_count: usize,
    /// Stack capacity (`STACK_SIZE_MIN..=STACK_SIZE_MAX`)
    pub stack_capacity: usize,
    /// Snapshots per Observer critical section
    pub prober_steps: usize,
    pub turn_order: TurnOrder,
    pub phase1_jitter: Option<Phase1Jitter>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            acquirers_count: ACQUIRERS_COUNT,
            releasers_count: RELEASERS_COUNT,
            observers_count: OBSERVERS_COUNT,
            stack_capacity: STACK_SIZE_DEFAULT,
            prober_steps: PROBER_STEPS_DEFAULT,
            turn_order: TurnOrder::Ascending,
            phase1_jitter: None,
        }
    }
}

impl ManagerConfig {
    /// Total number of workers.
    #[must_use]
    pub fn workers_count(&self) -> usize {
        self.acquirers_count + self.releasers_count + self.observers_count
    }

    /// Workers that signal the phase barrier instead of waiting on it.
    #[must_use]
    pub fn ungated_count(&self) -> usize {
        self.releasers_count + self.observers_count
    }

    /// Reject configurations the protocol cannot run.
    pub fn validate(&self) -> Result<(), ManagerError> {
        let workers_count = self.workers_count();
        if workers_count == 0 {
            return Err(ManagerError::Config("at least one worker is required".into()));
        }
        if workers_count > WORKERS_COUNT_MAX {
            return Err(ManagerError::Config(format!(
                "{} workers exceeds the maximum of {}",
                workers_count, WORKERS_COUNT_MAX
            )));
        }
        if !(STACK_SIZE_MIN..=STACK_SIZE_MAX).contains(&self.stack_capacity) {
            return Err(ManagerError::Config(format!(
                "stack capacity {} outside {}..={}",
                self.stack_capacity, STACK_SIZE_MIN, STACK_SIZE_MAX
            )));
        }
        if self.prober_steps == 0 {
            return Err(ManagerError::Config("prober_steps must be at least 1".into()));
        }
        if let Some(jitter) = self.phase1_jitter {
            if jitter.max_delay > JITTER_DELAY_MAX {
                return Err(ManagerError::Config(format!(
                    "phase-1 jitter {:?} exceeds {:?}",
                    jitter.max_delay, JITTER_DELAY_MAX
                )));
            }
        }
        Ok(())
    }
}
