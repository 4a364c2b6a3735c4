//! State shared by every worker of one run.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use pb_core::config::TID_FIRST;
use pb_core::{Tid, TurnOrder};
use pb_stack::BlockStack;
use pb_sync::{PhaseBarrier, Rendezvous, SemMutex, TurnGate};
use tracing::{debug, warn};

use crate::config::{ManagerConfig, Phase1Jitter};
use crate::error::ManagerError;

/// Hands out dense TIDs in creation order.
#[derive(Debug)]
pub struct TidAllocator {
    next: AtomicU64,
}

impl TidAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(TID_FIRST),
        }
    }

    /// Allocate the next TID.
    pub fn next(&self) -> Tid {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// TID the next allocation would return.
    pub fn peek_next(&self) -> Tid {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for TidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the workers of one run share, passed to each by `Arc`.
///
/// Each resource has exactly one guard:
/// - the stack: its own `SemMutex`
/// - the turn counter: the `TurnGate`'s lock
/// - TIDs, the event step and the abort flag: atomics
#[derive(Debug)]
pub struct SharedContext {
    pub stack: SemMutex<BlockStack>,
    pub barrier: PhaseBarrier,
    pub rendezvous: Rendezvous,
    pub turn_gate: TurnGate,
    pub tids: TidAllocator,
    prober_steps: usize,
    phase1_jitter: Option<Phase1Jitter>,
    /// Global sequence number for protocol events.
    step: AtomicU64,
    aborted: AtomicBool,
}

impl SharedContext {
    /// Build the context for a validated configuration.
    pub fn new(config: &ManagerConfig) -> Result<Self, ManagerError> {
        config.validate()?;
        let stack = BlockStack::with_capacity(config.stack_capacity)?;
        let rendezvous = Rendezvous::new();
        if config.acquirers_count == 0 {
            // Nobody would ever open it.
            rendezvous.open();
        }

        Ok(Self {
            stack: SemMutex::new("stack", stack),
            barrier: PhaseBarrier::new(config.ungated_count(), config.acquirers_count),
            rendezvous,
            turn_gate: TurnGate::new(config.turn_order, config.workers_count() as u64),
            tids: TidAllocator::new(),
            prober_steps: config.prober_steps,
            phase1_jitter: config.phase1_jitter,
            step: AtomicU64::new(0),
            aborted: AtomicBool::new(false),
        })
    }

    pub fn prober_steps(&self) -> usize {
        self.prober_steps
    }

    pub fn phase1_jitter(&self) -> Option<&Phase1Jitter> {
        self.phase1_jitter.as_ref()
    }

    pub fn turn_order(&self) -> TurnOrder {
        self.turn_gate.order()
    }

    /// Next global event step (starts at 1).
    pub fn next_step(&self) -> u64 {
        self.step.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Interrupt every primitive so blocked and spinning workers return.
    ///
    /// Idempotent; only the first call logs.
    pub fn abort(&self) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!("aborting run, interrupting all waits");
        self.barrier.interrupt();
        self.rendezvous.interrupt();
        self.stack.interrupt();
        self.turn_gate.interrupt();
        debug!("all primitives interrupted");
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tids_are_dense() {
        let tids = TidAllocator::new();
        assert_eq!(tids.peek_next(), 1);
        assert_eq!((0..3).map(|_| tids.next()).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(tids.peek_next(), 4);
    }

    #[test]
    fn test_default_context() {
        let ctx = SharedContext::new(&ManagerConfig::default()).unwrap();
        assert_eq!(ctx.barrier.initial_value(), -6);
        assert!(!ctx.rendezvous.is_open());
        assert_eq!(ctx.turn_gate.current_turn().unwrap(), 1);
        assert_eq!(ctx.stack.lock().unwrap().top(), 3);
    }

    #[test]
    fn test_rendezvous_preopened_without_acquirers() {
        let config = ManagerConfig {
            acquirers_count: 0,
            ..ManagerConfig::default()
        };
        let ctx = SharedContext::new(&config).unwrap();
        assert!(ctx.rendezvous.is_open());
    }

    #[test]
    fn test_abort_interrupts_everything() {
        let ctx = SharedContext::new(&ManagerConfig::default()).unwrap();
        ctx.abort();
        ctx.abort();
        assert!(ctx.is_aborted());
        assert!(ctx.barrier.wait().is_err());
        assert!(ctx.rendezvous.pass().is_err());
        // A free lock is still granted; workers check `is_aborted` once inside.
        assert!(ctx.stack.lock().is_ok());
        assert!(ctx.turn_gate.enter(1, |_| ()).is_err());
    }

    #[test]
    fn test_steps_increase() {
        let ctx = SharedContext::new(&ManagerConfig::default()).unwrap();
        assert_eq!(ctx.next_step(), 1);
        assert_eq!(ctx.next_step(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ManagerConfig {
            stack_capacity: 1,
            ..ManagerConfig::default()
        };
        assert!(SharedContext::new(&config).is_err());
    }
}
