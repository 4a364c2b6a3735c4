//! Phase barrier and rendezvous point.
//!
//! # Phase barrier
//!
//! One semaphore initialised to `-(K-1)`, where `K` is the number of
//! ungated workers. Each ungated worker signals once after phase 1, so the
//! value reaches 1 exactly when the K-th arrives. A gated worker waits
//! once and immediately re-signals, letting the next gated worker through.
//!
//! ```text
//! value: -(K-1) --K arrivals--> 1 --wait--> 0 --re-signal--> 1 --wait--> ...
//! ```
//!
//! # Rendezvous
//!
//! A semaphore starting at 0. Openers signal; everyone else waits and
//! immediately re-signals, so the point stays open once opened.

use std::sync::atomic::{AtomicUsize, Ordering};

use pb_core::SyncError;

use crate::semaphore::Semaphore;

/// Result of a gated worker crossing the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierPass {
    /// 1-based crossing order among gated workers
    pub position: usize,
    /// Whether this was the last expected gated worker
    pub is_last: bool,
}

/// Lets gated workers proceed only after every ungated worker arrived.
#[derive(Debug)]
pub struct PhaseBarrier {
    gate: Semaphore,
    arrivals_expected: usize,
    gated_expected: usize,
    /// Completion tally; announcement only, not part of the gating.
    passed: AtomicUsize,
}

impl PhaseBarrier {
    /// Barrier for `arrivals_expected` signalling workers and
    /// `gated_expected` waiting workers.
    pub fn new(arrivals_expected: usize, gated_expected: usize) -> Self {
        let initial = 1 - arrivals_expected as i64;
        Self {
            gate: Semaphore::named("S1", initial),
            arrivals_expected,
            gated_expected,
            passed: AtomicUsize::new(0),
        }
    }

    /// Value the underlying semaphore started at.
    pub fn initial_value(&self) -> i64 {
        1 - self.arrivals_expected as i64
    }

    /// Record that an ungated worker finished phase 1.
    pub fn arrive(&self) {
        self.gate.signal();
    }

    /// Block until every ungated worker has arrived.
    pub fn wait(&self) -> Result<BarrierPass, SyncError> {
        self.gate.wait()?;
        self.gate.signal();
        let position = self.passed.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BarrierPass {
            position,
            is_last: position == self.gated_expected,
        })
    }

    /// Number of gated workers that crossed so far.
    pub fn passed(&self) -> usize {
        self.passed.load(Ordering::SeqCst)
    }

    /// Whether a gated worker arriving now would block.
    pub fn is_closed(&self) -> bool {
        self.gate.is_locked()
    }

    /// Fail pending and future blocking waits.
    pub fn interrupt(&self) {
        self.gate.interrupt();
    }
}

/// Single synchronization point between critical sections and the turn gate.
#[derive(Debug)]
pub struct Rendezvous {
    point: Semaphore,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self {
            point: Semaphore::named("S2", 0),
        }
    }

    /// Open the point (or add one more permit).
    pub fn open(&self) {
        self.point.signal();
    }

    /// Wait until opened, then leave it open for the next worker.
    pub fn pass(&self) -> Result<(), SyncError> {
        self.point.wait()?;
        self.point.signal();
        Ok(())
    }

    /// Whether at least one opener has signalled.
    pub fn is_open(&self) -> bool {
        !self.point.is_locked()
    }

    /// Fail pending and future blocking passes.
    pub fn interrupt(&self) {
        self.point.interrupt();
    }
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::atomic::AtomicBool;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn test_gated_never_passes_early() {
        loom::model(|| {
            let barrier = Arc::new(PhaseBarrier::new(2, 1));
            let arrived = Arc::new([AtomicBool::new(false), AtomicBool::new(false)]);

            let arrivals: Vec<_> = (0..2)
                .map(|i| {
                    let barrier = Arc::clone(&barrier);
                    let arrived = Arc::clone(&arrived);
                    thread::spawn(move || {
                        arrived[i].store(true, Ordering::SeqCst);
                        barrier.arrive();
                    })
                })
                .collect();

            let pass = barrier.wait().unwrap();
            assert!(pass.is_last);
            assert!(arrived.iter().all(|a| a.load(Ordering::SeqCst)));

            for handle in arrivals {
                handle.join().unwrap();
            }
        });
    }
}
