//! Counting semaphore built on a mutex/condition-variable monitor.
//!
//! The value may start negative: `Semaphore::new(-2)` needs three
//! `signal` calls before a single `wait` can return. This is what the
//! phase barrier is built from.
//!
//! `signal` wakes at most one waiter and makes no fairness promise.

#[cfg(loom)]
use loom::sync::{Condvar, Mutex, MutexGuard};

#[cfg(not(loom))]
use std::sync::{Condvar, Mutex, MutexGuard};

use std::fmt;
use std::sync::PoisonError;

use pb_core::SyncError;
use tracing::trace;

/// A counting semaphore.
pub struct Semaphore {
    name: &'static str,
    state: Mutex<SemState>,
    waiters: Condvar,
}

struct SemState {
    value: i64,
    /// Sticky: once set, every wait that would block fails instead.
    interrupted: bool,
}

impl Semaphore {
    /// Create an anonymous semaphore with the given initial value.
    pub fn new(value: i64) -> Self {
        Self::named("semaphore", value)
    }

    /// Create a semaphore whose name shows up in logs and errors.
    pub fn named(name: &'static str, value: i64) -> Self {
        Self {
            name,
            state: Mutex::new(SemState {
                value,
                interrupted: false,
            }),
            waiters: Condvar::new(),
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Block while the value is `<= 0`, then decrement it.
    ///
    /// Returns `SyncError::Interrupted` if the semaphore is interrupted
    /// while the caller would block. The value is left untouched in that case.
    pub fn wait(&self) -> Result<(), SyncError> {
        let mut state = self.lock_for_wait()?;
        while state.value <= 0 {
            if state.interrupted {
                return Err(SyncError::interrupted(self.name, "semaphore interrupted"));
            }
            state = self
                .waiters
                .wait(state)
                .map_err(|_| SyncError::interrupted(self.name, "monitor poisoned"))?;
        }
        state.value -= 1;
        trace!(semaphore = self.name, value = state.value, "wait");
        Ok(())
    }

    /// Increment the value and wake one waiter.
    pub fn signal(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.value += 1;
        trace!(semaphore = self.name, value = state.value, "signal");
        drop(state);
        self.waiters.notify_one();
    }

    /// Whether a `wait` issued now would block.
    pub fn is_locked(&self) -> bool {
        self.value() <= 0
    }

    /// Current value (diagnostic only).
    pub fn value(&self) -> i64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).value
    }

    /// Fail every current and future wait that would block.
    pub fn interrupt(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.interrupted = true;
        drop(state);
        self.waiters.notify_all();
    }

    /// Whether `interrupt` has been called.
    pub fn is_interrupted(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .interrupted
    }

    fn lock_for_wait(&self) -> Result<MutexGuard<'_, SemState>, SyncError> {
        self.state
            .lock()
            .map_err(|_| SyncError::interrupted(self.name, "monitor poisoned"))
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("name", &self.name)
            .field("value", &self.value())
            .finish()
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}


/// Loom tests - these exhaustively check all interleavings
#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::atomic::{AtomicUsize, Ordering};
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn test_negative_value_gates_single_waiter() {
        loom::model(|| {
            let sem = Arc::new(Semaphore::new(-1));
            let signals = Arc::new(AtomicUsize::new(0));

            let signallers: Vec<_> = (0..2)
                .map(|_| {
                    let sem = Arc::clone(&sem);
                    let signals = Arc::clone(&signals);
                    thread::spawn(move || {
                        signals.fetch_add(1, Ordering::SeqCst);
                        sem.signal();
                    })
                })
                .collect();

            sem.wait().unwrap();
            assert_eq!(signals.load(Ordering::SeqCst), 2);

            for handle in signallers {
                handle.join().unwrap();
            }
            assert_eq!(sem.value(), 0);
        });
    }

    #[test]
    fn test_binary_semaphore_excludes() {
        loom::model(|| {
            let sem = Arc::new(Semaphore::new(1));
            let inside = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let sem = Arc::clone(&sem);
                    let inside = Arc::clone(&inside);
                    thread::spawn(move || {
                        sem.wait().unwrap();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        sem.signal();
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    }
}
