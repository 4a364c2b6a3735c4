//! A value owned by whoever holds a binary semaphore.
//!
//! `SemMutex` is the only way the shared stack and the turn counter are
//! reached. The semaphore is private, so a guard is the sole proof of
//! exclusive access. Occupancy is instrumented: `max_occupancy()` must
//! never exceed 1.
//!
//! A guard dropped while its thread is panicking does not release the
//! semaphore. It interrupts it instead, so the lock stays poisoned and
//! nobody observes a half-finished critical section.

#[cfg(loom)]
use loom::cell::{MutPtr, UnsafeCell};
#[cfg(loom)]
use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(loom)]
use std::mem::ManuallyDrop;

#[cfg(not(loom))]
use std::cell::UnsafeCell;
#[cfg(not(loom))]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::thread;

use pb_core::SyncError;
use tracing::warn;

use crate::semaphore::Semaphore;

/// Mutual exclusion built from `Semaphore::new(1)`.
pub struct SemMutex<T> {
    sem: Semaphore,
    occupancy: AtomicUsize,
    max_occupancy: AtomicUsize,
    poisoned: AtomicBool,
    value: UnsafeCell<T>,
}

// Safety: access to `value` is serialized by `sem`; a guard exists only
// between a successful `wait` and the matching `signal`.
unsafe impl<T: Send> Send for SemMutex<T> {}
unsafe impl<T: Send> Sync for SemMutex<T> {}

impl<T> SemMutex<T> {
    /// Wrap `value` behind a semaphore named `name`.
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            sem: Semaphore::named(name, 1),
            occupancy: AtomicUsize::new(0),
            max_occupancy: AtomicUsize::new(0),
            poisoned: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Block until the value is free and take it.
    pub fn lock(&self) -> Result<SemMutexGuard<'_, T>, SyncError> {
        self.sem.wait()?;
        let now = self.occupancy.fetch_add(1, Ordering::SeqCst) + 1;
        let mut seen = self.max_occupancy.load(Ordering::SeqCst);
        while now > seen {
            match self.max_occupancy.compare_exchange(seen, now, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => break,
                Err(actual) => seen = actual,
            }
        }
        Ok(SemMutexGuard {
            lock: self,
            #[cfg(loom)]
            access: ManuallyDrop::new(self.value.get_mut()),
        })
    }

    /// Whether a `lock` issued now would block.
    pub fn is_locked(&self) -> bool {
        self.sem.is_locked()
    }

    /// Highest number of simultaneous holders ever observed.
    pub fn max_occupancy(&self) -> usize {
        self.max_occupancy.load(Ordering::SeqCst)
    }

    /// Fail every pending and future blocking `lock`.
    pub fn interrupt(&self) {
        self.sem.interrupt();
    }

    /// Whether a holder panicked and left the lock poisoned.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Consume the lock, returning the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T> fmt::Debug for SemMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemMutex")
            .field("sem", &self.sem)
            .field("max_occupancy", &self.max_occupancy())
            .field("poisoned", &self.is_poisoned())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a `SemMutex` value; signals the semaphore on drop
/// (or poisons it when dropped during a panic).
pub struct SemMutexGuard<'a, T> {
    lock: &'a SemMutex<T>,
    /// Tracked mutable access, held for the guard's lifetime.
    #[cfg(loom)]
    access: ManuallyDrop<MutPtr<T>>,
}

impl<T> SemMutexGuard<'_, T> {
    #[cfg(not(loom))]
    fn value_ptr(&self) -> *mut T {
        self.lock.value.get()
    }

    #[cfg(loom)]
    fn value_ptr(&self) -> *mut T {
        self.access.with(|ptr| ptr)
    }
}

impl<T> Deref for SemMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the guard holds the semaphore.
        unsafe { &*self.value_ptr() }
    }
}

impl<T> DerefMut for SemMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the guard holds the semaphore.
        unsafe { &mut *self.value_ptr() }
    }
}

impl<T> Drop for SemMutexGuard<'_, T> {
    fn drop(&mut self) {
        // Safety: `access` is never touched again.
        #[cfg(loom)]
        unsafe {
            ManuallyDrop::drop(&mut self.access);
        }
        self.lock.occupancy.fetch_sub(1, Ordering::SeqCst);
        if thread::panicking() {
            warn!(semaphore = self.lock.sem.name(), "holder panicked, lock poisoned");
            self.lock.poisoned.store(true, Ordering::SeqCst);
            self.lock.sem.interrupt();
        } else {
            self.lock.sem.signal();
        }
    }
}


#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn test_read_modify_write_is_atomic() {
        loom::model(|| {
            let lock = Arc::new(SemMutex::new("mutex", 0u32));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let lock = Arc::clone(&lock);
                    thread::spawn(move || {
                        let mut guard = lock.lock().unwrap();
                        *guard += 1;
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(*lock.lock().unwrap(), 2);
            assert_eq!(lock.max_occupancy(), 1);
        });
    }
}
