//! # pb-sync
//!
//! Hand-built synchronization for the phased block manager.
//!
//! Everything here is layered on one primitive, a counting `Semaphore`
//! implemented as a mutex/condition-variable monitor:
//!
//! - `SemMutex`: a value owned by whoever holds a binary semaphore
//! - `PhaseBarrier`: negative-initialised semaphore used as a turnstile
//! - `Rendezvous`: zero-initialised semaphore passed wait-then-signal
//! - `TurnGate`: spin-retry test-and-set on a turn counter
//!
//! # Usage
//!
//! For normal tests:
//! ```bash
//! cargo test -p pb-sync
//! ```
//!
//! For loom tests:
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test -p pb-sync --release
//! ```

pub mod barrier;
pub mod sem_mutex;
pub mod semaphore;
pub mod turn_gate;

pub use barrier::{BarrierPass, PhaseBarrier, Rendezvous};
pub use sem_mutex::{SemMutex, SemMutexGuard};
pub use semaphore::Semaphore;
pub use turn_gate::{TurnGate, TurnTicket};
