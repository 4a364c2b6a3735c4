//! # pb-stack
//!
//! The shared resource of the phased block manager: a fixed-capacity,
//! array-backed stack of blocks.
//!
//! The stack performs no locking of its own. Callers reach it only
//! through the manager's semaphore-guarded lock.

pub mod block_stack;
pub mod snapshot;

pub use block_stack::{successor, BlockStack};
pub use snapshot::StackSnapshot;
