//! Invariant checkers.
//!
//! - `stack`: bounded stack invariants (TopInBounds, EmptyAboveTop,
//!   TopDelta, LIFO_Order, AccessAccounting)
//! - `protocol`: two-phase protocol invariants over the recorded worker
//!   history (TurnOrder, BarrierOrdering, CriticalSectionExclusion,
//!   MutualExclusion, LifecycleOrder)

pub mod protocol;
pub mod stack;

pub use protocol::{EventKind, ProtocolChecker, ProtocolEvent, ProtocolHistory};
pub use stack::{StackHistory, StackOpType, StackOperation, StackProperties, StackPropertyChecker};
