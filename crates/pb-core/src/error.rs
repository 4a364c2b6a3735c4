//! Error taxonomy.
//!
//! Two kinds of failure cross thread boundaries: an interrupted blocking
//! wait (recoverable, the worker abandons its run) and a fault inside a
//! critical section (fatal for the whole run). Stack misuse is reported
//! as a `StackError` and promoted to `SyncError::Fault` by the worker that
//! hit it.
//!
//! Popping an empty stack and a Releaser finding the stack full are
//! defined behaviors, not errors.

use thiserror::Error;

use crate::types::{Role, Tid};

/// Errors returned by blocking synchronization and worker runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A blocking wait was interrupted before it could complete.
    #[error("wait on {primitive} interrupted: {reason}")]
    Interrupted {
        primitive: &'static str,
        reason: String,
    },

    /// Unexpected fault inside a critical section.
    #[error("fault in {role} [TID={tid}] during {operation}: {message}")]
    Fault {
        role: Role,
        tid: Tid,
        operation: &'static str,
        message: String,
    },
}

impl SyncError {
    /// Build an `Interrupted` error for `primitive`.
    pub fn interrupted(primitive: &'static str, reason: impl Into<String>) -> Self {
        SyncError::Interrupted {
            primitive,
            reason: reason.into(),
        }
    }

    /// Whether this error is fatal for the run.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, SyncError::Fault { .. })
    }
}

/// Misuse of the bounded stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("push onto full stack (capacity {capacity})")]
    Overflow { capacity: usize },

    #[error("index {index} out of bounds for stack of capacity {capacity}")]
    OutOfBounds { index: isize, capacity: usize },

    #[error("capacity {requested} outside {min}..={max}")]
    InvalidCapacity {
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error("block {block:?} has no successor")]
    NoSuccessor { block: char },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_message_carries_context() {
        let err = SyncError::Fault {
            role: Role::Releaser,
            tid: 5,
            operation: "push",
            message: StackError::Overflow { capacity: 6 }.to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("Releaser"));
        assert!(text.contains("TID=5"));
        assert!(text.contains("push"));
        assert!(text.contains("capacity 6"));
        assert!(err.is_fault());
    }

    #[test]
    fn test_interrupted_is_not_fault() {
        let err = SyncError::interrupted("mutex", "run aborted");
        assert!(!err.is_fault());
        assert_eq!(err.to_string(), "wait on mutex interrupted: run aborted");
    }
}
