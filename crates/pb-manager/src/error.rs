//! Errors surfaced by a run.

use pb_core::{Role, StackError, SyncError, Tid};
use thiserror::Error;

/// Why a run could not complete.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to spawn {role} [TID={tid}]: {source}")]
    Spawn {
        role: Role,
        tid: Tid,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Stack(#[from] StackError),
}

impl ManagerError {
    /// Whether a worker faulted (as opposed to being interrupted or misconfigured).
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, ManagerError::Sync(e) if e.is_fault())
    }
}
