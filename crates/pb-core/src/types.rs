//! Worker vocabulary shared by every crate.

use std::fmt;

use serde::Serialize;

/// Worker identity, densely allocated from 1 in creation order.
pub type Tid = u64;

/// A single stack symbol.
pub type Block = char;

/// Role a worker plays against the shared stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Pops a block (gated by the phase barrier).
    Acquirer,
    /// Pushes the successor of the current top.
    Releaser,
    /// Dumps snapshots of the stack without mutating it.
    Observer,
}

impl Role {
    /// Whether this role waits on the phase barrier instead of signalling it.
    #[must_use]
    pub fn is_gated(self) -> bool {
        matches!(self, Role::Acquirer)
    }

    /// Short tag used in log lines.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Role::Acquirer => "Acq",
            Role::Releaser => "Rel",
            Role::Observer => "Obs",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Acquirer => "Acquirer",
            Role::Releaser => "Releaser",
            Role::Observer => "Observer",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a worker.
///
/// ```text
/// Created -> Phase1 -> [BarrierWait] -> CriticalSection -> RendPoint
///         -> TurnWait -> Phase2 -> Terminated
/// ```
///
/// `BarrierWait` is only visited by gated roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Created,
    Phase1,
    BarrierWait,
    CriticalSection,
    RendPoint,
    TurnWait,
    Phase2,
    Terminated,
}

impl WorkerState {
    /// The state a worker of `role` moves to after `self`, if any.
    #[must_use]
    pub fn next(self, role: Role) -> Option<WorkerState> {
        match self {
            WorkerState::Created => Some(WorkerState::Phase1),
            WorkerState::Phase1 if role.is_gated() => Some(WorkerState::BarrierWait),
            WorkerState::Phase1 => Some(WorkerState::CriticalSection),
            WorkerState::BarrierWait => Some(WorkerState::CriticalSection),
            WorkerState::CriticalSection => Some(WorkerState::RendPoint),
            WorkerState::RendPoint => Some(WorkerState::TurnWait),
            WorkerState::TurnWait => Some(WorkerState::Phase2),
            WorkerState::Phase2 => Some(WorkerState::Terminated),
            WorkerState::Terminated => None,
        }
    }

    /// Whether `self -> to` is a legal step for `role`.
    #[must_use]
    pub fn can_transition_to(self, role: Role, to: WorkerState) -> bool {
        self.next(role) == Some(to)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Created => "CREATED",
            WorkerState::Phase1 => "PHASE1",
            WorkerState::BarrierWait => "BARRIER_WAIT",
            WorkerState::CriticalSection => "CRITICAL_SECTION",
            WorkerState::RendPoint => "REND_POINT",
            WorkerState::TurnWait => "TURN_WAIT",
            WorkerState::Phase2 => "PHASE2",
            WorkerState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Direction in which the turn gate hands out phase-2 turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnOrder {
    /// TIDs 1, 2, ..., N.
    #[default]
    Ascending,
    /// TIDs N, N-1, ..., 1.
    Descending,
}

impl TurnOrder {
    /// Turn counter value before any worker has run phase 2.
    #[must_use]
    pub fn initial_turn(self, workers_count: u64) -> Tid {
        match self {
            TurnOrder::Ascending => crate::config::TID_FIRST,
            TurnOrder::Descending => workers_count,
        }
    }

    /// Turn counter value after `turn` has run.
    #[must_use]
    pub fn advance(self, turn: Tid) -> Tid {
        match self {
            TurnOrder::Ascending => turn + 1,
            TurnOrder::Descending => turn.saturating_sub(1),
        }
    }

    /// Whether `tid` holds the final turn.
    #[must_use]
    pub fn is_last(self, tid: Tid, workers_count: u64) -> bool {
        match self {
            TurnOrder::Ascending => tid == workers_count,
            TurnOrder::Descending => tid == crate::config::TID_FIRST,
        }
    }

    /// The complete phase-2 entry sequence for `workers_count` workers.
    #[must_use]
    pub fn expected_sequence(self, workers_count: u64) -> Vec<Tid> {
        let ascending = crate::config::TID_FIRST..=workers_count;
        match self {
            TurnOrder::Ascending => ascending.collect(),
            TurnOrder::Descending => ascending.rev().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gated_role_visits_barrier() {
        let mut state = WorkerState::Created;
        let mut visited = vec![state];
        while let Some(next) = state.next(Role::Acquirer) {
            visited.push(next);
            state = next;
        }
        assert!(visited.contains(&WorkerState::BarrierWait));
        assert_eq!(visited.len(), 8);
    }

    #[test]
    fn test_ungated_role_skips_barrier() {
        assert_eq!(
            WorkerState::Phase1.next(Role::Observer),
            Some(WorkerState::CriticalSection)
        );
        assert!(!WorkerState::Phase1.can_transition_to(Role::Releaser, WorkerState::BarrierWait));
        assert_eq!(WorkerState::Terminated.next(Role::Releaser), None);
    }

    #[test]
    fn test_turn_order_sequences() {
        assert_eq!(TurnOrder::Ascending.expected_sequence(3), vec![1, 2, 3]);
        assert_eq!(TurnOrder::Descending.expected_sequence(3), vec![3, 2, 1]);
        assert_eq!(TurnOrder::Descending.initial_turn(10), 10);
        assert_eq!(TurnOrder::Descending.advance(1), 0);
        assert!(TurnOrder::Ascending.is_last(10, 10));
        assert!(TurnOrder::Descending.is_last(1, 10));
    }
}
