//! Two-phase protocol model.
//!
//! Each worker is a program counter; the phase barrier, rendezvous and
//! turn gate are reduced to their counters. A semaphore `wait` followed
//! by its re-`signal` is split into two actions so the checker also
//! explores interleavings between them.
//!
//! # Properties
//!
//! | Property | Kind | Description |
//! |----------|------|-------------|
//! | MutualExclusion | always | At most one worker holds the stack, and it is the one in its critical section |
//! | BarrierOrdering | always | No Acquirer is in its critical section before every other worker arrived |
//! | TurnOrder | always | Phase-2 entries form a prefix of the configured TID sequence |
//! | SinglePhase2 | always | At most one worker runs phase 2 at a time |
//! | TopInBounds | always | The stack never holds more than its capacity |
//! | Termination | eventually | Every worker reaches `Done` |
//! | Phase2Reached | sometimes | Some worker runs phase 2 |

use std::hash::Hash;

use pb_core::config::{DEFAULT_RELEASE_BLOCK, STACK_SIZE_DEFAULT};
use pb_core::{Block, Role, Tid, TurnOrder};
use stateright::{Model, Property};

/// Program counter of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pc {
    Phase1,
    /// Acquirer blocked on the phase barrier
    BarrierWait,
    /// Acquirer passed the barrier and owes it the re-signal
    BarrierResignal,
    LockWait,
    Critical,
    RendPoint,
    TurnWait,
    Phase2,
    Done,
}

/// One atomic step of one worker (indexed from 0; TID is index + 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolAction {
    FinishPhase1(usize),
    PassBarrier(usize),
    ResignalBarrier(usize),
    LockStack(usize),
    /// Perform the role's stack operation and release the lock
    UnlockStack(usize),
    Rendezvous(usize),
    EnterPhase2(usize),
    FinishPhase2(usize),
}

impl ProtocolAction {
    /// Index of the worker taking this step.
    #[must_use]
    pub fn worker(&self) -> usize {
        match *self {
            ProtocolAction::FinishPhase1(i)
            | ProtocolAction::PassBarrier(i)
            | ProtocolAction::ResignalBarrier(i)
            | ProtocolAction::LockStack(i)
            | ProtocolAction::UnlockStack(i)
            | ProtocolAction::Rendezvous(i)
            | ProtocolAction::EnterPhase2(i)
            | ProtocolAction::FinishPhase2(i) => i,
        }
    }

    /// Short label for counterexample diagrams.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolAction::FinishPhase1(_) => "phase1 done",
            ProtocolAction::PassBarrier(_) => "wait(S1)",
            ProtocolAction::ResignalBarrier(_) => "signal(S1)",
            ProtocolAction::LockStack(_) => "lock(stack)",
            ProtocolAction::UnlockStack(_) => "unlock(stack)",
            ProtocolAction::Rendezvous(_) => "rendezvous",
            ProtocolAction::EnterPhase2(_) => "enter phase2",
            ProtocolAction::FinishPhase2(_) => "finish phase2",
        }
    }
}

/// Protocol variants. Anything but `Correct` is deliberately broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Correct,
    /// Acquirers skip the phase barrier
    UngatedAcquirers,
    /// The turn gate admits any waiting worker
    UnorderedTurns,
}

/// Global state of the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolState {
    pub pcs: Vec<Pc>,
    /// Phase barrier semaphore value
    pub barrier: i64,
    /// Ungated workers that signalled the barrier
    pub arrivals: usize,
    pub stack_holder: Option<usize>,
    /// Rendezvous semaphore value
    pub rendezvous: i64,
    pub turn: Tid,
    /// TIDs in phase-2 entry order
    pub phase2_log: Vec<Tid>,
    /// Occupied stack slots, bottom to top
    pub stack: Vec<Block>,
}

impl ProtocolState {
    /// Number of workers at `pc`.
    #[must_use]
    pub fn count(&self, pc: Pc) -> usize {
        self.pcs.iter().filter(|p| **p == pc).count()
    }
}

/// The protocol for a fixed population.
#[derive(Debug, Clone)]
pub struct ProtocolModel {
    roles: Vec<Role>,
    order: TurnOrder,
    capacity: usize,
    variant: Variant,
}

impl ProtocolModel {
    /// Model for workers with `roles` (TIDs assigned in that order).
    #[must_use]
    pub fn new(roles: Vec<Role>, order: TurnOrder) -> Self {
        debug_assert!(!roles.is_empty(), "Model needs at least one worker");
        Self {
            roles,
            order,
            capacity: STACK_SIZE_DEFAULT,
            variant: Variant::Correct,
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        debug_assert!(capacity >= 3, "Capacity too small: {}", capacity);
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    fn workers_count(&self) -> u64 {
        self.roles.len() as u64
    }

    fn ungated_count(&self) -> usize {
        self.roles.iter().filter(|r| !r.is_gated()).count()
    }

    /// Whether worker `i` actually waits on the barrier in this variant.
    fn waits_on_barrier(&self, i: usize) -> bool {
        self.roles[i].is_gated() && self.variant != Variant::UngatedAcquirers
    }

    fn tid(i: usize) -> Tid {
        i as Tid + 1
    }

    fn apply_role(&self, role: Role, stack: &mut Vec<Block>) {
        match role {
            Role::Acquirer => {
                stack.pop();
            }
            Role::Releaser => match stack.last().copied() {
                None => stack.push(DEFAULT_RELEASE_BLOCK),
                Some(_) if stack.len() == self.capacity => {}
                Some(top) => stack.push(char::from_u32(top as u32 + 1).unwrap_or(top)),
            },
            Role::Observer => {}
        }
    }
}

impl Model for ProtocolModel {
    type State = ProtocolState;
    type Action = ProtocolAction;

    fn init_states(&self) -> Vec<Self::State> {
        let has_openers = self.roles.iter().any(|r| r.is_gated());
        vec![ProtocolState {
            pcs: vec![Pc::Phase1; self.roles.len()],
            barrier: 1 - self.ungated_count() as i64,
            arrivals: 0,
            stack_holder: None,
            rendezvous: i64::from(!has_openers),
            turn: self.order.initial_turn(self.workers_count()),
            phase2_log: Vec::new(),
            stack: ('a'..).take(self.capacity - 2).collect(),
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (i, pc) in state.pcs.iter().enumerate() {
            match pc {
                Pc::Phase1 => actions.push(ProtocolAction::FinishPhase1(i)),
                Pc::BarrierWait if state.barrier > 0 => actions.push(ProtocolAction::PassBarrier(i)),
                Pc::BarrierResignal => actions.push(ProtocolAction::ResignalBarrier(i)),
                Pc::LockWait if state.stack_holder.is_none() => actions.push(ProtocolAction::LockStack(i)),
                Pc::Critical => actions.push(ProtocolAction::UnlockStack(i)),
                Pc::RendPoint if self.roles[i].is_gated() || state.rendezvous > 0 => {
                    actions.push(ProtocolAction::Rendezvous(i))
                }
                Pc::TurnWait => {
                    let admitted = self.variant == Variant::UnorderedTurns || state.turn == Self::tid(i);
                    if admitted && state.count(Pc::Phase2) == 0 {
                        actions.push(ProtocolAction::EnterPhase2(i));
                    }
                }
                Pc::Phase2 => actions.push(ProtocolAction::FinishPhase2(i)),
                _ => {}
            }
        }
    }

    fn next_state(&self, last: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut state = last.clone();
        let i = action.worker();
        match action {
            ProtocolAction::FinishPhase1(_) => {
                if self.waits_on_barrier(i) {
                    state.pcs[i] = Pc::BarrierWait;
                } else {
                    if !self.roles[i].is_gated() {
                        state.arrivals += 1;
                        state.barrier += 1;
                    }
                    state.pcs[i] = Pc::LockWait;
                }
            }
            ProtocolAction::PassBarrier(_) => {
                state.barrier -= 1;
                state.pcs[i] = Pc::BarrierResignal;
            }
            ProtocolAction::ResignalBarrier(_) => {
                state.barrier += 1;
                state.pcs[i] = Pc::LockWait;
            }
            ProtocolAction::LockStack(_) => {
                state.stack_holder = Some(i);
                state.pcs[i] = Pc::Critical;
            }
            ProtocolAction::UnlockStack(_) => {
                self.apply_role(self.roles[i], &mut state.stack);
                state.stack_holder = None;
                state.pcs[i] = Pc::RendPoint;
            }
            ProtocolAction::Rendezvous(_) => {
                // Openers signal; everyone else waits and re-signals, net zero.
                if self.roles[i].is_gated() {
                    state.rendezvous += 1;
                }
                state.pcs[i] = Pc::TurnWait;
            }
            ProtocolAction::EnterPhase2(_) => {
                state.phase2_log.push(Self::tid(i));
                state.pcs[i] = Pc::Phase2;
            }
            ProtocolAction::FinishPhase2(_) => {
                state.turn = self.order.advance(state.turn);
                state.pcs[i] = Pc::Done;
            }
        }
        Some(state)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::<Self>::always("MutualExclusion", |_, state| {
                state.count(Pc::Critical) <= 1
                    && state.pcs.iter().enumerate().all(|(i, pc)| {
                        (*pc == Pc::Critical) == (state.stack_holder == Some(i))
                    })
            }),
            Property::<Self>::always("BarrierOrdering", |model, state| {
                let ungated = model.ungated_count();
                state.pcs.iter().enumerate().all(|(i, pc)| {
                    !(model.roles[i].is_gated() && *pc == Pc::Critical) || state.arrivals == ungated
                })
            }),
            Property::<Self>::always("TurnOrder", |model, state| {
                let expected = model.order.expected_sequence(model.workers_count());
                expected.starts_with(&state.phase2_log)
            }),
            Property::<Self>::always("SinglePhase2", |_, state| state.count(Pc::Phase2) <= 1),
            Property::<Self>::always("TopInBounds", |model, state| state.stack.len() <= model.capacity),
            Property::<Self>::eventually("Termination", |_, state| {
                state.pcs.iter().all(|pc| *pc == Pc::Done)
            }),
            Property::<Self>::sometimes("Phase2Reached", |_, state| !state.phase2_log.is_empty()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    const MIXED: [Role; 3] = [Role::Acquirer, Role::Releaser, Role::Observer];

    #[test]
    fn test_mixed_population_ascending() {
        ProtocolModel::new(MIXED.to_vec(), TurnOrder::Ascending)
            .checker()
            .spawn_bfs()
            .join()
            .assert_properties();
    }

    #[test]
    fn test_mixed_population_descending() {
        ProtocolModel::new(MIXED.to_vec(), TurnOrder::Descending)
            .checker()
            .spawn_bfs()
            .join()
            .assert_properties();
    }

    #[test]
    fn test_two_acquirers_two_releasers() {
        let roles = vec![Role::Acquirer, Role::Acquirer, Role::Releaser, Role::Releaser];
        ProtocolModel::new(roles, TurnOrder::Ascending)
            .with_capacity(4)
            .checker()
            .spawn_bfs()
            .join()
            .assert_properties();
    }

    #[test]
    fn test_without_acquirers() {
        ProtocolModel::new(vec![Role::Releaser, Role::Observer], TurnOrder::Ascending)
            .checker()
            .spawn_bfs()
            .join()
            .assert_properties();
    }

    #[test]
    fn test_only_acquirers() {
        ProtocolModel::new(vec![Role::Acquirer; 3], TurnOrder::Ascending)
            .with_capacity(3)
            .checker()
            .spawn_bfs()
            .join()
            .assert_properties();
    }

    #[test]
    fn test_initial_state() {
        let model = ProtocolModel::new(MIXED.to_vec(), TurnOrder::Ascending);
        let state = &model.init_states()[0];
        assert_eq!(state.barrier, -1);
        assert_eq!(state.rendezvous, 0);
        assert_eq!(state.turn, 1);
        assert_eq!(state.stack, vec!['a', 'b', 'c', 'd']);
    }

    #[test]
    fn test_releaser_operations() {
        let model = ProtocolModel::new(vec![Role::Releaser], TurnOrder::Ascending).with_capacity(3);
        let mut stack = vec!['a'];
        model.apply_role(Role::Releaser, &mut stack);
        assert_eq!(stack, vec!['a', 'b']);
        model.apply_role(Role::Releaser, &mut stack);
        model.apply_role(Role::Releaser, &mut stack);
        assert_eq!(stack, vec!['a', 'b', 'c']);

        let mut empty = Vec::new();
        model.apply_role(Role::Releaser, &mut empty);
        assert_eq!(empty, vec![DEFAULT_RELEASE_BLOCK]);
    }

    #[test]
    fn test_detects_ungated_acquirers() {
        let checker = ProtocolModel::new(vec![Role::Acquirer, Role::Releaser], TurnOrder::Ascending)
            .with_variant(Variant::UngatedAcquirers)
            .checker()
            .spawn_bfs()
            .join();
        assert!(checker.discovery("BarrierOrdering").is_some());
        assert!(checker.discovery("MutualExclusion").is_none());
    }

    #[test]
    fn test_detects_unordered_turns() {
        let checker = ProtocolModel::new(vec![Role::Releaser, Role::Observer], TurnOrder::Ascending)
            .with_variant(Variant::UnorderedTurns)
            .checker()
            .spawn_bfs()
            .join();
        assert!(checker.discovery("TurnOrder").is_some());
        assert!(checker.discovery("SinglePhase2").is_none());
    }
}
