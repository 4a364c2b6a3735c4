//! Two-phase protocol invariants.
//!
//! Checked against the merged history of worker events. Every event
//! carries a global step drawn from one shared counter, so sorting by
//! step yields a real-time order consistent with every lock hand-off.
//!
//! | Property | Description |
//! |----------|-------------|
//! | TurnOrder | Phase-2 entries follow the configured TID sequence exactly |
//! | BarrierOrdering | No gated worker enters its critical section before every ungated worker finished phase 1 |
//! | CriticalSectionExclusion | Critical-section intervals never overlap |
//! | MutualExclusion | Instrumented lock occupancy never exceeded 1 |
//! | LifecycleOrder | Each worker walks its role's state machine without skipping |

use std::collections::BTreeMap;

use crate::counterexample::{Counterexample, ThreadAction};
use crate::property::{PropertyChecker, PropertyResult};
use crate::types::{Role, Tid, TurnOrder, WorkerState};

/// Something a worker did at a global step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The worker entered a lifecycle state.
    Enter(WorkerState),
    /// An ungated worker signalled the phase barrier.
    BarrierArrive,
}

/// One recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolEvent {
    pub step: u64,
    pub tid: Tid,
    pub role: Role,
    pub kind: EventKind,
}

/// Merged, step-ordered history of a run.
#[derive(Debug, Clone, Default)]
pub struct ProtocolHistory {
    events: Vec<ProtocolEvent>,
}

impl ProtocolHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one worker's events into the history.
    pub fn extend(&mut self, events: impl IntoIterator<Item = ProtocolEvent>) {
        self.events.extend(events);
        self.events.sort_by_key(|e| e.step);
    }

    /// All events in step order.
    #[must_use]
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// TIDs in the order they entered `state`.
    #[must_use]
    pub fn entries_into(&self, state: WorkerState) -> Vec<Tid> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::Enter(state))
            .map(|e| e.tid)
            .collect()
    }

    fn counterexample(&self, description: String, dst_seed: Option<u64>) -> Counterexample {
        let mut ce = match dst_seed {
            Some(seed) => Counterexample::with_seed(seed),
            None => Counterexample::new(),
        }
        .with_description(description);
        for event in &self.events {
            let action = match event.kind {
                EventKind::Enter(state) => state.to_string(),
                EventKind::BarrierArrive => "arrive(S1)".to_string(),
            };
            ce.add_action(ThreadAction {
                tid: event.tid,
                step: event.step,
                action,
            });
        }
        ce
    }
}

/// Checks protocol invariants for one completed run.
pub struct ProtocolChecker<'a> {
    history: &'a ProtocolHistory,
    order: TurnOrder,
    workers_count: u64,
    max_occupancy: Option<usize>,
    dst_seed: Option<u64>,
}

impl<'a> ProtocolChecker<'a> {
    #[must_use]
    pub fn new(history: &'a ProtocolHistory, order: TurnOrder, workers_count: u64) -> Self {
        Self {
            history,
            order,
            workers_count,
            max_occupancy: None,
            dst_seed: None,
        }
    }

    /// Include the instrumented lock occupancy.
    #[must_use]
    pub fn with_max_occupancy(mut self, max_occupancy: usize) -> Self {
        self.max_occupancy = Some(max_occupancy);
        self
    }

    /// Set DST seed for counterexample reproduction.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.dst_seed = Some(seed);
        self
    }

    fn check_turn_order(&self) -> PropertyResult {
        let actual = self.history.entries_into(WorkerState::Phase2);
        let expected = self.order.expected_sequence(self.workers_count);
        if actual != expected {
            let description = format!("phase-2 order {:?}, expected {:?}", actual, expected);
            return PropertyResult::fail(
                "TurnOrder",
                description.clone(),
                Some(self.history.counterexample(description, self.dst_seed)),
            );
        }
        PropertyResult::pass("TurnOrder")
    }

    fn check_barrier_ordering(&self) -> PropertyResult {
        let ungated: Vec<Tid> = self.tids_where(|role| !role.is_gated());
        let mut arrived = 0usize;

        for event in self.history.events() {
            match event.kind {
                EventKind::BarrierArrive => arrived += 1,
                EventKind::Enter(WorkerState::CriticalSection)
                    if event.role.is_gated() && arrived < ungated.len() =>
                {
                    let description = format!(
                        "{} [TID={}] entered its critical section after {} of {} barrier arrivals",
                        event.role,
                        event.tid,
                        arrived,
                        ungated.len()
                    );
                    return PropertyResult::fail(
                        "BarrierOrdering",
                        description.clone(),
                        Some(self.history.counterexample(description, self.dst_seed)),
                    );
                }
                _ => {}
            }
        }
        PropertyResult::pass("BarrierOrdering")
    }

    fn check_critical_section_exclusion(&self) -> PropertyResult {
        let mut holder: Option<Tid> = None;
        for event in self.history.events() {
            match event.kind {
                EventKind::Enter(WorkerState::CriticalSection) => {
                    if let Some(inside) = holder {
                        let description = format!(
                            "TID={} entered the critical section while TID={} was inside (step {})",
                            event.tid, inside, event.step
                        );
                        return PropertyResult::fail(
                            "CriticalSectionExclusion",
                            description.clone(),
                            Some(self.history.counterexample(description, self.dst_seed)),
                        );
                    }
                    holder = Some(event.tid);
                }
                EventKind::Enter(WorkerState::RendPoint) if holder == Some(event.tid) => {
                    holder = None;
                }
                _ => {}
            }
        }
        PropertyResult::pass("CriticalSectionExclusion")
    }

    fn check_mutual_exclusion(&self) -> PropertyResult {
        match self.max_occupancy {
            Some(occupancy) if occupancy > 1 => PropertyResult::fail(
                "MutualExclusion",
                format!("{} workers held the stack lock at once", occupancy),
                None,
            ),
            _ => PropertyResult::pass("MutualExclusion"),
        }
    }

    fn check_lifecycle_order(&self) -> PropertyResult {
        let mut per_worker: BTreeMap<Tid, (Role, Vec<WorkerState>)> = BTreeMap::new();
        for event in self.history.events() {
            if let EventKind::Enter(state) = event.kind {
                per_worker
                    .entry(event.tid)
                    .or_insert_with(|| (event.role, Vec::new()))
                    .1
                    .push(state);
            }
        }

        for (tid, (role, states)) in &per_worker {
            let mut expected = Some(WorkerState::Created);
            for state in states {
                if expected != Some(*state) {
                    return PropertyResult::fail(
                        "LifecycleOrder",
                        format!(
                            "{} [TID={}] entered {} but expected {:?}",
                            role, tid, state, expected
                        ),
                        None,
                    );
                }
                expected = state.next(*role);
            }
            if states.last() != Some(&WorkerState::Terminated) {
                return PropertyResult::fail(
                    "LifecycleOrder",
                    format!("{} [TID={}] never terminated", role, tid),
                    None,
                );
            }
        }

        if per_worker.len() as u64 != self.workers_count {
            return PropertyResult::fail(
                "LifecycleOrder",
                format!(
                    "{} workers recorded, expected {}",
                    per_worker.len(),
                    self.workers_count
                ),
                None,
            );
        }
        PropertyResult::pass("LifecycleOrder")
    }

    fn tids_where(&self, predicate: impl Fn(Role) -> bool) -> Vec<Tid> {
        let mut tids: Vec<Tid> = self
            .history
            .events()
            .iter()
            .filter(|e| predicate(e.role))
            .map(|e| e.tid)
            .collect();
        tids.sort_unstable();
        tids.dedup();
        tids
    }
}

impl PropertyChecker for ProtocolChecker<'_> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_turn_order(),
            self.check_barrier_ordering(),
            self.check_critical_section_exclusion(),
            self.check_mutual_exclusion(),
            self.check_lifecycle_order(),
        ]
    }
}
