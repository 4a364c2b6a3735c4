//! Worker state machine.
//!
//! One `Worker` per thread, tagged with its `Role`. All roles share the
//! same lifecycle; only the critical-section body differs:
//!
//! | Role | Critical section |
//! |------|------------------|
//! | Acquirer | pop the top block (nothing on an empty stack) |
//! | Releaser | push the successor of the top; keep the top when full; push `DEFAULT_RELEASE_BLOCK` when empty |
//! | Observer | take `prober_steps` snapshots, no mutation |
//!
//! Every state change is recorded as a `ProtocolEvent` stamped with the
//! context's global step, so the orchestrator can merge the per-worker
//! logs into one ordered history.

use std::sync::Arc;
use std::thread;

use pb_core::config::DEFAULT_RELEASE_BLOCK;
use pb_core::invariants::{EventKind, ProtocolEvent};
use pb_core::{Block, Role, StackError, SyncError, Tid, WorkerState};
use pb_stack::{successor, BlockStack, StackSnapshot};
use pb_sync::TurnTicket;
use tracing::{debug, error, info};

use crate::context::SharedContext;
use crate::jitter::phase1_delay;

/// Stack operation that failed inside a critical section.
type CriticalResult = Result<(), (&'static str, StackError)>;

/// What a finished worker hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub tid: Tid,
    pub role: Role,
    /// Block popped (Acquirer) or pushed/kept (Releaser)
    pub block: Option<Block>,
    /// Counted stack accesses this worker performed
    pub accesses: u64,
    /// This worker's protocol events, in step order
    pub events: Vec<ProtocolEvent>,
    /// Observer snapshots
    pub snapshots: Vec<StackSnapshot>,
}

/// A single worker, run to completion on its own thread.
pub struct Worker {
    tid: Tid,
    role: Role,
    state: WorkerState,
    ctx: Arc<SharedContext>,
    block: Option<Block>,
    accesses: u64,
    events: Vec<ProtocolEvent>,
    snapshots: Vec<StackSnapshot>,
}

impl Worker {
    /// Create a worker, allocating its TID from the context.
    pub fn new(role: Role, ctx: Arc<SharedContext>) -> Self {
        let tid = ctx.tids.next();
        let mut worker = Self {
            tid,
            role,
            state: WorkerState::Created,
            ctx,
            block: None,
            accesses: 0,
            events: Vec::new(),
            snapshots: Vec::new(),
        };
        worker.record(EventKind::Enter(WorkerState::Created));
        debug!(tid, role = %role, "created");
        worker
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Run the whole protocol.
    ///
    /// Any failure aborts the shared context before returning, so no other
    /// worker stays blocked behind this one.
    pub fn run(mut self) -> Result<WorkerOutcome, SyncError> {
        match self.run_protocol() {
            Ok(()) => Ok(self.into_outcome()),
            Err(e) => {
                self.ctx.abort();
                error!(tid = self.tid, role = %self.role, state = %self.state, error = %e, "worker stopped");
                Err(e)
            }
        }
    }

    fn run_protocol(&mut self) -> Result<(), SyncError> {
        self.transition(WorkerState::Phase1);
        self.phase1()?;

        if self.role.is_gated() {
            self.transition(WorkerState::BarrierWait);
            let pass = self.ctx.barrier.wait()?;
            debug!(tid = self.tid, position = pass.position, "crossed phase barrier");
            if pass.is_last {
                info!(tid = self.tid, "all workers have completed phase I");
            }
        } else {
            // Recorded before the signal so it orders before any gated entry.
            self.record(EventKind::BarrierArrive);
            self.ctx.barrier.arrive();
        }

        self.critical_section()?;

        if self.role.is_gated() {
            self.ctx.rendezvous.open();
        } else {
            self.ctx.rendezvous.pass()?;
        }

        self.transition(WorkerState::TurnWait);
        let ctx = Arc::clone(&self.ctx);
        ctx.turn_gate.enter(self.tid, |ticket| self.phase2(ticket))?;

        self.transition(WorkerState::Terminated);
        Ok(())
    }

    fn phase1(&mut self) -> Result<(), SyncError> {
        if let Some(jitter) = self.ctx.phase1_jitter() {
            let delay = phase1_delay(jitter, self.tid);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        info!(tid = self.tid, role = %self.role, "running phase I");
        let turn = self.ctx.turn_gate.current_turn()?;
        self.log_stats("phase I", turn);
        Ok(())
    }

    /// Runs while holding the turn gate.
    fn phase2(&mut self, ticket: TurnTicket) {
        self.transition(WorkerState::Phase2);
        info!(tid = self.tid, role = %self.role, position = ticket.position, "running phase II");
        self.log_stats("phase II", ticket.tid);
        if ticket.is_last {
            info!(tid = self.tid, "all workers have completed phase II");
        }
    }

    fn log_stats(&self, phase: &'static str, turn: Tid) {
        let next_tid = self.ctx.tids.peek_next();
        let checksum = next_tid * 100 + self.tid * 10 + turn;
        debug!(tid = self.tid, next_tid, turn, checksum, "{} stats", phase);
    }

    fn critical_section(&mut self) -> Result<(), SyncError> {
        let ctx = Arc::clone(&self.ctx);
        let mut stack = ctx.stack.lock()?;
        if ctx.is_aborted() {
            return Err(SyncError::interrupted("stack", "run aborted"));
        }

        self.transition(WorkerState::CriticalSection);
        stack.set_actor(Some(self.tid));
        let result = match self.role {
            Role::Acquirer => self.acquire(&mut stack),
            Role::Releaser => self.release(&mut stack),
            Role::Observer => self.observe(&mut stack),
        };
        stack.set_actor(None);

        if let Err((operation, source)) = result {
            let fault = SyncError::Fault {
                role: self.role,
                tid: self.tid,
                operation,
                message: source.to_string(),
            };
            error!(tid = self.tid, top = stack.top(), error = %fault, "fault in critical section");
            // Abort while still holding the stack so nobody sees the faulted state.
            ctx.abort();
            return Err(fault);
        }

        self.transition(WorkerState::RendPoint);
        Ok(())
    }

    fn acquire(&mut self, stack: &mut BlockStack) -> CriticalResult {
        if stack.is_empty() {
            info!(tid = self.tid, "stack is empty, nothing to acquire");
            return Ok(());
        }
        self.accesses += 1;
        let block = stack.pop();
        self.block = Some(block);
        info!(tid = self.tid, block = %block, top = stack.top(), "acquired block");
        Ok(())
    }

    fn release(&mut self, stack: &mut BlockStack) -> CriticalResult {
        let block = if stack.is_empty() {
            DEFAULT_RELEASE_BLOCK
        } else {
            self.accesses += 1;
            let top = stack.pick();
            if stack.is_full() {
                self.block = Some(top);
                info!(tid = self.tid, block = %top, "stack is full, top left unchanged");
                return Ok(());
            }
            successor(top).map_err(|e| ("successor", e))?
        };

        self.accesses += 1;
        stack.push(block).map_err(|e| ("push", e))?;
        self.block = Some(block);
        info!(tid = self.tid, block = %block, top = stack.top(), "released block");
        Ok(())
    }

    fn observe(&mut self, stack: &mut BlockStack) -> CriticalResult {
        for probe in 0..self.ctx.prober_steps() {
            self.accesses += stack.capacity() as u64;
            let snapshot = stack.snapshot().map_err(|e| ("snapshot", e))?;
            info!(tid = self.tid, probe, "{}", snapshot);
            self.snapshots.push(snapshot);
        }
        Ok(())
    }

    fn transition(&mut self, to: WorkerState) {
        debug_assert!(
            self.state.can_transition_to(self.role, to),
            "{} [TID={}] cannot go from {} to {}",
            self.role,
            self.tid,
            self.state,
            to
        );
        self.state = to;
        self.record(EventKind::Enter(to));
    }

    fn record(&mut self, kind: EventKind) {
        let step = self.ctx.next_step();
        self.events.push(ProtocolEvent {
            step,
            tid: self.tid,
            role: self.role,
            kind,
        });
    }

    fn into_outcome(self) -> WorkerOutcome {
        WorkerOutcome {
            tid: self.tid,
            role: self.role,
            block: self.block,
            accesses: self.accesses,
            events: self.events,
            snapshots: self.snapshots,
        }
    }
}
