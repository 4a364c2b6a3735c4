//! Creates, starts and joins the worker population.

use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use pb_core::invariants::ProtocolHistory;
use pb_core::{Role, SyncError, Tid};
use tracing::{error, info};

use crate::config::ManagerConfig;
use crate::context::SharedContext;
use crate::error::ManagerError;
use crate::report::{RunReport, WorkerSummary};
use crate::worker::{Worker, WorkerOutcome};

type WorkerHandle = JoinHandle<Result<WorkerOutcome, SyncError>>;

/// Role sequence used to interleave thread starts; repeats until every
/// worker is started.
const START_PATTERN: [Role; 10] = [
    Role::Acquirer,
    Role::Observer,
    Role::Releaser,
    Role::Observer,
    Role::Acquirer,
    Role::Observer,
    Role::Releaser,
    Role::Acquirer,
    Role::Observer,
    Role::Releaser,
];

/// Start order (as creation indices) for workers created with `roles`.
///
/// Within a role, workers start in creation order.
#[must_use]
pub fn start_order(roles: &[Role]) -> Vec<usize> {
    let mut queues: [VecDeque<usize>; 3] = Default::default();
    for (index, role) in roles.iter().enumerate() {
        queues[role_slot(*role)].push_back(index);
    }

    let mut order = Vec::with_capacity(roles.len());
    while order.len() < roles.len() {
        for role in START_PATTERN {
            if let Some(index) = queues[role_slot(role)].pop_front() {
                order.push(index);
            }
        }
    }
    order
}

fn role_slot(role: Role) -> usize {
    match role {
        Role::Acquirer => 0,
        Role::Releaser => 1,
        Role::Observer => 2,
    }
}

/// Runs one complete two-phase protocol.
#[derive(Debug, Clone)]
pub struct BlockManager {
    config: ManagerConfig,
}

impl BlockManager {
    pub fn new(config: ManagerConfig) -> Result<Self, ManagerError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Roles in creation order: Acquirers, then Releasers, then Observers.
    fn roles(&self) -> Vec<Role> {
        let mut roles = Vec::with_capacity(self.config.workers_count());
        roles.extend(std::iter::repeat(Role::Acquirer).take(self.config.acquirers_count));
        roles.extend(std::iter::repeat(Role::Releaser).take(self.config.releasers_count));
        roles.extend(std::iter::repeat(Role::Observer).take(self.config.observers_count));
        roles
    }

    /// Create every worker, start them interleaved, join them all and
    /// report the final stack.
    ///
    /// If any worker fails, the remaining ones are interrupted and still
    /// joined; the first fault (or, failing that, the first interruption)
    /// is returned.
    pub fn run(&self) -> Result<RunReport, ManagerError> {
        let ctx = Arc::new(SharedContext::new(&self.config)?);
        self.run_in(ctx)
    }

    /// `run` against a context built from this manager's config.
    fn run_in(&self, ctx: Arc<SharedContext>) -> Result<RunReport, ManagerError> {
        let mut orchestrator_accesses = 0u64;

        {
            let mut stack = ctx.stack.lock()?;
            let block = stack.pick();
            orchestrator_accesses += 1;
            info!(top = stack.top(), block = %block, capacity = stack.capacity(), "initial stack");
        }

        let roles = self.roles();
        let mut pending: Vec<Option<Worker>> = roles
            .iter()
            .map(|&role| Some(Worker::new(role, Arc::clone(&ctx))))
            .collect();
        let mut handles: Vec<Option<WorkerHandle>> = (0..roles.len()).map(|_| None).collect();

        for index in start_order(&roles) {
            let Some(worker) = pending[index].take() else {
                continue;
            };
            let (tid, role) = (worker.tid(), worker.role());
            match spawn_worker(worker, Arc::clone(&ctx)) {
                Ok(handle) => handles[index] = Some(handle),
                Err(source) => {
                    error!(tid, role = %role, error = %source, "spawn failed");
                    ctx.abort();
                    join_all(handles);
                    return Err(ManagerError::Spawn { role, tid, source });
                }
            }
        }

        let (outcomes, first_error) = join_all(handles);
        if let Some(e) = first_error {
            return Err(e.into());
        }

        let mut history = ProtocolHistory::new();
        for outcome in &outcomes {
            history.extend(outcome.events.iter().copied());
        }
        let worker_accesses: u64 = outcomes.iter().map(|o| o.accesses).sum();
        let phase2_order = ctx.turn_gate.entries()?;

        let mut stack = ctx.stack.lock()?;
        let rendered = stack.snapshot()?.to_string();
        orchestrator_accesses += stack.capacity() as u64;
        let top = stack.top();
        let top_block = stack.pick();
        orchestrator_accesses += 1;
        let below_top = if top >= 1 {
            orchestrator_accesses += 1;
            Some(stack.get_at(top - 1)?)
        } else {
            None
        };

        let report = RunReport {
            turn_order: self.config.turn_order,
            workers: outcomes
                .iter()
                .map(|o| WorkerSummary {
                    tid: o.tid,
                    role: o.role,
                    block: o.block,
                    accesses: o.accesses,
                    snapshots: o.snapshots.clone(),
                })
                .collect(),
            phase2_order,
            capacity: stack.capacity(),
            top,
            top_block,
            below_top,
            access_count: stack.access_count(),
            accesses_performed: worker_accesses + orchestrator_accesses,
            stack_max_occupancy: ctx.stack.max_occupancy(),
            rendered,
            stack: (*stack).clone(),
            history,
        };
        drop(stack);

        info!(
            top = report.top,
            block = %report.top_block,
            accesses = report.access_count,
            stack = %report.rendered,
            "run complete"
        );
        Ok(report)
    }
}

fn spawn_worker(worker: Worker, ctx: Arc<SharedContext>) -> io::Result<WorkerHandle> {
    let (tid, role) = (worker.tid(), worker.role());
    spawn_guarded(tid, role, ctx, move || worker.run())
}

/// Run `body` on a named thread; a panic becomes a `Fault` and aborts the run.
fn spawn_guarded<F>(tid: Tid, role: Role, ctx: Arc<SharedContext>, body: F) -> io::Result<WorkerHandle>
where
    F: FnOnce() -> Result<WorkerOutcome, SyncError> + Send + 'static,
{
    thread::Builder::new()
        .name(format!("{}-{}", role.tag(), tid))
        .spawn(move || match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(result) => result,
            Err(payload) => {
                ctx.abort();
                let fault = SyncError::Fault {
                    role,
                    tid,
                    operation: "run",
                    message: panic_message(payload.as_ref()),
                };
                error!(tid, role = %role, error = %fault, "worker panicked");
                Err(fault)
            }
        })
}

/// Join every started worker in creation order.
fn join_all(handles: Vec<Option<WorkerHandle>>) -> (Vec<WorkerOutcome>, Option<SyncError>) {
    let mut outcomes = Vec::with_capacity(handles.len());
    let mut first_error: Option<SyncError> = None;

    for handle in handles.into_iter().flatten() {
        let result = handle.join().unwrap_or_else(|payload| {
            Err(SyncError::interrupted("join", panic_message(payload.as_ref())))
        });
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                let keep_previous = first_error.as_ref().is_some_and(|prev| prev.is_fault() || !e.is_fault());
                if !keep_previous {
                    first_error = Some(e);
                }
            }
        }
    }
    (outcomes, first_error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pb_core::config::EMPTY_BLOCK;

    #[test]
    fn test_default_start_order() {
        let manager = BlockManager::new(ManagerConfig::default()).unwrap();
        let tids: Vec<usize> = start_order(&manager.roles()).iter().map(|i| i + 1).collect();
        assert_eq!(tids, vec![1, 7, 4, 8, 2, 9, 5, 3, 10, 6]);
    }

    #[test]
    fn test_start_order_covers_uneven_populations() {
        let roles = [
            Role::Acquirer,
            Role::Releaser,
            Role::Releaser,
            Role::Releaser,
            Role::Releaser,
        ];
        let mut order = start_order(&roles);
        assert_eq!(order[0], 0);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_creation_order_groups_roles() {
        let manager = BlockManager::new(ManagerConfig::default()).unwrap();
        let roles = manager.roles();
        assert_eq!(&roles[..3], &[Role::Acquirer; 3]);
        assert_eq!(&roles[3..6], &[Role::Releaser; 3]);
        assert_eq!(&roles[6..], &[Role::Observer; 4]);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    fn solo_releaser_with_observers() -> ManagerConfig {
        ManagerConfig {
            acquirers_count: 0,
            releasers_count: 1,
            observers_count: 2,
            ..ManagerConfig::default()
        }
    }

    #[test]
    fn test_worker_fault_fails_the_run() {
        let manager = BlockManager::new(solo_releaser_with_observers()).unwrap();
        let ctx = Arc::new(SharedContext::new(&manager.config).unwrap());
        // The Releaser (TID 1) finds a top with no successor.
        ctx.stack.lock().unwrap().push(EMPTY_BLOCK).unwrap();

        let err = manager.run_in(Arc::clone(&ctx)).unwrap_err();
        assert!(err.is_fault());
        assert!(matches!(
            err,
            ManagerError::Sync(SyncError::Fault { tid: 1, role: Role::Releaser, .. })
        ));
        assert!(ctx.is_aborted());
        // Every thread was joined: TIDs 1..=3 were handed out and nobody entered phase II.
        assert_eq!(ctx.tids.peek_next(), 4);
        assert!(ctx.turn_gate.entries().unwrap().is_empty());
    }

    #[test]
    fn test_panic_becomes_fault_and_aborts() {
        let ctx = Arc::new(SharedContext::new(&solo_releaser_with_observers()).unwrap());
        let handle = spawn_guarded(5, Role::Observer, Arc::clone(&ctx), || panic!("observer overran")).unwrap();

        let err = handle.join().unwrap().unwrap_err();
        match err {
            SyncError::Fault { tid, role, operation, message } => {
                assert_eq!((tid, role, operation), (5, Role::Observer, "run"));
                assert_eq!(message, "observer overran");
            }
            other => panic!("expected a fault, got {other}"),
        }
        assert!(ctx.is_aborted());
    }

    #[test]
    fn test_panic_in_critical_section_keeps_stack_locked() {
        let ctx = Arc::new(SharedContext::new(&solo_releaser_with_observers()).unwrap());
        let inner = Arc::clone(&ctx);
        let handle = spawn_guarded(1, Role::Releaser, Arc::clone(&ctx), move || {
            let mut stack = inner.stack.lock()?;
            stack.pop();
            panic!("half-finished release");
        })
        .unwrap();

        assert!(handle.join().unwrap().unwrap_err().is_fault());
        assert!(ctx.stack.is_poisoned());
        assert!(ctx.stack.lock().is_err());
    }

    #[test]
    fn test_join_prefers_fault_over_interruption() {
        let interrupted = thread::spawn(|| -> Result<WorkerOutcome, SyncError> {
            Err(SyncError::interrupted("barrier", "run aborted"))
        });
        let fault = thread::spawn(|| -> Result<WorkerOutcome, SyncError> {
            Err(SyncError::Fault {
                role: Role::Releaser,
                tid: 2,
                operation: "push",
                message: "overflow".to_string(),
            })
        });
        let late = thread::spawn(|| -> Result<WorkerOutcome, SyncError> {
            Err(SyncError::interrupted("turn", "run aborted"))
        });

        let (outcomes, first_error) = join_all(vec![Some(interrupted), None, Some(fault), Some(late)]);
        assert!(outcomes.is_empty());
        assert!(matches!(first_error, Some(SyncError::Fault { tid: 2, .. })));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = ManagerConfig {
            prober_steps: 0,
            ..ManagerConfig::default()
        };
        assert!(matches!(BlockManager::new(config), Err(ManagerError::Config(_))));
    }
}
