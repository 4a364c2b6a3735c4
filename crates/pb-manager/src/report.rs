//! Final run report.

use std::fmt;

use pb_core::invariants::ProtocolHistory;
use pb_core::{Block, Role, Tid, TurnOrder};
use pb_stack::{BlockStack, StackSnapshot};
use serde::Serialize;

/// Per-worker line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub tid: Tid,
    pub role: Role,
    pub block: Option<Block>,
    pub accesses: u64,
    /// Observer snapshots, in the order taken
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<StackSnapshot>,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub turn_order: TurnOrder,
    /// Workers in creation (TID) order
    pub workers: Vec<WorkerSummary>,
    /// TIDs in the order they ran phase 2
    pub phase2_order: Vec<Tid>,
    pub capacity: usize,
    pub top: isize,
    pub top_block: Block,
    /// Block directly below the top, when one exists
    pub below_top: Option<Block>,
    /// Stack access counter at the end of the run
    pub access_count: u64,
    /// Accesses tallied by the workers and the orchestrator themselves
    pub accesses_performed: u64,
    /// Highest simultaneous occupancy of the stack lock
    pub stack_max_occupancy: usize,
    /// `[a][b](c)[$]` rendering, top in parentheses
    pub rendered: String,
    #[serde(skip)]
    pub stack: BlockStack,
    #[serde(skip)]
    pub history: ProtocolHistory,
}

impl RunReport {
    #[must_use]
    pub fn workers_count(&self) -> u64 {
        self.workers.len() as u64
    }

    /// Whether the access counter matches what callers actually did.
    #[must_use]
    pub fn accounting_holds(&self) -> bool {
        self.access_count == self.accesses_performed
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Final stack size: {}", self.capacity)?;
        writeln!(f, "Top index: {}", self.top)?;
        writeln!(f, "Top block: {}", self.top_block)?;
        match self.below_top {
            Some(block) => writeln!(f, "Block below top: {}", block)?,
            None => writeln!(f, "Block below top: (none)")?,
        }
        writeln!(f, "Stack access count: {}", self.access_count)?;
        writeln!(f, "Stack: {}", self.rendered)?;

        write!(f, "Phase II order ({:?}):", self.turn_order)?;
        for tid in &self.phase2_order {
            write!(f, " {}", tid)?;
        }
        writeln!(f)?;

        for worker in &self.workers {
            let block = worker.block.map_or_else(|| "-".to_string(), |b| b.to_string());
            writeln!(
                f,
                "  {} [TID={}] block={} accesses={}",
                worker.role.tag(),
                worker.tid,
                block,
                worker.accesses
            )?;
        }
        Ok(())
    }
}
