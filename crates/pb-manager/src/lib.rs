//! # pb-manager
//!
//! Runs a fixed population of worker threads through a two-phase protocol
//! against one shared bounded stack.
//!
//! ```text
//! PHASE1 ──> [barrier] ──> CRITICAL_SECTION ──> REND_POINT ──> TURN_WAIT ──> PHASE2
//!   (any order)  (Acquirers    (one worker at a time)             (strict TID order)
//!                 wait here)
//! ```
//!
//! | Component | Role |
//! |-----------|------|
//! | `SharedContext` | Stack lock, barrier, rendezvous, turn gate, TID allocator |
//! | `Worker` | Per-thread state machine, role-specific critical section |
//! | `BlockManager` | Creates, starts and joins workers, builds the `RunReport` |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pb_manager::{BlockManager, ManagerConfig};
//!
//! let manager = BlockManager::new(ManagerConfig::default()).unwrap();
//! let report = manager.run().unwrap();
//! println!("{}", report);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod jitter;
pub mod orchestrator;
pub mod report;
pub mod worker;

pub use config::{ManagerConfig, Phase1Jitter};
pub use context::{SharedContext, TidAllocator};
pub use error::ManagerError;
pub use orchestrator::{start_order, BlockManager};
pub use report::{RunReport, WorkerSummary};
pub use worker::{Worker, WorkerOutcome};
