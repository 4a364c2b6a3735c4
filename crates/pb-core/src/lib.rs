//! # pb-core
//!
//! Core types and invariants for the phased block manager.
//!
//! This crate provides:
//! - Worker vocabulary: `Tid`, `Role`, `WorkerState`, `TurnOrder`
//! - Compile-time configuration constants (`config`)
//! - The error taxonomy shared by every layer (`SyncError`, `StackError`)
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failing interleavings
//! - Invariant checkers for the bounded stack and the two-phase protocol

pub mod config;
pub mod counterexample;
pub mod error;
pub mod invariants;
pub mod property;
pub mod types;

pub use counterexample::{Counterexample, StateSnapshot, ThreadAction};
pub use error::{StackError, SyncError};
pub use property::{PropertyChecker, PropertyResult};
pub use types::{Block, Role, Tid, TurnOrder, WorkerState};
