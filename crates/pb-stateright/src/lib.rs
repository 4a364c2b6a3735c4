//! # pb-stateright
//!
//! Stateright model of the two-phase block protocol.
//!
//! The model abstracts each worker to a program counter and each
//! synchronization primitive to its counter value, then lets stateright
//! explore every interleaving of a small population.
//!
//! ## Usage
//!
//! ```ignore
//! cargo test -p pb-stateright
//! ```
//!
//! ```ignore
//! use pb_stateright::{check_model, ProtocolModel};
//! use pb_core::{Role, TurnOrder};
//!
//! let model = ProtocolModel::new(vec![Role::Acquirer, Role::Releaser], TurnOrder::Ascending);
//! let result = check_model(model, 1);
//! assert!(result.passed, "{}", result.format());
//! ```
//!
//! ## Modules
//!
//! - `protocol`: the model, its state and its properties
//! - `verifier`: runs the BFS checker and collects violations

pub mod protocol;
pub mod verifier;

pub use protocol::{Pc, ProtocolAction, ProtocolModel, ProtocolState, Variant};
pub use verifier::{check_model, ModelCheckResult};
