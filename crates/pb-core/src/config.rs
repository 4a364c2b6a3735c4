//! Compile-time configuration.
//!
//! The program itself never changes these at runtime; library callers
//! (tests, the simulation harness) override them through `ManagerConfig`.

use crate::types::Block;

/// Default stack capacity.
pub const STACK_SIZE_DEFAULT: usize = 6;

/// Hard ceiling on stack capacity (letters of the alphabet + 2 free slots).
pub const STACK_SIZE_MAX: usize = 28;

/// Smallest capacity that still holds one block plus two free slots.
pub const STACK_SIZE_MIN: usize = 3;

/// Number of snapshots an Observer takes inside its critical section.
pub const PROBER_STEPS_DEFAULT: usize = 5;

/// Acquirer workers spawned by the program.
pub const ACQUIRERS_COUNT: usize = 3;

/// Releaser workers spawned by the program.
pub const RELEASERS_COUNT: usize = 3;

/// Observer workers spawned by the program.
pub const OBSERVERS_COUNT: usize = 4;

/// Marker stored in unoccupied slots and returned by `pop`/`pick` on an empty stack.
pub const EMPTY_BLOCK: Block = '$';

/// Block a Releaser pushes when it finds the stack empty.
pub const DEFAULT_RELEASE_BLOCK: Block = 'a';

/// First TID handed out by the allocator.
pub const TID_FIRST: u64 = 1;
