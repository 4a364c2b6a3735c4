//! Bounded block stack.
//!
//! # Invariants
//!
//! | Property | Verified By |
//! |----------|-------------|
//! | TopInBounds | `StackPropertyChecker`, DST |
//! | EmptyAboveTop | `StackPropertyChecker` |
//! | TopDelta | journal replay |
//! | AccessAccounting | DST end-to-end runs |
//!
//! Every call to `pick`, `get_at`, `push` and `pop` bumps the access
//! counter exactly once, including reads and calls that return the
//! sentinel or an error.

use pb_core::config::{EMPTY_BLOCK, STACK_SIZE_DEFAULT, STACK_SIZE_MAX, STACK_SIZE_MIN};
use pb_core::invariants::stack::{StackHistory, StackOpType, StackOperation, StackProperties};
use pb_core::{Block, StackError, Tid};

use crate::snapshot::StackSnapshot;

/// Fixed-capacity stack of blocks.
#[derive(Debug, Clone)]
pub struct BlockStack {
    slots: Vec<Block>,
    /// Index of the top block, `-1` when empty.
    top: isize,
    access_count: u64,
    /// Worker on whose behalf the next mutations are journaled.
    actor: Option<Tid>,
    history: StackHistory,
}

impl BlockStack {
    /// Default stack: `a b c d $ $`, top at `d`.
    #[must_use]
    pub fn new() -> Self {
        Self::filled(STACK_SIZE_DEFAULT)
    }

    /// Stack of `capacity` slots: letters in all but the last two, which are empty.
    pub fn with_capacity(capacity: usize) -> Result<Self, StackError> {
        if !(STACK_SIZE_MIN..=STACK_SIZE_MAX).contains(&capacity) {
            return Err(StackError::InvalidCapacity {
                requested: capacity,
                min: STACK_SIZE_MIN,
                max: STACK_SIZE_MAX,
            });
        }
        Ok(Self::filled(capacity))
    }

    fn filled(capacity: usize) -> Self {
        debug_assert!((STACK_SIZE_MIN..=STACK_SIZE_MAX).contains(&capacity));
        let occupied = capacity - 2;
        let mut slots: Vec<Block> = ('a'..).take(occupied).collect();
        slots.resize(capacity, EMPTY_BLOCK);

        Self {
            history: StackHistory::new(slots[..occupied].to_vec()),
            slots,
            top: occupied as isize - 1,
            access_count: 0,
            actor: None,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the top block, `-1` when empty.
    pub fn top(&self) -> isize {
        self.top
    }

    pub fn is_empty(&self) -> bool {
        self.top == -1
    }

    pub fn is_full(&self) -> bool {
        self.top == self.capacity() as isize - 1
    }

    /// Counted accesses so far.
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Attribute subsequent journal entries to `tid` (`None` to clear).
    pub fn set_actor(&mut self, tid: Option<Tid>) {
        self.actor = tid;
    }

    /// Top block without mutation; `EMPTY_BLOCK` when empty.
    pub fn pick(&mut self) -> Block {
        self.access_count += 1;
        if self.is_empty() {
            return EMPTY_BLOCK;
        }
        self.slots[self.top as usize]
    }

    /// Block at `index`, bounds-checked.
    pub fn get_at(&mut self, index: isize) -> Result<Block, StackError> {
        self.access_count += 1;
        usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get(i).copied())
            .ok_or(StackError::OutOfBounds {
                index,
                capacity: self.capacity(),
            })
    }

    /// Write `block` at `top + 1`. Pushing onto a full stack is a caller bug.
    pub fn push(&mut self, block: Block) -> Result<(), StackError> {
        self.access_count += 1;
        if self.is_full() {
            return Err(StackError::Overflow {
                capacity: self.capacity(),
            });
        }
        let before = self.top;
        self.top += 1;
        self.slots[self.top as usize] = block;
        self.journal(StackOpType::Push, block, before);
        Ok(())
    }

    /// Remove and return the top block, leaving `EMPTY_BLOCK` behind.
    ///
    /// On an empty stack this returns `EMPTY_BLOCK` and changes nothing.
    pub fn pop(&mut self) -> Block {
        self.access_count += 1;
        let before = self.top;
        if self.is_empty() {
            self.journal(StackOpType::PopEmpty, EMPTY_BLOCK, before);
            return EMPTY_BLOCK;
        }
        let slot = self.top as usize;
        let block = std::mem::replace(&mut self.slots[slot], EMPTY_BLOCK);
        self.top -= 1;
        self.journal(StackOpType::Pop, block, before);
        block
    }

    /// Point-in-time view of every slot, read through `get_at`.
    pub fn snapshot(&mut self) -> Result<StackSnapshot, StackError> {
        let slots = (0..self.capacity() as isize)
            .map(|i| self.get_at(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StackSnapshot::new(slots, self.top))
    }

    fn journal(&mut self, op_type: StackOpType, block: Block, top_before: isize) {
        self.history.record(StackOperation {
            tid: self.actor,
            op_type,
            block,
            top_before,
            top_after: self.top,
            step: self.access_count,
        });
    }
}

/// Symbol that follows `block`.
///
/// The empty marker has no successor, nor does the last `char`.
pub fn successor(block: Block) -> Result<Block, StackError> {
    if block == EMPTY_BLOCK {
        return Err(StackError::NoSuccessor { block });
    }
    char::from_u32(block as u32 + 1).ok_or(StackError::NoSuccessor { block })
}

impl Default for BlockStack {
    fn default() -> Self {
        Self::new()
    }
}

impl StackProperties for BlockStack {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn top_index(&self) -> isize {
        self.top
    }

    fn slots(&self) -> Vec<Block> {
        self.slots.clone()
    }

    fn access_count(&self) -> u64 {
        self.access_count
    }

    fn history(&self) -> StackHistory {
        self.history.clone()
    }
}
