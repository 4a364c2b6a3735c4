//! Rendered view of the stack.

use std::fmt;

use pb_core::Block;
use serde::Serialize;

/// Slots and top index captured at one instant.
///
/// Renders as `[a][b](c)[$]`, with the top slot in parentheses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackSnapshot {
    pub slots: Vec<Block>,
    pub top: isize,
}

impl StackSnapshot {
    #[must_use]
    pub fn new(slots: Vec<Block>, top: isize) -> Self {
        Self { slots, top }
    }
}

impl fmt::Display for StackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, block) in self.slots.iter().enumerate() {
            if index as isize == self.top {
                write!(f, "({})", block)?;
            } else {
                write!(f, "[{}]", block)?;
            }
        }
        Ok(())
    }
}
