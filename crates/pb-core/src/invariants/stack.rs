//! Bounded stack invariants.
//!
//! | Property | Description |
//! |----------|-------------|
//! | TopInBounds | `-1 <= top <= capacity - 1` |
//! | EmptyAboveTop | Every slot above `top` holds `EMPTY_BLOCK` |
//! | TopDelta | push moves `top` by +1, pop by -1, pop on empty by 0 |
//! | LIFO_Order | Replaying the journal from the initial contents reproduces every pop and the final contents |
//! | AccessAccounting | Access counter equals the accesses callers report |

use crate::config::EMPTY_BLOCK;
use crate::counterexample::{Counterexample, StateSnapshot, ThreadAction};
use crate::property::{PropertyChecker, PropertyResult};
use crate::types::{Block, Tid};

/// State a bounded stack exposes for property checking.
pub trait StackProperties {
    /// Fixed number of slots.
    fn capacity(&self) -> usize;

    /// Index of the top slot, `-1` when empty.
    fn top_index(&self) -> isize;

    /// Raw slot contents, bottom to top, including empty slots.
    fn slots(&self) -> Vec<Block>;

    /// Number of counted accesses so far.
    fn access_count(&self) -> u64;

    /// Mutation journal.
    fn history(&self) -> StackHistory;
}

/// Journal of stack mutations.
#[derive(Debug, Clone, Default)]
pub struct StackHistory {
    /// Occupied slots when the journal started (bottom to top)
    pub initial: Vec<Block>,
    /// Mutations in execution order
    pub operations: Vec<StackOperation>,
}

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOperation {
    /// Worker that performed the operation, when known
    pub tid: Option<Tid>,
    /// Type of operation
    pub op_type: StackOpType,
    /// Block pushed or popped
    pub block: Block,
    /// `top` before the call
    pub top_before: isize,
    /// `top` after the call
    pub top_after: isize,
    /// Access counter value after the call
    pub step: u64,
}

/// Type of stack mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOpType {
    Push,
    Pop,
    PopEmpty,
}

impl StackHistory {
    /// Start a journal from the given occupied contents.
    #[must_use]
    pub fn new(initial: Vec<Block>) -> Self {
        Self {
            initial,
            operations: Vec::new(),
        }
    }

    /// Record a mutation.
    pub fn record(&mut self, operation: StackOperation) {
        debug_assert!(
            self.operations.last().map_or(true, |last| operation.step > last.step),
            "Steps must increase"
        );
        self.operations.push(operation);
    }
}

/// Property checker for bounded stacks.
pub struct StackPropertyChecker<'a, T: StackProperties> {
    stack: &'a T,
    expected_accesses: Option<u64>,
}

impl<'a, T: StackProperties> StackPropertyChecker<'a, T> {
    /// Create a new checker for the given stack.
    #[must_use]
    pub fn new(stack: &'a T) -> Self {
        Self {
            stack,
            expected_accesses: None,
        }
    }

    /// Also check the access counter against an externally tallied total.
    #[must_use]
    pub fn with_expected_accesses(mut self, accesses: u64) -> Self {
        self.expected_accesses = Some(accesses);
        self
    }

    fn check_top_in_bounds(&self) -> PropertyResult {
        let top = self.stack.top_index();
        let capacity = self.stack.capacity() as isize;
        if top < -1 || top > capacity - 1 {
            return PropertyResult::fail(
                "TopInBounds",
                format!("top={} outside -1..={}", top, capacity - 1),
                None,
            );
        }
        PropertyResult::pass("TopInBounds")
    }

    fn check_empty_above_top(&self) -> PropertyResult {
        let top = self.stack.top_index();
        let slots = self.stack.slots();
        let first_free = (top + 1).max(0) as usize;
        for (index, block) in slots.iter().enumerate().skip(first_free) {
            if *block != EMPTY_BLOCK {
                return PropertyResult::fail(
                    "EmptyAboveTop",
                    format!("slot {} holds {:?} above top={}", index, block, top),
                    None,
                );
            }
        }
        PropertyResult::pass("EmptyAboveTop")
    }

    fn check_top_delta(&self) -> PropertyResult {
        for op in &self.stack.history().operations {
            let expected = match op.op_type {
                StackOpType::Push => op.top_before + 1,
                StackOpType::Pop => op.top_before - 1,
                StackOpType::PopEmpty => {
                    if op.top_before != -1 {
                        return PropertyResult::fail(
                            "TopDelta",
                            format!("empty pop recorded with top={} (step {})", op.top_before, op.step),
                            None,
                        );
                    }
                    op.top_before
                }
            };
            if op.top_after != expected {
                return PropertyResult::fail(
                    "TopDelta",
                    format!(
                        "{:?} moved top {} -> {}, expected {} (step {})",
                        op.op_type, op.top_before, op.top_after, expected, op.step
                    ),
                    Some(self.journal_counterexample()),
                );
            }
        }
        PropertyResult::pass("TopDelta")
    }

    /// Replays the journal against a model stack.
    fn check_lifo_order(&self) -> PropertyResult {
        let history = self.stack.history();
        let mut model: Vec<Block> = history.initial.clone();

        for op in &history.operations {
            match op.op_type {
                StackOpType::Push => model.push(op.block),
                StackOpType::Pop => match model.pop() {
                    Some(actual) if actual == op.block => {}
                    actual => {
                        return PropertyResult::fail(
                            "LIFO_Order",
                            format!(
                                "pop returned {:?} but model expected {:?} (step {})",
                                op.block, actual, op.step
                            ),
                            Some(self.journal_counterexample()),
                        );
                    }
                },
                StackOpType::PopEmpty => {
                    if !model.is_empty() {
                        return PropertyResult::fail(
                            "LIFO_Order",
                            format!(
                                "pop reported empty but model has {} blocks (step {})",
                                model.len(),
                                op.step
                            ),
                            None,
                        );
                    }
                }
            }
        }

        let occupied = (self.stack.top_index() + 1).max(0) as usize;
        let actual: Vec<Block> = self.stack.slots().into_iter().take(occupied).collect();
        if actual != model {
            return PropertyResult::fail(
                "LIFO_Order",
                format!("final contents {:?} differ from replayed {:?}", actual, model),
                None,
            );
        }
        PropertyResult::pass("LIFO_Order")
    }

    fn check_access_accounting(&self) -> PropertyResult {
        let Some(expected) = self.expected_accesses else {
            return PropertyResult::pass("AccessAccounting");
        };
        let actual = self.stack.access_count();
        if actual != expected {
            return PropertyResult::fail(
                "AccessAccounting",
                format!("access counter {} but callers performed {}", actual, expected),
                None,
            );
        }
        PropertyResult::pass("AccessAccounting")
    }

    fn journal_counterexample(&self) -> Counterexample {
        let mut ce = Counterexample::new();
        for op in self.stack.history().operations {
            ce.add_action(ThreadAction {
                tid: op.tid.unwrap_or(0),
                step: op.step,
                action: format!("{:?}({})", op.op_type, op.block),
            });
            ce.add_state(StateSnapshot {
                step: op.step,
                description: format!("top={}", op.top_after),
            });
        }
        ce
    }
}

impl<T: StackProperties> PropertyChecker for StackPropertyChecker<'_, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_top_in_bounds(),
            self.check_empty_above_top(),
            self.check_top_delta(),
            self.check_lifo_order(),
            self.check_access_accounting(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStack {
        slots: Vec<Block>,
        top: isize,
        accesses: u64,
        history: StackHistory,
    }

    impl TestStack {
        fn new() -> Self {
            Self {
                slots: vec!['a', 'b', EMPTY_BLOCK],
                top: 1,
                accesses: 0,
                history: StackHistory::new(vec!['a', 'b']),
            }
        }

        fn pop(&mut self) -> Block {
            self.accesses += 1;
            let before = self.top;
            if self.top < 0 {
                self.history.record(StackOperation {
                    tid: None,
                    op_type: StackOpType::PopEmpty,
                    block: EMPTY_BLOCK,
                    top_before: before,
                    top_after: before,
                    step: self.accesses,
                });
                return EMPTY_BLOCK;
            }
            let block = self.slots[self.top as usize];
            self.slots[self.top as usize] = EMPTY_BLOCK;
            self.top -= 1;
            self.history.record(StackOperation {
                tid: Some(1),
                op_type: StackOpType::Pop,
                block,
                top_before: before,
                top_after: self.top,
                step: self.accesses,
            });
            block
        }
    }

    impl StackProperties for TestStack {
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
            self.accesses
        }

        fn history(&self) -> StackHistory {
            self.history.clone()
        }
    }

    #[test]
    fn test_correct_stack_passes_all() {
        let mut stack = TestStack::new();
        assert_eq!(stack.pop(), 'b');
        assert_eq!(stack.pop(), 'a');
        assert_eq!(stack.pop(), EMPTY_BLOCK);

        let checker = StackPropertyChecker::new(&stack).with_expected_accesses(3);
        for result in checker.check_all() {
            assert!(result.passed, "{}", result);
        }
    }

    #[test]
    fn test_detects_top_out_of_bounds() {
        let mut stack = TestStack::new();
        stack.top = 3;
        let result = StackPropertyChecker::new(&stack).check_top_in_bounds();
        assert!(!result.passed);
    }

    #[test]
    fn test_detects_garbage_above_top() {
        let mut stack = TestStack::new();
        stack.slots[2] = 'z';
        let result = StackPropertyChecker::new(&stack).check_empty_above_top();
        assert!(!result.passed);
        assert!(result.message.unwrap().contains("slot 2"));
    }

    #[test]
    fn test_detects_lifo_violation() {
        let mut stack = TestStack::new();
        stack.pop();
        stack.history.operations[0].block = 'a';
        let result = StackPropertyChecker::new(&stack).check_lifo_order();
        assert!(!result.passed);
        assert!(result.counterexample.is_some());
    }

    #[test]
    fn test_detects_access_mismatch() {
        let mut stack = TestStack::new();
        stack.pop();
        let checker = StackPropertyChecker::new(&stack).with_expected_accesses(2);
        let violation = checker.first_violation().unwrap();
        assert_eq!(violation.property, "AccessAccounting");
    }
}
