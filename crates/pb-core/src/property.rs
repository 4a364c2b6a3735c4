//! Property results.
//!
//! A checker evaluates named invariants against recorded state and
//! returns one `PropertyResult` per invariant.

use std::fmt;

use crate::counterexample::Counterexample;

/// Outcome of checking one named invariant.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Invariant name (e.g. "TurnOrder")
    pub property: &'static str,
    /// Whether the invariant held
    pub passed: bool,
    /// Violation details
    pub message: Option<String>,
    /// Failing interleaving, when one could be reconstructed
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    /// The invariant held.
    #[must_use]
    pub fn pass(property: &'static str) -> Self {
        Self {
            property,
            passed: true,
            message: None,
            counterexample: None,
        }
    }

    /// The invariant was violated.
    #[must_use]
    pub fn fail(
        property: &'static str,
        message: impl Into<String>,
        counterexample: Option<Counterexample>,
    ) -> Self {
        Self {
            property,
            passed: false,
            message: Some(message.into()),
            counterexample,
        }
    }
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "PASS" } else { "FAIL" };
        write!(f, "[{}] {}", status, self.property)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(ref ce) = self.counterexample {
            write!(f, "\n{}", ce.render_diagram())?;
        }
        Ok(())
    }
}

/// Something that can check a family of invariants.
pub trait PropertyChecker {
    /// Evaluate every invariant.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// First violated invariant, if any.
    fn first_violation(&self) -> Option<PropertyResult> {
        self.check_all().into_iter().find(|r| !r.passed)
    }

    /// Whether every invariant held.
    fn all_passed(&self) -> bool {
        self.check_all().iter().all(|r| r.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<PropertyResult>);

    impl PropertyChecker for Fixed {
        fn check_all(&self) -> Vec<PropertyResult> {
            self.0.clone()
        }
    }

    #[test]
    fn test_first_violation() {
        let checker = Fixed(vec![
            PropertyResult::pass("A"),
            PropertyResult::fail("B", "broken", None),
            PropertyResult::fail("C", "also broken", None),
        ]);
        assert!(!checker.all_passed());
        let first = checker.first_violation().unwrap();
        assert_eq!(first.property, "B");
        assert_eq!(first.to_string(), "[FAIL] B: broken");
    }
}
