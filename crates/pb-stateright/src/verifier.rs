//! Runs the BFS checker over a `ProtocolModel` and summarizes the outcome.

use pb_core::{Counterexample, ThreadAction};
use stateright::{Checker, Expectation, Model, Path};

use crate::protocol::{ProtocolAction, ProtocolModel, ProtocolState};

/// Result of checking one model.
#[derive(Debug, Clone)]
pub struct ModelCheckResult {
    /// Whether every property held
    pub passed: bool,
    /// Distinct states explored
    pub state_count: usize,
    /// Names of violated properties
    pub violations: Vec<&'static str>,
    /// Path to the first violation, when one exists
    pub counterexample: Option<Counterexample>,
}

impl ModelCheckResult {
    /// Format for display.
    pub fn format(&self) -> String {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let mut result = format!("[{}] states={}", status, self.state_count);
        if !self.violations.is_empty() {
            result.push_str(&format!(" violated={}", self.violations.join(",")));
        }
        if let Some(ref ce) = self.counterexample {
            result.push('\n');
            result.push_str(&ce.render_diagram());
        }
        result
    }
}

/// Exhaustively check `model` with `threads` checker threads.
///
/// `always`/`eventually` properties fail on any discovery; `sometimes`
/// properties fail when no example is found.
pub fn check_model(model: ProtocolModel, threads: usize) -> ModelCheckResult {
    debug_assert!(threads > 0, "Checker needs at least one thread");
    let properties = model.properties();
    let checker = model.checker().threads(threads).spawn_bfs().join();

    let mut violations = Vec::new();
    let mut counterexample = None;
    for property in properties {
        let discovery = checker.discovery(property.name);
        let violated = match property.expectation {
            Expectation::Sometimes => discovery.is_none(),
            Expectation::Always | Expectation::Eventually => discovery.is_some(),
        };
        if !violated {
            continue;
        }
        violations.push(property.name);
        if counterexample.is_none() {
            counterexample = discovery.map(|path| path_counterexample(property.name, path));
        }
    }

    ModelCheckResult {
        passed: violations.is_empty(),
        state_count: checker.unique_state_count(),
        violations,
        counterexample,
    }
}

fn path_counterexample(
    property: &'static str,
    path: Path<ProtocolState, ProtocolAction>,
) -> Counterexample {
    let mut ce = Counterexample::new().with_description(format!("{} violated", property));
    for (step, action) in path.into_actions().into_iter().enumerate() {
        ce.add_action(ThreadAction {
            tid: action.worker() as u64 + 1,
            step: step as u64 + 1,
            action: action.label().to_string(),
        });
    }
    ce
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Variant;
    use pb_core::{Role, TurnOrder};

    #[test]
    fn test_correct_model_passes() {
        let model = ProtocolModel::new(vec![Role::Acquirer, Role::Observer], TurnOrder::Ascending);
        let result = check_model(model, 1);
        assert!(result.passed, "{}", result.format());
        assert!(result.state_count > 1);
        assert!(result.counterexample.is_none());
    }

    #[test]
    fn test_violation_has_counterexample() {
        let model = ProtocolModel::new(vec![Role::Acquirer, Role::Releaser], TurnOrder::Ascending)
            .with_variant(Variant::UngatedAcquirers);
        let result = check_model(model, 1);
        assert!(!result.passed);
        assert_eq!(result.violations, vec!["BarrierOrdering"]);

        let diagram = result.format();
        assert!(diagram.contains("BarrierOrdering violated"));
        assert!(diagram.contains("lock(stack)"));
    }
}
