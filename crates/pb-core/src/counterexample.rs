//! Counterexample representation and rendering.
//!
//! When a protocol invariant is violated, a counterexample lays out the
//! recorded worker transitions step by step, one column per worker.

/// A counterexample showing the failure path.
#[derive(Debug, Clone, Default)]
pub struct Counterexample {
    /// Notable states along the path
    pub states: Vec<StateSnapshot>,
    /// Worker actions in global step order
    pub interleaving: Vec<ThreadAction>,
    /// DST seed for reproduction (if applicable)
    pub dst_seed: Option<u64>,
    /// Human-readable description of the failure
    pub description: Option<String>,
}

/// Snapshot of shared state at one step.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Step number in the execution
    pub step: u64,
    /// Description of the state
    pub description: String,
}

/// Action taken by one worker.
#[derive(Debug, Clone)]
pub struct ThreadAction {
    /// Worker TID
    pub tid: u64,
    /// Global step when this action occurred
    pub step: u64,
    /// Description of the action
    pub action: String,
}

/// Width of a worker column in the rendered diagram.
const COLUMN_WIDTH: usize = 18;

impl Counterexample {
    /// Create a new empty counterexample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counterexample with DST seed for reproduction.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            dst_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Set the description for this counterexample.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a state snapshot. Steps must be increasing.
    pub fn add_state(&mut self, state: StateSnapshot) {
        debug_assert!(
            self.states.last().map_or(true, |last| state.step > last.step),
            "States must be added in order"
        );
        self.states.push(state);
    }

    /// Add a worker action.
    pub fn add_action(&mut self, action: ThreadAction) {
        self.interleaving.push(action);
    }

    /// Render as a step-by-worker diagram.
    ///
    /// ```text
    /// Step | T1               | T2               | State
    /// -----|------------------|------------------|------
    ///    1 | PHASE1           |                  |
    ///    2 |                  | PHASE1           |
    ///    3 |                  | PHASE2           | turn=1
    /// ```
    #[must_use]
    pub fn render_diagram(&self) -> String {
        let mut output = String::new();

        if let Some(seed) = self.dst_seed {
            output.push_str(&format!("DST_SEED={}\n\n", seed));
        }

        if let Some(ref desc) = self.description {
            output.push_str("Failure: ");
            output.push_str(desc);
            output.push_str("\n\n");
        }

        let mut tids: Vec<u64> = self.interleaving.iter().map(|a| a.tid).collect();
        tids.sort_unstable();
        tids.dedup();

        if tids.is_empty() {
            output.push_str("(no worker actions recorded)\n");
            return output;
        }

        output.push_str("Step |");
        for tid in &tids {
            output.push_str(&format!(" {:<w$} |", format!("T{}", tid), w = COLUMN_WIDTH));
        }
        output.push_str(" State\n-----|");
        for _ in &tids {
            output.push_str(&"-".repeat(COLUMN_WIDTH + 2));
            output.push('|');
        }
        output.push_str("------\n");

        let mut steps: Vec<u64> = self.interleaving.iter().map(|a| a.step).collect();
        steps.sort_unstable();
        steps.dedup();

        for step in steps {
            output.push_str(&format!("{:4} |", step));
            for tid in &tids {
                let cell = self
                    .interleaving
                    .iter()
                    .find(|a| a.step == step && a.tid == *tid)
                    .map_or("", |a| a.action.as_str());
                output.push_str(&format!(" {:<w$} |", cell, w = COLUMN_WIDTH));
            }
            if let Some(state) = self.states.iter().find(|s| s.step == step) {
                output.push(' ');
                output.push_str(&state.description);
            }
            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterexample_with_seed() {
        let ce = Counterexample::with_seed(12345);
        assert_eq!(ce.dst_seed, Some(12345));
        assert!(ce.interleaving.is_empty());
    }

    #[test]
    fn test_render_diagram() {
        let mut ce = Counterexample::with_seed(42).with_description("TurnOrder violated");
        ce.add_action(ThreadAction {
            tid: 2,
            step: 1,
            action: "PHASE2".to_string(),
        });
        ce.add_action(ThreadAction {
            tid: 1,
            step: 2,
            action: "PHASE2".to_string(),
        });
        ce.add_state(StateSnapshot {
            step: 2,
            description: "turn=3".to_string(),
        });

        let diagram = ce.render_diagram();
        assert!(diagram.contains("DST_SEED=42"));
        assert!(diagram.contains("Failure: TurnOrder violated"));
        assert!(diagram.contains("T1"));
        assert!(diagram.contains("turn=3"));
        assert!(diagram.lines().any(|l| l.starts_with("   1 |")));
    }

    #[test]
    fn test_render_empty() {
        assert!(Counterexample::new()
            .render_diagram()
            .contains("no worker actions"));
    }
}
