//! End-to-end runs of the full worker population.

use std::time::Duration;

use pb_core::invariants::{ProtocolChecker, StackPropertyChecker};
use pb_core::{PropertyChecker, Role, TurnOrder};
use pb_manager::{BlockManager, ManagerConfig, Phase1Jitter, RunReport};

fn run(config: ManagerConfig) -> RunReport {
    BlockManager::new(config).unwrap().run().unwrap()
}

fn assert_invariants(report: &RunReport) {
    let stack = StackPropertyChecker::new(&report.stack).with_expected_accesses(report.accesses_performed);
    for result in stack.check_all() {
        assert!(result.passed, "{}", result);
    }
    let protocol = ProtocolChecker::new(&report.history, report.turn_order, report.workers_count())
        .with_max_occupancy(report.stack_max_occupancy);
    for result in protocol.check_all() {
        assert!(result.passed, "{}", result);
    }
}

#[test]
fn test_default_population_terminates() {
    let report = run(ManagerConfig::default());
    assert_eq!(report.workers_count(), 10);
    assert_eq!(report.phase2_order, (1..=10).collect::<Vec<_>>());
    assert!(report.accounting_holds());
    assert_eq!(report.stack_max_occupancy, 1);
    assert!((-1..=5).contains(&report.top));
    assert_invariants(&report);
}

#[test]
fn test_tids_follow_creation_order() {
    let report = run(ManagerConfig::default());
    let roles: Vec<Role> = report.workers.iter().map(|w| w.role).collect();
    assert_eq!(&roles[..3], &[Role::Acquirer; 3]);
    assert_eq!(&roles[3..6], &[Role::Releaser; 3]);
    assert_eq!(&roles[6..], &[Role::Observer; 4]);
    for (index, worker) in report.workers.iter().enumerate() {
        assert_eq!(worker.tid, index as u64 + 1);
    }
}

#[test]
fn test_descending_turns() {
    let report = run(ManagerConfig {
        turn_order: TurnOrder::Descending,
        ..ManagerConfig::default()
    });
    assert_eq!(report.phase2_order, (1..=10).rev().collect::<Vec<_>>());
    assert_invariants(&report);
}

#[test]
fn test_pop_then_successor_push_restores_top() {
    // Whichever of the two runs first, the stack ends where it started.
    let report = run(ManagerConfig {
        acquirers_count: 1,
        releasers_count: 1,
        observers_count: 0,
        ..ManagerConfig::default()
    });
    assert_eq!(report.top, 3);
    assert_eq!(report.top_block, 'd');
    assert_eq!(report.below_top, Some('c'));
    assert_eq!(report.rendered, "[a][b][c](d)[$][$]");
    assert_invariants(&report);
}

#[test]
fn test_observer_never_sees_torn_state() {
    let config = ManagerConfig {
        acquirers_count: 1,
        releasers_count: 1,
        observers_count: 1,
        prober_steps: 3,
        ..ManagerConfig::default()
    };
    let allowed = [
        "[a][b][c](d)[$][$]", // initial, or after pop + push
        "[a][b](c)[$][$][$]", // after the pop only
        "[a][b][c][d](e)[$]", // after the push only
    ];
    let manager = BlockManager::new(config).unwrap();
    for _ in 0..20 {
        let report = manager.run().unwrap();
        let observer = report.workers.iter().find(|w| w.role == Role::Observer).unwrap();
        assert_eq!(observer.snapshots.len(), 3);
        for snapshot in &observer.snapshots {
            let rendered = snapshot.to_string();
            assert!(allowed.contains(&rendered.as_str()), "torn snapshot {}", rendered);
        }
        assert_invariants(&report);
    }
}

#[test]
fn test_without_acquirers() {
    let report = run(ManagerConfig {
        acquirers_count: 0,
        releasers_count: 2,
        observers_count: 1,
        ..ManagerConfig::default()
    });
    // Two successor pushes fill the default stack: d -> e -> f.
    assert_eq!(report.top, 5);
    assert_eq!(report.top_block, 'f');
    assert_invariants(&report);
}

#[test]
fn test_only_acquirers_drain_the_stack() {
    let report = run(ManagerConfig {
        acquirers_count: 5,
        releasers_count: 0,
        observers_count: 0,
        ..ManagerConfig::default()
    });
    assert_eq!(report.top, -1);
    assert_eq!(report.top_block, '$');
    assert_eq!(report.below_top, None);
    let popped = report.workers.iter().filter(|w| w.block.is_some()).count();
    assert_eq!(popped, 4);
    assert_invariants(&report);
}

#[test]
fn test_jittered_runs_keep_ordering() {
    for seed in [1u64, 42, 9_001] {
        let report = run(ManagerConfig {
            phase1_jitter: Some(Phase1Jitter {
                seed,
                max_delay: Duration::from_micros(300),
            }),
            ..ManagerConfig::default()
        });
        assert_eq!(report.phase2_order, (1..=10).collect::<Vec<_>>());
        assert_invariants(&report);
    }
}

#[test]
fn test_larger_stack() {
    let report = run(ManagerConfig {
        stack_capacity: 10,
        ..ManagerConfig::default()
    });
    assert_eq!(report.capacity, 10);
    assert_invariants(&report);
}

#[test]
fn test_report_serializes() {
    let report = run(ManagerConfig::default());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["capacity"], 6);
    assert_eq!(json["turn_order"], "ascending");
    assert_eq!(json["workers"][0]["role"], "acquirer");
    assert!(json.get("stack").is_none());

    let text = report.to_string();
    assert!(text.contains("Stack access count:"));
    assert!(text.contains(&report.rendered));
}
