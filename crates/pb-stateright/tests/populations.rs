//! Model checking across the populations the manager is run with in tests.

use pb_core::{Role, TurnOrder};
use pb_stateright::{check_model, ProtocolModel, Variant};

#[test]
fn test_small_populations_hold() {
    let populations: [&[Role]; 4] = [
        &[Role::Acquirer],
        &[Role::Releaser, Role::Releaser],
        &[Role::Acquirer, Role::Releaser, Role::Observer],
        &[Role::Acquirer, Role::Acquirer, Role::Releaser, Role::Observer],
    ];
    for roles in populations {
        for order in [TurnOrder::Ascending, TurnOrder::Descending] {
            let result = check_model(ProtocolModel::new(roles.to_vec(), order), 2);
            assert!(result.passed, "{:?} {:?}: {}", roles, order, result.format());
        }
    }
}

#[test]
fn test_broken_variants_are_caught() {
    let roles = vec![Role::Acquirer, Role::Releaser, Role::Observer];

    let ungated = check_model(
        ProtocolModel::new(roles.clone(), TurnOrder::Ascending).with_variant(Variant::UngatedAcquirers),
        2,
    );
    assert!(ungated.violations.contains(&"BarrierOrdering"));

    let unordered = check_model(
        ProtocolModel::new(roles, TurnOrder::Descending).with_variant(Variant::UnorderedTurns),
        2,
    );
    assert!(unordered.violations.contains(&"TurnOrder"));
}
