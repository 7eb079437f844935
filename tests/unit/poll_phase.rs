use oracle_node_core::domain::logpoller::{validate_transition, PollPhase};

#[test]
fn full_cycle_walks_through_every_phase() {
    let path = [PollPhase::Idle, PollPhase::Reconciling, PollPhase::Persisting, PollPhase::Idle];
    for pair in path.windows(2) {
        validate_transition(pair[0], pair[1]).expect("valid step");
    }
}

#[test]
fn persisting_is_only_reachable_through_reconciling() {
    let all = [PollPhase::Idle, PollPhase::Reconciling, PollPhase::Persisting];
    for from in all {
        let allowed = validate_transition(from, PollPhase::Persisting).is_ok();
        assert_eq!(allowed, from == PollPhase::Reconciling, "from {}", from);
    }
}
