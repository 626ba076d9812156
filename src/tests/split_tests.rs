use crate::core::errors::ChiaTienError;
use crate::core::models::expense::ParticipantShare;
use crate::core::split::{SplitAllocator, SplitMode, equal_share};
use crate::tests::roster;

fn amounts(allocator: &SplitAllocator) -> Vec<u64> {
    allocator.participants().iter().map(|p| p.owed_amount).collect()
}

fn abc() -> SplitAllocator {
    let _ = env_logger::try_init();
    SplitAllocator::new(roster(&["Alice", "Bob", "Carol"]))
}

#[test]
fn test_new_session_selects_everyone_in_equal_mode() {
    let allocator = abc();
    assert_eq!(allocator.mode(), SplitMode::Equal);
    assert_eq!(allocator.total(), 0);
    assert_eq!(allocator.selected_count(), 3);
    assert_eq!(amounts(&allocator), vec![0, 0, 0]);
    assert_eq!(allocator.payer_id(), None);
}

#[test]
fn test_equal_split_keeps_rounding_slack() {
    let mut allocator = abc();
    allocator.set_total(100);
    assert_eq!(amounts(&allocator), vec![33, 33, 33]);
    assert_eq!(allocator.allocated_total(), 99);
    assert_eq!(allocator.rounding_slack(), 1);
}

#[test]
fn test_equal_split_rounds_half_up() {
    let mut allocator = abc();
    allocator.set_total(200);
    // 66.67 -> 67, shares overshoot the total
    assert_eq!(amounts(&allocator), vec![67, 67, 67]);
    assert_eq!(allocator.rounding_slack(), -1);

    allocator.toggle_participant("carol").unwrap();
    allocator.set_total(5);
    // 2.5 -> 3
    assert_eq!(amounts(&allocator), vec![3, 3, 0]);
}

#[test]
fn test_equal_share_edges() {
    assert_eq!(equal_share(100, 0), 0);
    assert_eq!(equal_share(0, 4), 0);
    assert_eq!(equal_share(7, 1), 7);
    assert_eq!(equal_share(1, 2), 1);
    assert_eq!(equal_share(1, 3), 0);
    assert_eq!(equal_share(u64::MAX, 1), u64::MAX);
    assert_eq!(equal_share(u64::MAX, 2), u64::MAX / 2 + 1);
}

#[test]
fn test_deselecting_recomputes_over_remaining() {
    let mut allocator = abc();
    allocator.set_total(100);
    let selected = allocator.toggle_participant("carol").unwrap();
    assert!(!selected);
    assert_eq!(amounts(&allocator), vec![50, 50, 0]);
    assert_eq!(allocator.rounding_slack(), 0);
}

#[test]
fn test_deselecting_everyone_zeroes_amounts() {
    let mut allocator = abc();
    allocator.set_total(90);
    for id in ["alice", "bob", "carol"] {
        allocator.toggle_participant(id).unwrap();
    }
    assert_eq!(allocator.selected_count(), 0);
    assert_eq!(amounts(&allocator), vec![0, 0, 0]);

    allocator.toggle_participant("bob").unwrap();
    assert_eq!(amounts(&allocator), vec![0, 90, 0]);
}

#[test]
fn test_toggle_unknown_participant_leaves_state_unchanged() {
    let mut allocator = abc();
    allocator.set_total(100);
    let before = allocator.participants().to_vec();

    let result = allocator.toggle_participant("ghost-id");
    assert_eq!(result, Err(ChiaTienError::InvalidParticipant("ghost-id".to_string())));
    assert_eq!(allocator.participants(), before.as_slice());
    assert_eq!(allocator.total(), 100);
}

#[test]
fn test_switching_to_manual_keeps_amounts() {
    let mut allocator = abc();
    allocator.set_total(90);
    allocator.set_mode(SplitMode::Manual);
    assert_eq!(amounts(&allocator), vec![30, 30, 30]);

    // total changes no longer recompute
    allocator.set_total(300);
    assert_eq!(amounts(&allocator), vec![30, 30, 30]);
}

#[test]
fn test_switching_back_to_equal_discards_manual_edits() {
    let mut allocator = abc();
    allocator.set_total(90);
    allocator.set_mode(SplitMode::Manual);
    allocator.set_participant_amount("alice", 80).unwrap();
    allocator.set_participant_amount("bob", 5).unwrap();

    allocator.set_mode(SplitMode::Equal);
    assert_eq!(amounts(&allocator), vec![30, 30, 30]);
}

#[test]
fn test_manual_edit_touches_only_that_participant() {
    let mut allocator = abc();
    allocator.set_total(90);
    allocator.set_mode(SplitMode::Manual);

    allocator.set_participant_amount("bob", 55).unwrap();
    assert_eq!(amounts(&allocator), vec![30, 55, 30]);
    assert_eq!(allocator.total(), 90);
    assert_eq!(allocator.rounding_slack(), -25);
}

#[test]
fn test_manual_amount_rejected_in_equal_mode() {
    let mut allocator = abc();
    allocator.set_total(90);
    let result = allocator.set_participant_amount("alice", 10);
    assert_eq!(result, Err(ChiaTienError::AmountsAreDerived));
    assert_eq!(amounts(&allocator), vec![30, 30, 30]);
}

#[test]
fn test_manual_amount_for_unknown_participant() {
    let mut allocator = abc();
    allocator.set_mode(SplitMode::Manual);
    let result = allocator.set_participant_amount("ghost-id", 10);
    assert!(matches!(result, Err(ChiaTienError::InvalidParticipant(id)) if id == "ghost-id"));
}

#[test]
fn test_manual_toggle_resets_deselected_and_keeps_reselected() {
    let mut allocator = abc();
    allocator.set_total(90);
    allocator.set_mode(SplitMode::Manual);
    allocator.set_participant_amount("carol", 40).unwrap();

    allocator.toggle_participant("carol").unwrap();
    assert_eq!(amounts(&allocator), vec![30, 30, 0]);

    // no recompute for the others in manual mode
    allocator.toggle_participant("carol").unwrap();
    assert_eq!(amounts(&allocator), vec![30, 30, 0]);
    allocator.set_participant_amount("carol", 12).unwrap();
    assert_eq!(amounts(&allocator), vec![30, 30, 12]);
}

#[test]
fn test_set_payer() {
    let mut allocator = abc();
    assert!(matches!(
        allocator.set_payer("ghost-id"),
        Err(ChiaTienError::InvalidParticipant(_))
    ));
    assert_eq!(allocator.payer_id(), None);

    allocator.toggle_participant("carol").unwrap();
    // payer does not have to share the expense
    allocator.set_payer("carol").unwrap();
    assert_eq!(allocator.payer_id(), Some("carol"));
}

#[test]
fn test_finalize_manual_mismatch_is_not_an_error() {
    let mut allocator = abc();
    allocator.set_total(100);
    allocator.set_payer("alice").unwrap();
    allocator.toggle_participant("carol").unwrap();
    allocator.set_mode(SplitMode::Manual);
    allocator.set_participant_amount("alice", 70).unwrap();
    allocator.set_participant_amount("bob", 20).unwrap();

    let allocation = allocator.finalize().unwrap();
    assert_eq!(allocation.amount, 100);
    assert_eq!(allocation.payer_id, "alice");
    assert_eq!(
        allocation.participants,
        vec![
            ParticipantShare {
                user_id: "alice".to_string(),
                amount: 70
            },
            ParticipantShare {
                user_id: "bob".to_string(),
                amount: 20
            },
        ]
    );
}

#[test]
fn test_finalize_lists_exactly_the_selected_participants() {
    let mut allocator = SplitAllocator::new(roster(&["Alice", "Bob", "Carol", "Dan"]));
    allocator.set_total(1_000_000);
    allocator.set_payer("dan").unwrap();
    allocator.toggle_participant("bob").unwrap();

    let allocation = allocator.finalize().unwrap();
    let ids: Vec<&str> = allocation.participants.iter().map(|p| p.user_id.as_str()).collect();
    assert_eq!(ids, vec!["alice", "carol", "dan"]);
    assert!(allocation.participants.iter().all(|p| p.amount == 333_333));
    assert_eq!(allocation.amount, 1_000_000);
}

#[test]
fn test_finalize_without_participants() {
    let mut allocator = abc();
    allocator.set_total(100);
    allocator.set_payer("alice").unwrap();
    for id in ["alice", "bob", "carol"] {
        allocator.toggle_participant(id).unwrap();
    }
    assert_eq!(allocator.finalize(), Err(ChiaTienError::NoParticipantsSelected));
}

#[test]
fn test_finalize_without_payer() {
    let mut allocator = abc();
    allocator.set_total(100);
    assert_eq!(allocator.finalize(), Err(ChiaTienError::NoPayer));
}

#[test]
fn test_finalize_checks_participants_before_payer() {
    let mut allocator = SplitAllocator::new(Vec::new());
    assert_eq!(allocator.finalize(), Err(ChiaTienError::NoParticipantsSelected));
    allocator.set_total(10);
    assert_eq!(allocator.finalize(), Err(ChiaTienError::NoParticipantsSelected));
}

#[test]
fn test_reset_roster_restarts_equal_split() {
    let mut allocator = abc();
    allocator.set_total(120);
    allocator.set_payer("carol").unwrap();
    allocator.set_mode(SplitMode::Manual);
    allocator.set_participant_amount("alice", 1).unwrap();
    allocator.toggle_participant("bob").unwrap();

    allocator.reset_roster(roster(&["Alice", "Dan", "Erin", "Finn"]));
    assert_eq!(allocator.mode(), SplitMode::Equal);
    assert_eq!(allocator.selected_count(), 4);
    assert_eq!(amounts(&allocator), vec![30, 30, 30, 30]);
    assert_eq!(allocator.payer_id(), None);
}

#[test]
fn test_reset_roster_keeps_payer_still_present() {
    let mut allocator = abc();
    allocator.set_payer("alice").unwrap();
    allocator.reset_roster(roster(&["Alice", "Dan"]));
    assert_eq!(allocator.payer_id(), Some("alice"));
}
