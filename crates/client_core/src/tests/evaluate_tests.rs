use super::*;

fn closed(candidates: Vec<Candidate>) -> LedgerSnapshot {
    LedgerSnapshot {
        candidates,
        owner: None,
        voting_open: Some(false),
    }
}

#[test]
fn winner_is_leftmost_maximum() {
    let snapshot = closed(vec![
        Candidate::new("A", 3),
        Candidate::new("B", 5),
        Candidate::new("C", 5),
    ]);

    let winner = resolve_winner(&snapshot).expect("winner");
    assert_eq!(winner.id, CandidateId(1));
    assert_eq!(winner.candidate.name, "B");
}

#[test]
fn all_zero_votes_pick_first_candidate() {
    let snapshot = closed(vec![Candidate::new("A", 0), Candidate::new("B", 0)]);
    assert_eq!(resolve_winner(&snapshot).expect("winner").id, CandidateId(0));
}

#[test]
fn later_strictly_greater_candidate_wins() {
    let candidates = vec![
        Candidate::new("A", 1),
        Candidate::new("B", 0),
        Candidate::new("C", 7),
        Candidate::new("D", 7),
    ];
    let (index, candidate) = leftmost_max(&candidates).expect("max");
    assert_eq!(index, 2);
    assert_eq!(candidate.name, "C");
}

#[test]
fn empty_sequence_has_no_winner_in_any_phase() {
    assert!(leftmost_max(&[]).is_none());
    assert!(resolve_winner(&closed(Vec::new())).is_none());

    let open = LedgerSnapshot {
        voting_open: Some(true),
        ..LedgerSnapshot::default()
    };
    assert!(resolve_winner(&open).is_none());
}

#[test]
fn no_winner_while_open_or_unknown() {
    let mut snapshot = closed(vec![Candidate::new("A", 9)]);
    snapshot.voting_open = Some(true);
    assert!(resolve_winner(&snapshot).is_none());
    snapshot.voting_open = None;
    assert!(resolve_winner(&snapshot).is_none());
}

#[test]
fn admin_when_identity_matches_owner_ignoring_case() {
    let owner = Identity::new("0xAbC0000000000000000000000000000000000001");
    let session = Session::connected(Identity::new("0xabc0000000000000000000000000000000000001"));
    assert!(is_admin(&session, Some(&owner)));
}

#[test]
fn not_admin_when_disconnected_with_owner_identity() {
    let owner = Identity::new("0xabc");
    let session = Session {
        connected: false,
        identity: Some(owner.clone()),
    };
    assert!(!is_admin(&session, Some(&owner)));
}

#[test]
fn not_admin_for_other_identity_or_unknown_owner() {
    let session = Session::connected(Identity::new("0xdef"));
    assert!(!is_admin(&session, Some(&Identity::new("0xabc"))));
    assert!(!is_admin(&session, None));
    assert!(!is_admin(&Session::disconnected(), None));
}
