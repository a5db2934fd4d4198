//! Pure derivations over store contents.

use serde::Serialize;
use shared::domain::{Candidate, CandidateId, Identity, LedgerSnapshot, Session};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Winner {
    pub id: CandidateId,
    pub candidate: Candidate,
}

/// Admin iff the session is connected and its identity is the ledger owner.
pub fn is_admin(session: &Session, owner: Option<&Identity>) -> bool {
    match (session.active_identity(), owner) {
        (Some(identity), Some(owner)) => identity.normalized() == owner.normalized(),
        _ => false,
    }
}

/// Leftmost candidate with the highest vote count.
pub fn leftmost_max(candidates: &[Candidate]) -> Option<(usize, &Candidate)> {
    let mut iter = candidates.iter().enumerate();
    let mut best = iter.next()?;
    for (index, candidate) in iter {
        if candidate.vote_count > best.1.vote_count {
            best = (index, candidate);
        }
    }
    Some(best)
}

/// Outcome of a closed round. `None` while voting is open, before the phase
/// is known, or when there are no candidates.
pub fn resolve_winner(snapshot: &LedgerSnapshot) -> Option<Winner> {
    if snapshot.voting_open != Some(false) {
        return None;
    }
    leftmost_max(&snapshot.candidates).map(|(index, candidate)| Winner {
        id: CandidateId(index as u64),
        candidate: candidate.clone(),
    })
}

#[cfg(test)]
#[path = "tests/evaluate_tests.rs"]
mod tests;
