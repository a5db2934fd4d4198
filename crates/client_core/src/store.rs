use serde::Serialize;
use shared::domain::{Candidate, Identity, LedgerSnapshot, Session};
use tracing::warn;

use crate::evaluate::{is_admin, resolve_winner, Winner};

/// Latest observed session and ledger state for a single wallet session.
///
/// Readers get `&self` accessors; writes go through the crate-private
/// mutators so only the refresh path and the dispatcher can change it.
#[derive(Debug, Default)]
pub struct StateStore {
    session: Session,
    snapshot: LedgerSnapshot,
    action_pending: bool,
}

/// Copy of the store handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreView {
    pub session: Session,
    pub snapshot: LedgerSnapshot,
    pub action_pending: bool,
    pub is_admin: bool,
    pub winner: Option<Winner>,
}

/// Ledger fields that were read successfully.
#[derive(Debug, Default)]
pub(crate) struct SnapshotUpdate {
    pub candidates: Option<Vec<Candidate>>,
    pub owner: Option<Identity>,
    pub voting_open: Option<bool>,
}

impl StateStore {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> &LedgerSnapshot {
        &self.snapshot
    }

    pub fn action_pending(&self) -> bool {
        self.action_pending
    }

    pub fn is_admin(&self) -> bool {
        is_admin(&self.session, self.snapshot.owner.as_ref())
    }

    pub fn winner(&self) -> Option<Winner> {
        resolve_winner(&self.snapshot)
    }

    pub fn view(&self) -> StoreView {
        StoreView {
            session: self.session.clone(),
            snapshot: self.snapshot.clone(),
            action_pending: self.action_pending,
            is_admin: self.is_admin(),
            winner: self.winner(),
        }
    }

    pub(crate) fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    pub(crate) fn set_pending(&mut self, pending: bool) {
        self.action_pending = pending;
    }

    pub(crate) fn apply_candidates(&mut self, candidates: Vec<Candidate>) {
        let previous = self.snapshot.candidates.len();
        if previous != 0 && candidates.len() != previous {
            warn!(
                previous,
                observed = candidates.len(),
                "store: candidate count changed between refreshes"
            );
        }
        self.snapshot.candidates = candidates;
    }

    pub(crate) fn apply_owner(&mut self, owner: Identity) {
        if let Some(previous) = &self.snapshot.owner {
            if *previous != owner {
                warn!(
                    previous = %previous,
                    observed = %owner,
                    "store: ledger owner changed between refreshes"
                );
            }
        }
        self.snapshot.owner = Some(owner);
    }

    /// Closed is terminal: a later `true` is stale data and is dropped.
    pub(crate) fn apply_voting_open(&mut self, voting_open: bool) {
        if self.snapshot.voting_open == Some(false) && voting_open {
            warn!("store: ignoring voting_open=true after voting was observed closed");
            return;
        }
        self.snapshot.voting_open = Some(voting_open);
    }

    /// Applies the fields `update` carries and leaves the others stale.
    pub(crate) fn apply_snapshot(&mut self, update: SnapshotUpdate) {
        if let Some(candidates) = update.candidates {
            self.apply_candidates(candidates);
        }
        if let Some(owner) = update.owner {
            self.apply_owner(owner);
        }
        if let Some(voting_open) = update.voting_open {
            self.apply_voting_open(voting_open);
        }
    }

    /// Back to the state of a fresh session.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
