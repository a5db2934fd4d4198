use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join3;
use serde_json::Value;
use shared::{
    domain::{CandidateId, Identity, Session, TxAck},
    error::{ActionKind, CoreError, Precondition, SnapshotField},
    protocol::{decode_bool, decode_candidates, decode_identity},
};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub mod evaluate;
pub mod store;

pub use evaluate::{is_admin, leftmost_max, resolve_winner, Winner};
pub use store::{StateStore, StoreView};
use store::SnapshotUpdate;

/// Read/write boundary to the remote voting ledger.
///
/// Reads return untyped payloads; the core decodes and validates them.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_all_candidates(&self) -> Result<Value>;
    async fn owner(&self) -> Result<Value>;
    async fn voting_open(&self) -> Result<Value>;
    async fn vote(&self, from: &Identity, candidate_id: CandidateId) -> Result<TxAck>;
    async fn close_voting(&self, from: &Identity) -> Result<TxAck>;
}

pub struct MissingLedgerClient;

#[async_trait]
impl LedgerClient for MissingLedgerClient {
    async fn get_all_candidates(&self) -> Result<Value> {
        Err(anyhow!("ledger client is unavailable"))
    }

    async fn owner(&self) -> Result<Value> {
        Err(anyhow!("ledger client is unavailable"))
    }

    async fn voting_open(&self) -> Result<Value> {
        Err(anyhow!("ledger client is unavailable"))
    }

    async fn vote(&self, _from: &Identity, _candidate_id: CandidateId) -> Result<TxAck> {
        Err(anyhow!("ledger client is unavailable"))
    }

    async fn close_voting(&self, _from: &Identity) -> Result<TxAck> {
        Err(anyhow!("ledger client is unavailable"))
    }
}

/// Source of connection status and the active identity.
#[async_trait]
pub trait WalletSession: Send + Sync {
    async fn connect(&self) -> Result<Session>;
    async fn disconnect(&self) -> Result<()>;
    fn current(&self) -> Session;
}

pub struct DisconnectedWallet;

#[async_trait]
impl WalletSession for DisconnectedWallet {
    async fn connect(&self) -> Result<Session> {
        Err(anyhow!("wallet provider is unavailable"))
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    fn current(&self) -> Session {
        Session::disconnected()
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    StoreUpdated(StoreView),
    ReadFailed(CoreError),
    ActionSubmitted { kind: ActionKind, ack: TxAck },
    ActionFailed(CoreError),
}

/// Per-field failures from one refresh pass. Fields not listed were updated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub failures: Vec<CoreError>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_fields(&self) -> Vec<SnapshotField> {
        self.failures
            .iter()
            .filter_map(|failure| match failure {
                CoreError::ReadFailure { field, .. } => Some(*field),
                _ => None,
            })
            .collect()
    }
}

/// Held for the lifetime of a dispatched action. Dropping it, whether the
/// action finished or its future was cancelled, clears `action_pending`
/// before the gate opens again.
struct PendingAction<'a> {
    client: &'a VotingClient,
    _gate: MutexGuard<'a, ()>,
}

impl Drop for PendingAction<'_> {
    fn drop(&mut self) {
        let mut store = self.client.lock_store();
        store.set_pending(false);
        self.client.publish(store);
    }
}

/// Keeps one wallet session's view of the ledger in sync and dispatches
/// write actions against it.
pub struct VotingClient {
    ledger: Arc<dyn LedgerClient>,
    wallet: Arc<dyn WalletSession>,
    store: StdMutex<StateStore>,
    action_gate: Mutex<()>,
    events: broadcast::Sender<ClientEvent>,
}

impl VotingClient {
    pub fn new(ledger: Arc<dyn LedgerClient>, wallet: Arc<dyn WalletSession>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            ledger,
            wallet,
            store: StdMutex::new(StateStore::default()),
            action_gate: Mutex::new(()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn view(&self) -> StoreView {
        self.lock_store().view()
    }

    pub async fn is_admin(&self) -> bool {
        self.lock_store().is_admin()
    }

    pub async fn winner(&self) -> Option<Winner> {
        self.lock_store().winner()
    }

    /// The store is never held across an await.
    fn lock_store(&self) -> StdMutexGuard<'_, StateStore> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, store: StdMutexGuard<'_, StateStore>) {
        let view = store.view();
        drop(store);
        let _ = self.events.send(ClientEvent::StoreUpdated(view));
    }

    /// Initial load once both collaborators are available.
    pub async fn initialize(&self) -> RefreshReport {
        let session = self.wallet.current();
        {
            let mut store = self.lock_store();
            store.set_session(session);
            self.publish(store);
        }
        self.refresh().await
    }

    pub async fn connect_wallet(&self) -> Result<RefreshReport> {
        let session = self.wallet.connect().await?;
        info!(
            identity = session.identity.as_ref().map(|id| id.as_str()).unwrap_or(""),
            "session: wallet connected"
        );
        {
            let mut store = self.lock_store();
            store.reset();
            store.set_session(session);
            self.publish(store);
        }
        Ok(self.refresh().await)
    }

    pub async fn disconnect_wallet(&self) -> Result<()> {
        self.wallet.disconnect().await?;
        let mut store = self.lock_store();
        store.reset();
        info!("session: wallet disconnected, store reset");
        self.publish(store);
        Ok(())
    }

    /// Reacts to a connect, disconnect or account switch reported by the
    /// wallet. Returns the refresh report when a refresh was needed.
    pub async fn sync_session(&self) -> Option<RefreshReport> {
        let session = self.wallet.current();
        {
            let mut store = self.lock_store();
            if *store.session() == session {
                return None;
            }
            store.reset();
            if !session.connected {
                info!("session: wallet went away, store reset");
                self.publish(store);
                return None;
            }
            store.set_session(session);
            self.publish(store);
        }
        Some(self.refresh().await)
    }

    fn read_failed(&self, field: SnapshotField, cause: impl std::fmt::Display) -> CoreError {
        let err = CoreError::read(field, cause);
        warn!(%field, error = %err, "refresh: read failed");
        let _ = self.events.send(ClientEvent::ReadFailed(err.clone()));
        err
    }

    async fn refresh_candidates(&self) -> Option<CoreError> {
        let field = SnapshotField::Candidates;
        let payload = match self.ledger.get_all_candidates().await {
            Ok(payload) => payload,
            Err(err) => return Some(self.read_failed(field, format!("{err:#}"))),
        };
        match decode_candidates(&payload) {
            Ok(candidates) => {
                debug!(count = candidates.len(), "refresh: candidates updated");
                let mut store = self.lock_store();
                store.apply_snapshot(SnapshotUpdate {
                    candidates: Some(candidates),
                    ..SnapshotUpdate::default()
                });
                self.publish(store);
                None
            }
            Err(err) => Some(self.read_failed(field, err)),
        }
    }

    async fn refresh_owner(&self) -> Option<CoreError> {
        let field = SnapshotField::Owner;
        let payload = match self.ledger.owner().await {
            Ok(payload) => payload,
            Err(err) => return Some(self.read_failed(field, format!("{err:#}"))),
        };
        match decode_identity(&payload) {
            Ok(owner) => {
                debug!(owner = %owner, "refresh: owner updated");
                let mut store = self.lock_store();
                store.apply_snapshot(SnapshotUpdate {
                    owner: Some(owner),
                    ..SnapshotUpdate::default()
                });
                self.publish(store);
                None
            }
            Err(err) => Some(self.read_failed(field, err)),
        }
    }

    async fn refresh_voting_open(&self) -> Option<CoreError> {
        let field = SnapshotField::VotingOpen;
        let payload = match self.ledger.voting_open().await {
            Ok(payload) => payload,
            Err(err) => return Some(self.read_failed(field, format!("{err:#}"))),
        };
        match decode_bool(&payload) {
            Ok(voting_open) => {
                debug!(voting_open, "refresh: phase updated");
                let mut store = self.lock_store();
                store.apply_snapshot(SnapshotUpdate {
                    voting_open: Some(voting_open),
                    ..SnapshotUpdate::default()
                });
                self.publish(store);
                None
            }
            Err(err) => Some(self.read_failed(field, err)),
        }
    }

    /// Pulls candidates, owner and phase. The three reads run concurrently
    /// and each applies its own result, so one failure never holds back the
    /// other fields.
    pub async fn refresh(&self) -> RefreshReport {
        let (candidates, owner, voting_open) = join3(
            self.refresh_candidates(),
            self.refresh_owner(),
            self.refresh_voting_open(),
        )
        .await;
        let failures: Vec<CoreError> = [candidates, owner, voting_open]
            .into_iter()
            .flatten()
            .collect();
        if !failures.is_empty() {
            warn!(failed = failures.len(), "refresh: completed with stale fields");
        }
        RefreshReport { failures }
    }

    fn reject(&self, precondition: Precondition) -> CoreError {
        debug!(reason = %precondition, "dispatch: rejected before submission");
        CoreError::PreconditionViolation(precondition)
    }

    /// Casts a vote for `candidate_id` as the connected identity.
    pub async fn vote(&self, candidate_id: CandidateId) -> Result<TxAck, CoreError> {
        let gate = self
            .action_gate
            .try_lock()
            .map_err(|_| self.reject(Precondition::ActionInFlight))?;

        let (from, pending) = {
            let mut store = self.lock_store();
            let Some(from) = store.session().active_identity().cloned() else {
                return Err(self.reject(Precondition::Disconnected));
            };
            let known = store.snapshot().candidates.len();
            if !candidate_id.index().is_some_and(|index| index < known) {
                return Err(self.reject(Precondition::UnknownCandidate {
                    id: candidate_id,
                    known,
                }));
            }
            store.set_pending(true);
            self.publish(store);
            (from, self.pending_action(gate))
        };

        info!(candidate = candidate_id.0, from = %from, "dispatch: submitting vote");
        let outcome = self.ledger.vote(&from, candidate_id).await;
        self.finish_action(pending, ActionKind::Vote, outcome).await
    }

    /// Ends the voting round. Only the ledger owner may do this.
    pub async fn close_voting(&self) -> Result<TxAck, CoreError> {
        let gate = self
            .action_gate
            .try_lock()
            .map_err(|_| self.reject(Precondition::ActionInFlight))?;

        let (from, pending) = {
            let mut store = self.lock_store();
            let Some(from) = store.session().active_identity().cloned() else {
                return Err(self.reject(Precondition::Disconnected));
            };
            if !store.is_admin() {
                return Err(self.reject(Precondition::NotAdmin));
            }
            match store.snapshot().voting_open {
                Some(true) => {}
                Some(false) => return Err(self.reject(Precondition::VotingClosed)),
                None => return Err(self.reject(Precondition::PhaseUnknown)),
            }
            store.set_pending(true);
            self.publish(store);
            (from, self.pending_action(gate))
        };

        info!(from = %from, "dispatch: submitting close");
        let outcome = self.ledger.close_voting(&from).await;
        self.finish_action(pending, ActionKind::Close, outcome).await
    }

    fn pending_action<'a>(&'a self, gate: MutexGuard<'a, ()>) -> PendingAction<'a> {
        PendingAction {
            client: self,
            _gate: gate,
        }
    }

    /// Reconciles with the ledger whatever the write did, goes idle, and
    /// only then reports the outcome.
    async fn finish_action(
        &self,
        pending: PendingAction<'_>,
        kind: ActionKind,
        outcome: Result<TxAck>,
    ) -> Result<TxAck, CoreError> {
        let outcome = outcome.map_err(|err| CoreError::action(kind, format!("{err:#}")));
        if let Err(err) = &outcome {
            warn!(%kind, error = %err, "dispatch: action failed, reconciling");
        }

        self.refresh().await;
        drop(pending);

        match outcome {
            Ok(ack) => {
                info!(%kind, tx_hash = %ack.tx_hash, "dispatch: action acknowledged");
                let _ = self.events.send(ClientEvent::ActionSubmitted {
                    kind,
                    ack: ack.clone(),
                });
                Ok(ack)
            }
            Err(err) => {
                let _ = self.events.send(ClientEvent::ActionFailed(err.clone()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
