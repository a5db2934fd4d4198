use std::sync::RwLock;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use client_core::WalletSession;
use ethers_providers::{Http, Middleware, Provider};
use shared::domain::{Identity, Session};
use tracing::info;

use crate::provider::{format_address, parse_address};

/// Wallet backed by the accounts a node manages (`eth_accounts`).
pub struct NodeWalletSession {
    provider: Provider<Http>,
    preferred: Option<Identity>,
    session: RwLock<Session>,
}

impl NodeWalletSession {
    pub fn new(provider: Provider<Http>, preferred: Option<Identity>) -> Self {
        Self {
            provider,
            preferred,
            session: RwLock::new(Session::disconnected()),
        }
    }

    fn store(&self, session: Session) {
        let mut guard = self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = session;
    }
}

#[async_trait]
impl WalletSession for NodeWalletSession {
    async fn connect(&self) -> Result<Session> {
        let accounts: Vec<Identity> = self
            .provider
            .get_accounts()
            .await
            .context("eth_accounts failed")?
            .iter()
            .map(|account| Identity::new(format_address(account)))
            .collect();

        let identity = match &self.preferred {
            Some(preferred) => {
                parse_address(preferred.as_str())?;
                if !accounts.contains(preferred) {
                    bail!("account {preferred} is not managed by the node");
                }
                preferred.clone()
            }
            None => accounts
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("node exposes no accounts"))?,
        };

        info!(identity = %identity, "wallet: connected");
        let session = Session::connected(identity);
        self.store(session.clone());
        Ok(session)
    }

    async fn disconnect(&self) -> Result<()> {
        self.store(Session::disconnected());
        info!("wallet: disconnected");
        Ok(())
    }

    fn current(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
