use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use client_core::LedgerClient;
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, U256, U64,
};
use ethers_providers::{Http, Middleware, Provider};
use serde_json::Value;
use shared::domain::{CandidateId, Identity, TxAck};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{
    chain::ChainConfig,
    contract::VotingContract,
    provider::{format_address, http_provider, parse_address},
};

/// How long a write waits for its receipt. `timeout: None` returns as soon
/// as the node accepts the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Voting contract reached through a node's JSON-RPC endpoint.
pub struct JsonRpcLedgerClient {
    provider: Provider<Http>,
    contract: VotingContract,
    address: Address,
    confirmation: ConfirmationPolicy,
}

impl JsonRpcLedgerClient {
    pub fn new(chain: &ChainConfig, contract_address: &str) -> Result<Self> {
        Self::with_provider(http_provider(&chain.rpc_url)?, contract_address)
    }

    pub fn with_provider(provider: Provider<Http>, contract_address: &str) -> Result<Self> {
        let address = parse_address(contract_address).context("invalid contract address")?;
        let confirmation = ConfirmationPolicy::default();
        Ok(Self {
            provider: provider.interval(confirmation.poll_interval),
            contract: VotingContract::new()?,
            address,
            confirmation,
        })
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.provider = self.provider.interval(confirmation.poll_interval);
        self.confirmation = confirmation;
        self
    }

    pub fn contract_address(&self) -> String {
        format_address(&self.address)
    }

    pub async fn verify_chain(&self, expected_chain_id: u64) -> Result<()> {
        let reported = self
            .provider
            .get_chainid()
            .await
            .context("eth_chainId failed")?;
        if reported != U256::from(expected_chain_id) {
            bail!("node reports chain id {reported}, expected {expected_chain_id}");
        }
        Ok(())
    }

    async fn read(&self, function: &str) -> Result<Value> {
        let request = TransactionRequest::new()
            .to(self.address)
            .data(self.contract.call_data(function, ())?);
        let tx = TypedTransaction::Legacy(request);
        let data = self
            .provider
            .call(&tx, None)
            .await
            .with_context(|| format!("{function} call failed"))?;
        self.contract.decode_output(function, &data)
    }

    async fn send(&self, from: &Identity, function: &str, data: Bytes) -> Result<TxAck> {
        let from = parse_address(from.as_str()).context("invalid sender identity")?;
        let request = TransactionRequest::new()
            .from(from)
            .to(self.address)
            .data(data);
        let pending = self
            .provider
            .send_transaction(request, None)
            .await
            .with_context(|| format!("{function} transaction was not accepted"))?;
        let tx_hash = format!("{:#x}", *pending);
        info!(%tx_hash, function, "rpc: transaction submitted");

        let Some(limit) = self.confirmation.timeout else {
            return Ok(TxAck::new(tx_hash));
        };
        let receipt = timeout(limit, pending.interval(self.confirmation.poll_interval))
            .await
            .with_context(|| format!("transaction {tx_hash} not confirmed within {limit:?}"))?
            .with_context(|| format!("failed to confirm transaction {tx_hash}"))?;
        match receipt {
            None => bail!("transaction {tx_hash} was dropped by the node"),
            Some(receipt) if receipt.status == Some(U64::zero()) => {
                bail!("transaction {tx_hash} reverted")
            }
            Some(receipt) => {
                debug!(%tx_hash, block = ?receipt.block_number, "rpc: transaction confirmed");
                Ok(TxAck::new(tx_hash))
            }
        }
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn get_all_candidates(&self) -> Result<Value> {
        self.read("getAllCandidates").await
    }

    async fn owner(&self) -> Result<Value> {
        self.read("owner").await
    }

    async fn voting_open(&self) -> Result<Value> {
        self.read("votingOpen").await
    }

    async fn vote(&self, from: &Identity, candidate_id: CandidateId) -> Result<TxAck> {
        let data = self.contract.call_data("vote", U256::from(candidate_id.0))?;
        self.send(from, "vote", data).await
    }

    async fn close_voting(&self, from: &Identity) -> Result<TxAck> {
        let data = self.contract.call_data("closeVoting", ())?;
        self.send(from, "closeVoting", data).await
    }
}
