use std::{fs, io, path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use ledger_rpc::{ChainConfig, ConfirmationPolicy};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub chain: ChainConfig,
    pub contract_address: Option<String>,
    pub account: Option<String>,
    /// Zero means writes return as soon as the node accepts them.
    pub confirm_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chain: ChainConfig::anvil(),
            contract_address: None,
            account: None,
            confirm_timeout_secs: 30,
            poll_interval_ms: 500,
        }
    }
}

impl Settings {
    pub fn contract_address(&self) -> Result<&str> {
        self.contract_address
            .as_deref()
            .ok_or_else(|| anyhow!("no contract address configured (BALLOT__CONTRACT_ADDRESS)"))
    }

    pub fn confirmation(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            timeout: (self.confirm_timeout_secs > 0)
                .then(|| Duration::from_secs(self.confirm_timeout_secs)),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    rpc_url: Option<String>,
    chain_id: Option<u64>,
    chain_name: Option<String>,
    currency_name: Option<String>,
    currency_symbol: Option<String>,
    currency_decimals: Option<u8>,
    contract_address: Option<String>,
    account: Option<String>,
    confirm_timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
}

/// Defaults, then the TOML file (if present), then `BALLOT__*` variables.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file {}", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> Result<()> {
    let file: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file.rpc_url {
        settings.chain.rpc_url = v;
    }
    if let Some(v) = file.chain_id {
        settings.chain.chain_id = v;
    }
    if let Some(v) = file.chain_name {
        settings.chain.name = v;
    }
    if let Some(v) = file.currency_name {
        settings.chain.currency.name = v;
    }
    if let Some(v) = file.currency_symbol {
        settings.chain.currency.symbol = v;
    }
    if let Some(v) = file.currency_decimals {
        settings.chain.currency.decimals = v;
    }
    if file.contract_address.is_some() {
        settings.contract_address = file.contract_address;
    }
    if file.account.is_some() {
        settings.account = file.account;
    }
    if let Some(v) = file.confirm_timeout_secs {
        settings.confirm_timeout_secs = v;
    }
    if let Some(v) = file.poll_interval_ms {
        settings.poll_interval_ms = v;
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be an unsigned integer, got `{value}`"))
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(v) = lookup("BALLOT__RPC_URL") {
        settings.chain.rpc_url = v;
    }
    if let Some(v) = lookup("BALLOT__CHAIN_ID") {
        settings.chain.chain_id = parse_number("BALLOT__CHAIN_ID", &v)?;
    }
    if let Some(v) = lookup("BALLOT__CONTRACT_ADDRESS") {
        settings.contract_address = Some(v);
    }
    if let Some(v) = lookup("BALLOT__ACCOUNT") {
        settings.account = Some(v);
    }
    if let Some(v) = lookup("BALLOT__CONFIRM_TIMEOUT_SECS") {
        settings.confirm_timeout_secs = parse_number("BALLOT__CONFIRM_TIMEOUT_SECS", &v)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
