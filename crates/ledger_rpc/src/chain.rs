use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Static network description consumed by the RPC client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub currency: NativeCurrency,
}

impl ChainConfig {
    /// Local Anvil development chain.
    pub fn anvil() -> Self {
        Self {
            chain_id: 31337,
            name: "Local Chain".into(),
            rpc_url: "http://127.0.0.1:8545".into(),
            currency: NativeCurrency {
                name: "GDG".into(),
                symbol: "GDG".into(),
                decimals: 18,
            },
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::anvil()
    }
}
