//! Ethereum JSON-RPC implementations of the voting core's ledger and wallet
//! collaborators.

pub mod chain;
pub mod contract;
mod ledger;
mod provider;
mod wallet;

pub use chain::{ChainConfig, NativeCurrency};
pub use contract::VotingContract;
pub use ledger::{ConfirmationPolicy, JsonRpcLedgerClient};
pub use provider::{http_provider, parse_address};
pub use wallet::NodeWalletSession;
