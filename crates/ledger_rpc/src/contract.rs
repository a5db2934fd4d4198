//! ABI of the voting contract and the mapping from decoded tokens to the
//! untyped JSON the core consumes.

use anyhow::{Context, Result};
use ethers_contract::BaseContract;
use ethers_core::{
    abi::{Abi, Token, Tokenize},
    types::{Bytes, I256},
};
use serde_json::Value;

const VOTING_ABI: &str = r#"[
  {
    "type": "function",
    "name": "getAllCandidates",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [
      {
        "name": "",
        "type": "tuple[]",
        "internalType": "struct Voting.Candidate[]",
        "components": [
          { "name": "name", "type": "string", "internalType": "string" },
          { "name": "voteCount", "type": "uint256", "internalType": "uint256" }
        ]
      }
    ]
  },
  {
    "type": "function",
    "name": "owner",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [{ "name": "", "type": "address", "internalType": "address" }]
  },
  {
    "type": "function",
    "name": "votingOpen",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [{ "name": "", "type": "bool", "internalType": "bool" }]
  },
  {
    "type": "function",
    "name": "vote",
    "stateMutability": "nonpayable",
    "inputs": [{ "name": "candidateIndex", "type": "uint256", "internalType": "uint256" }],
    "outputs": []
  },
  {
    "type": "function",
    "name": "closeVoting",
    "stateMutability": "nonpayable",
    "inputs": [],
    "outputs": []
  }
]"#;

/// Voting contract wrapper.
#[derive(Debug, Clone)]
pub struct VotingContract {
    base_contract: BaseContract,
}

impl VotingContract {
    pub fn new() -> Result<Self> {
        let abi: Abi = serde_json::from_str(VOTING_ABI).context("voting contract abi")?;
        Ok(Self {
            base_contract: BaseContract::from(abi),
        })
    }

    pub fn call_data<T: Tokenize>(&self, function: &str, args: T) -> Result<Bytes> {
        self.base_contract
            .encode(function, args)
            .with_context(|| format!("failed to encode {function} call"))
    }

    /// Decodes the single return value of `function` into JSON.
    pub fn decode_output(&self, function: &str, data: &[u8]) -> Result<Value> {
        let token: Token = self
            .base_contract
            .decode_output(function, data)
            .with_context(|| format!("{function} returned undecodable data"))?;
        Ok(token_to_json(token))
    }
}

/// Unsigned and signed integers become decimal strings, addresses and byte
/// strings lowercase `0x` hex, tuples positional arrays.
pub fn token_to_json(token: Token) -> Value {
    match token {
        Token::Address(address) => Value::String(format!("{address:#x}")),
        Token::Bool(value) => Value::Bool(value),
        Token::String(value) => Value::String(value),
        Token::Uint(value) => Value::String(value.to_string()),
        Token::Int(value) => Value::String(I256::from_raw(value).to_string()),
        Token::Bytes(bytes) | Token::FixedBytes(bytes) => {
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        Token::Array(tokens) | Token::FixedArray(tokens) | Token::Tuple(tokens) => {
            Value::Array(tokens.into_iter().map(token_to_json).collect())
        }
    }
}

#[cfg(test)]
#[path = "tests/contract_tests.rs"]
mod tests;
