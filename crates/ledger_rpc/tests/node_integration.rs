use std::{sync::Arc, time::Duration};

use axum::{extract::State, routing::post, Json, Router};
use client_core::{LedgerClient, VotingClient, WalletSession};
use ethers_core::{
    abi::{encode, Token},
    types::{Address, U256},
    utils::id,
};
use ledger_rpc::{http_provider, ConfirmationPolicy, JsonRpcLedgerClient, NodeWalletSession};
use serde_json::{json, Value};
use shared::{
    domain::{Candidate, CandidateId, Identity},
    error::{ActionKind, CoreError},
};
use tokio::{net::TcpListener, sync::Mutex};

const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const OWNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const VOTER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
const BLOCK_HASH: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

struct NodeState {
    chain_id: u64,
    accounts: Vec<String>,
    candidates: Vec<(String, u64)>,
    owner: String,
    voting_open: bool,
    unmined_lookups: u32,
    revert_writes: bool,
    fail_calls: bool,
    methods: Vec<String>,
    transactions: Vec<Value>,
}

#[derive(Clone)]
struct MockNode {
    state: Arc<Mutex<NodeState>>,
}

fn selector_hex(signature: &str) -> String {
    format!("0x{}", hex::encode(id(signature)))
}

fn data_hex(tokens: &[Token]) -> Value {
    json!(format!("0x{}", hex::encode(encode(tokens))))
}

fn address(raw: &str) -> Address {
    raw.parse().expect("address")
}

fn call_data(tx: &Value) -> String {
    tx.get("data")
        .or_else(|| tx.get("input"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn transaction(state: &NodeState, block_number: Value) -> Value {
    let tx = state.transactions.last().cloned().unwrap_or_else(|| json!({}));
    json!({
        "hash": TX_HASH,
        "nonce": "0x0",
        "blockHash": if block_number.is_null() { Value::Null } else { json!(BLOCK_HASH) },
        "blockNumber": block_number,
        "transactionIndex": "0x0",
        "from": tx.get("from").cloned().unwrap_or_else(|| json!(OWNER.to_ascii_lowercase())),
        "to": CONTRACT.to_ascii_lowercase(),
        "value": "0x0",
        "gasPrice": "0x1",
        "gas": "0x5208",
        "input": call_data(&tx),
        "v": "0x0",
        "r": "0x0",
        "s": "0x0",
        "type": "0x0",
    })
}

fn receipt(state: &NodeState) -> Value {
    json!({
        "transactionHash": TX_HASH,
        "transactionIndex": "0x0",
        "blockHash": BLOCK_HASH,
        "blockNumber": "0x1",
        "from": OWNER.to_ascii_lowercase(),
        "to": CONTRACT.to_ascii_lowercase(),
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "status": if state.revert_writes { "0x0" } else { "0x1" },
        "type": "0x0",
        "effectiveGasPrice": "0x1",
    })
}

fn rpc_error(id: &Value, code: i64, message: &str) -> Json<Value> {
    Json(json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } }))
}

async fn handle_rpc(State(node): State<MockNode>, Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    let mut state = node.state.lock().await;
    state.methods.push(method.clone());

    let result = match method.as_str() {
        "eth_chainId" => json!(format!("0x{:x}", state.chain_id)),
        "eth_accounts" => json!(state.accounts),
        "eth_gasPrice" => json!("0x1"),
        "eth_estimateGas" => json!("0x5208"),
        "eth_blockNumber" => json!("0x1"),
        "eth_call" => {
            let data = call_data(&params[0]);
            if state.fail_calls {
                return rpc_error(&id, 3, "execution reverted");
            } else if data == selector_hex("getAllCandidates()") {
                let candidates = state
                    .candidates
                    .iter()
                    .map(|(name, votes)| {
                        Token::Tuple(vec![
                            Token::String(name.clone()),
                            Token::Uint(U256::from(*votes)),
                        ])
                    })
                    .collect();
                data_hex(&[Token::Array(candidates)])
            } else if data == selector_hex("owner()") {
                data_hex(&[Token::Address(address(&state.owner))])
            } else if data == selector_hex("votingOpen()") {
                data_hex(&[Token::Bool(state.voting_open)])
            } else {
                return rpc_error(&id, 3, "execution reverted");
            }
        }
        "eth_sendTransaction" => {
            let tx = params[0].clone();
            state.transactions.push(tx.clone());
            if !state.revert_writes {
                let data = call_data(&tx);
                if let Some(arg) = data.strip_prefix(&selector_hex("vote(uint256)")) {
                    let index = u64::from_str_radix(arg, 16).expect("vote arg") as usize;
                    state.candidates[index].1 += 1;
                } else if data == selector_hex("closeVoting()") {
                    state.voting_open = false;
                }
            }
            json!(TX_HASH)
        }
        "eth_getTransactionByHash" => {
            if state.unmined_lookups > 0 {
                state.unmined_lookups -= 1;
                transaction(&state, Value::Null)
            } else {
                transaction(&state, json!("0x1"))
            }
        }
        "eth_getTransactionReceipt" => receipt(&state),
        _ => return rpc_error(&id, -32601, "method not found"),
    };
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

async fn spawn_node() -> (String, MockNode) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let node = MockNode {
        state: Arc::new(Mutex::new(NodeState {
            chain_id: 31337,
            accounts: vec![OWNER.to_string(), VOTER.to_string()],
            candidates: vec![("Alice".to_string(), 0), ("Bob".to_string(), 0)],
            owner: OWNER.to_string(),
            voting_open: true,
            unmined_lookups: 0,
            revert_writes: false,
            fail_calls: false,
            methods: Vec::new(),
            transactions: Vec::new(),
        })),
    };
    let app = Router::new()
        .route("/", post(handle_rpc))
        .with_state(node.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), node)
}

fn fast_confirmation() -> ConfirmationPolicy {
    ConfirmationPolicy {
        timeout: Some(Duration::from_secs(5)),
        poll_interval: Duration::from_millis(10),
    }
}

fn ledger(url: &str) -> JsonRpcLedgerClient {
    JsonRpcLedgerClient::with_provider(http_provider(url).expect("provider"), CONTRACT)
        .expect("ledger")
        .with_confirmation(fast_confirmation())
}

fn count(methods: &[String], name: &str) -> usize {
    methods.iter().filter(|method| *method == name).count()
}

#[tokio::test]
async fn reads_come_back_as_untyped_payloads() {
    let (url, _node) = spawn_node().await;
    let ledger = ledger(&url);

    assert_eq!(
        ledger.get_all_candidates().await.expect("candidates"),
        json!([["Alice", "0"], ["Bob", "0"]])
    );
    assert_eq!(
        ledger.owner().await.expect("owner"),
        json!(OWNER.to_ascii_lowercase())
    );
    assert_eq!(ledger.voting_open().await.expect("phase"), json!(true));
}

#[tokio::test]
async fn vote_sends_encoded_calldata_and_waits_until_mined() {
    let (url, node) = spawn_node().await;
    node.state.lock().await.unmined_lookups = 2;
    let ledger = ledger(&url);

    let ack = ledger
        .vote(&Identity::new(VOTER), CandidateId(1))
        .await
        .expect("vote");
    assert_eq!(ack.tx_hash, TX_HASH);

    let state = node.state.lock().await;
    let tx = &state.transactions[0];
    assert_eq!(tx["from"], json!(VOTER.to_ascii_lowercase()));
    assert_eq!(tx["to"], json!(CONTRACT.to_ascii_lowercase()));
    let mut expected = id("vote(uint256)").to_vec();
    expected.extend(encode(&[Token::Uint(U256::one())]));
    assert_eq!(call_data(tx), format!("0x{}", hex::encode(expected)));
    assert!(count(&state.methods, "eth_getTransactionByHash") >= 3);
    assert!(count(&state.methods, "eth_getTransactionReceipt") >= 1);
    assert_eq!(state.candidates[1].1, 1);
}

#[tokio::test]
async fn reverted_receipt_fails_the_write() {
    let (url, node) = spawn_node().await;
    node.state.lock().await.revert_writes = true;
    let ledger = ledger(&url);

    let err = ledger
        .close_voting(&Identity::new(OWNER))
        .await
        .expect_err("reverted");
    assert!(err.to_string().contains("reverted"), "error: {err:#}");
}

#[tokio::test]
async fn unmined_write_times_out() {
    let (url, node) = spawn_node().await;
    node.state.lock().await.unmined_lookups = u32::MAX;
    let ledger = ledger(&url).with_confirmation(ConfirmationPolicy {
        timeout: Some(Duration::from_millis(100)),
        poll_interval: Duration::from_millis(10),
    });

    let err = ledger
        .vote(&Identity::new(VOTER), CandidateId(0))
        .await
        .expect_err("timeout");
    assert!(err.to_string().contains("not confirmed"), "error: {err:#}");
}

#[tokio::test]
async fn skipping_confirmation_never_polls_the_node() {
    let (url, node) = spawn_node().await;
    let ledger = ledger(&url).with_confirmation(ConfirmationPolicy {
        timeout: None,
        poll_interval: Duration::from_millis(10),
    });

    ledger
        .vote(&Identity::new(VOTER), CandidateId(0))
        .await
        .expect("vote");
    let state = node.state.lock().await;
    assert_eq!(count(&state.methods, "eth_getTransactionByHash"), 0);
    assert_eq!(count(&state.methods, "eth_getTransactionReceipt"), 0);
}

#[tokio::test]
async fn rpc_error_objects_become_read_errors() {
    let (url, node) = spawn_node().await;
    node.state.lock().await.fail_calls = true;
    let ledger = ledger(&url);

    let err = ledger.owner().await.expect_err("rpc error");
    assert!(format!("{err:#}").contains("owner call failed"), "error: {err:#}");
    assert!(ledger.voting_open().await.is_err());
}

#[tokio::test]
async fn verify_chain_compares_chain_id() {
    let (url, node) = spawn_node().await;
    let ledger = ledger(&url);
    ledger.verify_chain(31337).await.expect("same chain");

    node.state.lock().await.chain_id = 1;
    assert!(ledger.verify_chain(31337).await.is_err());
}

#[test]
fn rejects_bad_addresses_and_urls() {
    let provider = http_provider("http://127.0.0.1:8545").expect("provider");
    assert!(JsonRpcLedgerClient::with_provider(provider.clone(), "0x1234").is_err());
    let unprefixed = CONTRACT.trim_start_matches("0x");
    assert!(JsonRpcLedgerClient::with_provider(provider, unprefixed).is_err());
    assert!(http_provider("ws://127.0.0.1:8545").is_err());
    assert!(http_provider("not a url").is_err());
}

#[tokio::test]
async fn wallet_selects_preferred_or_first_account() {
    let (url, _node) = spawn_node().await;
    let provider = http_provider(&url).expect("provider");

    let preferred = NodeWalletSession::new(
        provider.clone(),
        Some(Identity::new(VOTER.to_ascii_lowercase())),
    );
    let session = preferred.connect().await.expect("connect preferred");
    assert_eq!(session.identity, Some(Identity::new(VOTER)));
    assert!(preferred.current().connected);
    preferred.disconnect().await.expect("disconnect");
    assert!(!preferred.current().connected);

    let first = NodeWalletSession::new(provider.clone(), None);
    let session = first.connect().await.expect("connect first");
    assert_eq!(session.identity, Some(Identity::new(OWNER)));

    let unknown = NodeWalletSession::new(
        provider,
        Some(Identity::new("0x0000000000000000000000000000000000000009")),
    );
    assert!(unknown.connect().await.is_err());
    assert!(!unknown.current().connected);
}

#[tokio::test]
async fn voting_client_round_trip_against_node() {
    let (url, node) = spawn_node().await;
    let provider = http_provider(&url).expect("provider");
    let ledger = Arc::new(
        JsonRpcLedgerClient::with_provider(provider.clone(), CONTRACT)
            .expect("ledger")
            .with_confirmation(fast_confirmation()),
    );

    let voter = VotingClient::new(
        ledger.clone(),
        Arc::new(NodeWalletSession::new(
            provider.clone(),
            Some(Identity::new(VOTER)),
        )),
    );
    let report = voter.connect_wallet().await.expect("connect voter");
    assert!(report.is_complete());
    assert!(!voter.is_admin().await);

    voter.vote(CandidateId(0)).await.expect("vote");
    let view = voter.view().await;
    assert_eq!(
        view.snapshot.candidates,
        vec![Candidate::new("Alice", 1), Candidate::new("Bob", 0)]
    );
    assert!(view.winner.is_none());

    let owner = VotingClient::new(ledger, Arc::new(NodeWalletSession::new(provider, None)));
    owner.connect_wallet().await.expect("connect owner");
    assert!(owner.is_admin().await);
    owner.close_voting().await.expect("close");

    let winner = owner.winner().await.expect("winner");
    assert_eq!(winner.candidate.name, "Alice");

    node.state.lock().await.revert_writes = true;
    let err = voter.vote(CandidateId(1)).await.expect_err("reverted");
    assert!(matches!(
        err,
        CoreError::ActionFailure {
            kind: ActionKind::Vote,
            ..
        }
    ));
    assert_eq!(voter.view().await.snapshot.voting_open, Some(false));
}
