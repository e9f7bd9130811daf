//! Contract tests for EvmAnchorClient against an Ethereum JSON-RPC node.
//!
//! Every request goes to the same URL, so mocks are told apart by the
//! JSON-RPC `method` in the body.
//!
//! ## Methods Tested
//!
//! | Method | Contract call | Test |
//! |--------|---------------|------|
//! | `eth_call` | `getRootCID()` | `read_root_*` |
//! | `eth_call` | `getOwner()` | `owner_*` |
//! | `eth_sendTransaction` | `setRootCID(string)` | `propose_*` |
//! | `personal_sendTransaction` | `setRootCID(string)` | `propose_with_passphrase_*` |
//! | `eth_getTransactionCount` | | `propose_with_local_key_*` |
//! | `eth_sendRawTransaction` | `setRootCID(string)` | `propose_with_local_key_*` |
//! | `eth_getTransactionReceipt` | | `propose_*` |

use dirsync_client::{
    AnchorCredentials, AnchorError, EvmAnchorClient, EvmAnchorConfig, VersionAnchor,
};
use dirsync_core::ContentAddress;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const SIGNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const CID: &str = "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o";
// Hardhat / Anvil development account #0.
const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const TX: &str = "0x9fc76417374aa880d4449a1f7f31ec597f00b1f6f3dd2d66f4c9c6c445836d8b";

fn test_client(mock_server: &MockServer, confirmation_secs: u64) -> EvmAnchorClient {
    let config = EvmAnchorConfig::new(mock_server.uri(), CONTRACT, 31337)
        .with_chain_name("hardhat")
        .with_confirmation(confirmation_secs, 10);
    EvmAnchorClient::new(config).unwrap()
}

/// ABI-encode a single `string` return value.
fn abi_string(value: &str) -> String {
    let hex = value
        .bytes()
        .map(|b| format!("{b:02x}"))
        .collect::<String>();
    let padded = value.len().div_ceil(32) * 64;
    format!("0x{:064x}{:064x}{:0<width$}", 0x20, value.len(), hex, width = padded)
}

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

fn cid() -> ContentAddress {
    ContentAddress::new(CID).unwrap()
}

async fn mount_receipt(mock_server: &MockServer, status: &str) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt", "params": [TX] })))
        .respond_with(rpc_result(json!({
            "transactionHash": TX,
            "blockNumber": "0x2a",
            "status": status
        })))
        .mount(mock_server)
        .await;
}

// ── getRootCID() ─────────────────────────────────────────────────────

#[tokio::test]
async fn read_root_decodes_anchored_cid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_call",
            "params": [{ "to": CONTRACT, "data": "0xea373564" }, "latest"]
        })))
        .respond_with(rpc_result(json!(abi_string(CID))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 5);
    assert_eq!(client.read_root().await.unwrap(), Some(cid()));
}

#[tokio::test]
async fn read_root_empty_string_means_unpublished() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .respond_with(rpc_result(json!(abi_string(""))))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 5);
    assert_eq!(client.read_root().await.unwrap(), None);
}

#[tokio::test]
async fn read_root_garbage_return_data_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .respond_with(rpc_result(json!("0x")))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 5);
    let err = client.read_root().await.unwrap_err();
    assert!(matches!(err, AnchorError::InvalidResponse { .. }));
}

#[tokio::test]
async fn read_root_http_failure_is_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 5);
    let err = client.read_root().await.unwrap_err();
    match &err {
        AnchorError::Unavailable { chain, reason } => {
            assert_eq!(chain, "hardhat");
            assert!(reason.contains("eth_call"));
        }
        other => panic!("expected Unavailable, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn read_root_rpc_error_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(rpc_error(-32000, "execution reverted"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 5);
    match client.read_root().await.unwrap_err() {
        AnchorError::Rpc { code, message, .. } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "execution reverted");
        }
        other => panic!("expected Rpc, got {other:?}"),
    }
}

// ── getOwner() ───────────────────────────────────────────────────────

#[tokio::test]
async fn owner_decodes_address() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_call",
            "params": [{ "to": CONTRACT, "data": "0x893d20e8" }, "latest"]
        })))
        .respond_with(rpc_result(json!(format!(
            "0x{:0>64}",
            "f39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        ))))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 5);
    assert_eq!(
        client.owner().await.unwrap(),
        "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
    );
}

// ── setRootCID(string) ───────────────────────────────────────────────

#[tokio::test]
async fn propose_sends_transaction_and_waits_for_receipt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_sendTransaction",
            "params": [{
                "from": SIGNER,
                "to": CONTRACT,
                "gas": "0x2dc6c0",
                "gasPrice": "0x2540be400",
                "chainId": "0x7a69"
            }]
        })))
        .respond_with(rpc_result(json!(TX)))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_receipt(&mock_server, "0x1").await;

    let client = test_client(&mock_server, 5);
    let receipt = client
        .propose_root(&cid(), &AnchorCredentials::managed(SIGNER))
        .await
        .unwrap();
    assert_eq!(receipt.transaction_id, TX);
    assert_eq!(receipt.block_number, 42);
    assert_eq!(receipt.chain_id, "hardhat");
    assert_eq!(receipt.root, cid());
}

#[tokio::test]
async fn propose_with_passphrase_uses_personal_send() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "personal_sendTransaction",
            "params": [{ "from": SIGNER, "to": CONTRACT }, "correct horse"]
        })))
        .respond_with(rpc_result(json!(TX)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendTransaction" })))
        .respond_with(rpc_result(json!(TX)))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_receipt(&mock_server, "0x1").await;

    let client = test_client(&mock_server, 5);
    let creds = AnchorCredentials::managed(SIGNER).with_passphrase("correct horse");
    let receipt = client.propose_root(&cid(), &creds).await.unwrap();
    assert_eq!(receipt.block_number, 42);
}

#[tokio::test]
async fn propose_with_local_key_sends_raw_transaction() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getTransactionCount",
            "params": [SIGNER.to_ascii_lowercase(), "pending"]
        })))
        .respond_with(rpc_result(json!("0x7")))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .respond_with(rpc_result(json!(TX)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendTransaction" })))
        .respond_with(rpc_result(json!(TX)))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_receipt(&mock_server, "0x1").await;

    let client = test_client(&mock_server, 5);
    let creds = AnchorCredentials::local_key(DEV_KEY).unwrap();
    let receipt = client.propose_root(&cid(), &creds).await.unwrap();
    assert_eq!(receipt.transaction_id, TX);
    assert_eq!(receipt.block_number, 42);

    let requests = mock_server.received_requests().await.unwrap();
    let raw_hex = requests
        .iter()
        .map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).unwrap())
        .find(|body| body["method"] == "eth_sendRawTransaction")
        .and_then(|body| body["params"][0].as_str().map(str::to_string))
        .unwrap();
    assert!(raw_hex.starts_with("0x"));
    let raw = hex::decode(&raw_hex[2..]).unwrap();

    let tx = rlp::Rlp::new(&raw);
    assert_eq!(tx.item_count().unwrap(), 9);
    assert_eq!(tx.val_at::<u64>(0).unwrap(), 7);
    assert_eq!(tx.val_at::<u64>(1).unwrap(), 10_000_000_000);
    assert_eq!(tx.val_at::<u64>(2).unwrap(), 3_000_000);
    assert_eq!(
        tx.at(3).unwrap().data().unwrap(),
        hex::decode(&CONTRACT[2..]).unwrap().as_slice()
    );
    assert!(tx.at(4).unwrap().data().unwrap().is_empty());
    let calldata = hex::decode(format!("7c0cf836{}", &abi_string(CID)[2..])).unwrap();
    assert_eq!(tx.at(5).unwrap().data().unwrap(), calldata.as_slice());
    // EIP-155: v = recovery id + chain id * 2 + 35, chain id 31337.
    let v = tx.val_at::<u64>(6).unwrap();
    assert!(v == 62_709 || v == 62_710, "v = {v}");
    assert_eq!(tx.at(7).unwrap().data().unwrap().len(), 32);
}

#[tokio::test]
async fn propose_with_local_key_rejected_raw_transaction() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getTransactionCount" })))
        .respond_with(rpc_result(json!("0x0")))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendRawTransaction" })))
        .respond_with(rpc_error(-32000, "insufficient funds for gas * price + value"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 5);
    let creds = AnchorCredentials::local_key(DEV_KEY).unwrap();
    match client.propose_root(&cid(), &creds).await.unwrap_err() {
        AnchorError::Rejected { reason, .. } => assert!(reason.contains("insufficient funds")),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn propose_rpc_error_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendTransaction" })))
        .respond_with(rpc_error(-32000, "nonce too low"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 5);
    let err = client
        .propose_root(&cid(), &AnchorCredentials::managed(SIGNER))
        .await
        .unwrap_err();
    match &err {
        AnchorError::Rejected { reason, .. } => assert_eq!(reason, "nonce too low"),
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn propose_reverted_transaction_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendTransaction" })))
        .respond_with(rpc_result(json!(TX)))
        .mount(&mock_server)
        .await;
    mount_receipt(&mock_server, "0x0").await;

    let client = test_client(&mock_server, 5);
    let err = client
        .propose_root(&cid(), &AnchorCredentials::managed(SIGNER))
        .await
        .unwrap_err();
    match err {
        AnchorError::Rejected { reason, .. } => assert!(reason.contains("reverted")),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn propose_without_inclusion_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendTransaction" })))
        .respond_with(rpc_result(json!(TX)))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt" })))
        .respond_with(rpc_result(serde_json::Value::Null))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 0);
    match client
        .propose_root(&cid(), &AnchorCredentials::managed(SIGNER))
        .await
        .unwrap_err()
    {
        AnchorError::Timeout { transaction_id, .. } => assert_eq!(transaction_id, TX),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn propose_with_malformed_signer_never_reaches_node() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(rpc_result(json!(TX)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 5);
    let err = client
        .propose_root(&cid(), &AnchorCredentials::managed("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, AnchorError::InvalidConfig(_)));
    assert!(!err.is_retryable());
}
