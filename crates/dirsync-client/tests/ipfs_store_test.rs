//! Contract tests for IpfsStoreClient against the Kubo HTTP RPC API.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | POST   | `/api/v0/add` | `put_*` |
//! | POST   | `/api/v0/cat` | `get_*` |
//! | POST   | `/api/v0/pin/rm` | `unpin_*` |

use dirsync_client::{ContentStore, IpfsStoreClient, IpfsStoreConfig, StoreError};
use dirsync_core::ContentAddress;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CID: &str = "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o";

fn test_client(mock_server: &MockServer, pin: bool) -> IpfsStoreClient {
    let mut config =
        IpfsStoreConfig::new(format!("{}/api/v0", mock_server.uri()).parse().unwrap());
    config.pin = pin;
    config.timeout_secs = 5;
    IpfsStoreClient::new(config).unwrap()
}

fn cid() -> ContentAddress {
    ContentAddress::new(CID).unwrap()
}

// ── POST /api/v0/add ─────────────────────────────────────────────────

#[tokio::test]
async fn put_uploads_multipart_and_returns_hash() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .and(query_param("pin", "true"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("{\"servers\":[]}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Name": "data.json",
            "Hash": CID,
            "Size": "22"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, true);
    let address = client.put(b"{\"servers\":[]}".to_vec()).await.unwrap();
    assert_eq!(address, cid());
}

#[tokio::test]
async fn put_passes_pin_false_when_pinning_disabled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .and(query_param("pin", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Hash": CID })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, false);
    assert_eq!(client.put(b"{}".to_vec()).await.unwrap(), cid());
}

#[tokio::test]
async fn put_rejects_unusable_address() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Hash": "" })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, true);
    let err = client.put(b"{}".to_vec()).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport { .. }));
    assert!(err.to_string().contains("unusable address"));
}

#[tokio::test]
async fn put_server_error_is_transport() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "Message": "repo is locked",
            "Code": 0,
            "Type": "error"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, true);
    let err = client.put(b"{}".to_vec()).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("repo is locked"));
}

// ── POST /api/v0/cat ─────────────────────────────────────────────────

#[tokio::test]
async fn get_returns_raw_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/cat"))
        .and(query_param("arg", CID))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{\"tools\":[]}".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, true);
    assert_eq!(client.get(&cid()).await.unwrap(), b"{\"tools\":[]}");
}

#[tokio::test]
async fn get_404_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/cat"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, true);
    let err = client.get(&cid()).await.unwrap_err();
    match err {
        StoreError::NotFound { address, .. } => assert_eq!(address, cid()),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn get_500_with_unresolvable_path_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/cat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "Message": "block was not found locally (offline): ipld: could not find QmT78z",
            "Code": 0,
            "Type": "error"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, true);
    let err = client.get(&cid()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn get_500_with_other_failure_is_transport() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/cat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("context deadline exceeded"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, true);
    let err = client.get(&cid()).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport { .. }));
    assert!(err.to_string().contains("HTTP 500"));
}

#[tokio::test]
async fn get_unreachable_node_is_transport() {
    let config = IpfsStoreConfig::new("http://127.0.0.1:1/api/v0".parse().unwrap());
    let client = IpfsStoreClient::new(config).unwrap();
    let err = client.get(&cid()).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport { .. }));
}

// ── POST /api/v0/pin/rm ──────────────────────────────────────────────

#[tokio::test]
async fn unpin_calls_pin_rm() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/pin/rm"))
        .and(query_param("arg", CID))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Pins": [CID] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, true);
    client.unpin(&cid()).await.unwrap();
}

#[tokio::test]
async fn unpin_of_unpinned_content_is_transport() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/pin/rm"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "Message": "not pinned or pinned indirectly",
            "Code": 0,
            "Type": "error"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, true);
    let err = client.unpin(&cid()).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport { .. }));
    assert!(err.to_string().contains("not pinned"));
}
