//! Typed client for the IPFS (Kubo) HTTP RPC API.
//!
//! Base URL: `http://127.0.0.1:5001/api/v0` for a local daemon.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/add?pin=<bool>` | Upload a blob (multipart `file` part) |
//! | POST   | `/cat?arg=<cid>` | Fetch a blob |
//! | POST   | `/pin/rm?arg=<cid>` | Release a pin |
//!
//! Kubo answers every RPC call with POST semantics and reports failures as
//! HTTP 500 with a `{"Message": ..., "Code": ..., "Type": "error"}` body. A
//! 404, or a 500 whose message says the path is unknown or unparseable, is
//! mapped to [`StoreError::NotFound`]; everything else is a transport error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use dirsync_core::ContentAddress;

use crate::error::StoreError;
use crate::store::ContentStore;

/// Default API base of a local Kubo daemon.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001/api/v0";

/// Kubo error messages that mean "this address does not resolve".
const NOT_FOUND_MARKERS: &[&str] = &["not found", "no link named", "invalid path", "invalid cid"];

/// Configuration for the IPFS HTTP client.
#[derive(Debug, Clone)]
pub struct IpfsStoreConfig {
    /// RPC API base, including the `/api/v0` prefix.
    pub api_url: Url,
    /// Pin uploaded blobs so the node's garbage collector keeps them.
    pub pin: bool,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl IpfsStoreConfig {
    /// Configuration with pinning enabled and a 30s timeout.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            pin: true,
            timeout_secs: 30,
        }
    }

    /// Configuration for a Kubo daemon on localhost.
    pub fn local() -> Result<Self, StoreError> {
        let api_url = Url::parse(DEFAULT_API_URL).map_err(|e| StoreError::Transport {
            endpoint: "client_init".into(),
            reason: format!("invalid default API URL: {e}"),
        })?;
        Ok(Self::new(api_url))
    }
}

/// Response to `/add`. Kubo reports the address as `Hash`; gateways in
/// front of other stores commonly use `address` or `cid`.
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(alias = "Hash", alias = "cid")]
    address: String,
}

#[derive(Debug, Deserialize)]
struct KuboErrorBody {
    #[serde(rename = "Message")]
    message: String,
}

/// Client for an IPFS node's HTTP RPC API.
#[derive(Debug, Clone)]
pub struct IpfsStoreClient {
    http: reqwest::Client,
    config: IpfsStoreConfig,
}

impl IpfsStoreClient {
    pub fn new(config: IpfsStoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Transport {
                endpoint: "client_init".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &IpfsStoreConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_url.as_str().trim_end_matches('/'))
    }

    /// Release the node's pin on `address`.
    ///
    /// Calls `POST {api}/pin/rm?arg={address}`. Unpinned content stays
    /// retrievable until the node garbage-collects it.
    pub async fn unpin(&self, address: &ContentAddress) -> Result<(), StoreError> {
        let endpoint = "POST /pin/rm";
        let resp = self
            .http
            .post(self.url("pin/rm"))
            .query(&[("arg", address.as_str())])
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;

        if !resp.status().is_success() {
            return Err(classify_failure(endpoint, Some(address), resp).await);
        }
        tracing::debug!(%address, "unpinned content");
        Ok(())
    }
}

#[async_trait]
impl ContentStore for IpfsStoreClient {
    /// Calls `POST {api}/add?pin={pin}` with the blob as a multipart file.
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentAddress, StoreError> {
        let endpoint = "POST /add";
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("data.json")
            .mime_str("application/json")
            .map_err(|e| transport(endpoint, e))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(self.url("add"))
            .query(&[("pin", self.config.pin)])
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;

        if !resp.status().is_success() {
            return Err(classify_failure(endpoint, None, resp).await);
        }

        let body: AddResponse = resp.json().await.map_err(|e| StoreError::Transport {
            endpoint: endpoint.into(),
            reason: format!("invalid add response: {e}"),
        })?;
        let address = ContentAddress::new(body.address).map_err(|e| StoreError::Transport {
            endpoint: endpoint.into(),
            reason: format!("store returned an unusable address: {e}"),
        })?;

        tracing::debug!(%address, size, pinned = self.config.pin, "uploaded content");
        Ok(address)
    }

    /// Calls `POST {api}/cat?arg={address}`.
    async fn get(&self, address: &ContentAddress) -> Result<Vec<u8>, StoreError> {
        let endpoint = "POST /cat";
        let resp = self
            .http
            .post(self.url("cat"))
            .query(&[("arg", address.as_str())])
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;

        if !resp.status().is_success() {
            return Err(classify_failure(endpoint, Some(address), resp).await);
        }

        let bytes = resp.bytes().await.map_err(|e| transport(endpoint, e))?;
        tracing::debug!(%address, size = bytes.len(), "fetched content");
        Ok(bytes.to_vec())
    }
}

fn transport(endpoint: &str, e: reqwest::Error) -> StoreError {
    let reason = if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        e.to_string()
    };
    StoreError::Transport {
        endpoint: endpoint.into(),
        reason,
    }
}

/// Map a non-2xx response to `NotFound` or `Transport`.
async fn classify_failure(
    endpoint: &str,
    address: Option<&ContentAddress>,
    resp: reqwest::Response,
) -> StoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<KuboErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.clone());

    if let Some(address) = address {
        let lowered = message.to_lowercase();
        let unknown_path = status == reqwest::StatusCode::INTERNAL_SERVER_ERROR
            && NOT_FOUND_MARKERS.iter().any(|m| lowered.contains(m));
        if status == reqwest::StatusCode::NOT_FOUND || unknown_path {
            return StoreError::NotFound {
                endpoint: endpoint.into(),
                address: address.clone(),
            };
        }
    }

    StoreError::Transport {
        endpoint: endpoint.into(),
        reason: format!("HTTP {}: {message}", status.as_u16()),
    }
}
