//! # EVM JSON-RPC Anchor
//!
//! Reads and writes the root CID held by the registry contract on an
//! EVM-compatible chain (a local Hardhat node, a testnet, or mainnet).
//!
//! ## How It Works
//!
//! 1. `read_root` calls `getRootCID()` through `eth_call` against the latest
//!    block and ABI-decodes the returned string. The empty string means no
//!    root has been published.
//! 2. `propose_root` builds a `setRootCID(string)` transaction with the
//!    configured gas limit, gas price and chain id. Node-managed accounts hand
//!    it to the node for signing (`personal_sendTransaction` with a
//!    passphrase, `eth_sendTransaction` without). A local key fetches the
//!    pending nonce, signs an EIP-155 legacy transaction in process and
//!    submits it with `eth_sendRawTransaction`.
//! 3. It then polls `eth_getTransactionReceipt` until the transaction is
//!    included or the confirmation window closes.
//!
//! ## Security
//!
//! - A local private key stays in zeroizing memory and never leaves the
//!   process; only the signed transaction is sent.
//! - Gas parameters are fixed by configuration; there is no fee estimation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;

use dirsync_core::ContentAddress;

use super::abi;
use super::signer::{self, LegacyTransaction, LocalSigner};
use super::{AnchorCredentials, TransactionReceipt, VersionAnchor};
use crate::error::AnchorError;

/// Gas limit used for `setRootCID` unless configured otherwise.
pub const DEFAULT_GAS_LIMIT: u64 = 3_000_000;
/// Gas price (10 gwei) used unless configured otherwise.
pub const DEFAULT_GAS_PRICE_WEI: u128 = 10_000_000_000;
/// Chain id of a local Hardhat node.
pub const HARDHAT_CHAIN_ID: u64 = 31337;

/// Configuration for the EVM anchor client.
#[derive(Debug, Clone)]
pub struct EvmAnchorConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,
    /// Registry contract address (0x-prefixed, 40 hex chars).
    pub contract_address: String,
    /// Human-readable chain name used in errors and receipts.
    pub chain_name: String,
    /// EVM chain id, included in every transaction.
    pub chain_id: u64,
    /// Gas limit for `setRootCID`.
    pub gas_limit: u64,
    /// Gas price in wei.
    pub gas_price_wei: u128,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// How long to wait for a submitted transaction to be included.
    pub confirmation_timeout_secs: u64,
    /// Delay between receipt polls.
    pub poll_interval_ms: u64,
}

impl EvmAnchorConfig {
    /// Defaults: 3,000,000 gas at 10 gwei, 30s request timeout, 120s
    /// confirmation window polled every 500ms.
    pub fn new(rpc_url: impl Into<String>, contract_address: impl Into<String>, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address: contract_address.into(),
            chain_name: format!("evm-{chain_id}"),
            chain_id,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price_wei: DEFAULT_GAS_PRICE_WEI,
            timeout_secs: 30,
            confirmation_timeout_secs: 120,
            poll_interval_ms: 500,
        }
    }

    pub fn with_chain_name(mut self, chain_name: impl Into<String>) -> Self {
        self.chain_name = chain_name.into();
        self
    }

    /// Set the fixed gas parameters.
    pub fn with_gas(mut self, gas_limit: u64, gas_price_wei: u128) -> Self {
        self.gas_limit = gas_limit;
        self.gas_price_wei = gas_price_wei;
        self
    }

    /// Set the confirmation window and receipt poll interval.
    pub fn with_confirmation(mut self, timeout_secs: u64, poll_interval_ms: u64) -> Self {
        self.confirmation_timeout_secs = timeout_secs;
        self.poll_interval_ms = poll_interval_ms;
        self
    }
}

/// The descriptor the registry deploy script writes next to the contract:
/// `{"address": "0x…", "abi": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentDescriptor {
    pub address: String,
    #[serde(default)]
    pub abi: serde_json::Value,
}

impl DeploymentDescriptor {
    pub fn from_json(json: &str) -> Result<Self, AnchorError> {
        let descriptor: Self = serde_json::from_str(json)
            .map_err(|e| AnchorError::InvalidConfig(format!("invalid deployment descriptor: {e}")))?;
        if !is_valid_eth_address(&descriptor.address) {
            return Err(AnchorError::InvalidConfig(format!(
                "deployment descriptor has invalid contract address: {}",
                descriptor.address
            )));
        }
        Ok(descriptor)
    }
}

/// JSON-RPC client for the root-CID registry contract.
#[derive(Debug)]
pub struct EvmAnchorClient {
    client: reqwest::Client,
    config: EvmAnchorConfig,
    next_id: AtomicU64,
}

impl EvmAnchorClient {
    pub fn new(config: EvmAnchorConfig) -> Result<Self, AnchorError> {
        if !is_valid_eth_address(&config.contract_address) {
            return Err(AnchorError::InvalidConfig(format!(
                "invalid contract address: {}",
                config.contract_address
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnchorError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &EvmAnchorConfig {
        &self.config
    }

    /// Read the registry owner via `getOwner()`.
    pub async fn owner(&self) -> Result<String, AnchorError> {
        let data = self.eth_call(abi::encode_call(abi::GET_OWNER_SELECTOR)).await?;
        abi::decode_address(&data).map_err(|e| self.invalid(format!("getOwner(): {e}")))
    }

    fn unavailable(&self, reason: impl Into<String>) -> AnchorError {
        AnchorError::Unavailable {
            chain: self.config.chain_name.clone(),
            reason: reason.into(),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> AnchorError {
        AnchorError::InvalidResponse {
            chain: self.config.chain_name.clone(),
            reason: reason.into(),
        }
    }

    /// Send a JSON-RPC request and return the result field.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AnchorError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        tracing::trace!(method, id, "anchor RPC call");

        let resp = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.unavailable(format!("{method}: request timed out"))
                } else {
                    self.unavailable(format!("{method}: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            return Err(self.unavailable(format!("{method}: HTTP {}", resp.status())));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| self.invalid(format!("{method}: invalid JSON response: {e}")))?;

        if let Some(error) = json.get("error") {
            return Err(AnchorError::Rpc {
                chain: self.config.chain_name.clone(),
                code: error.get("code").and_then(|c| c.as_i64()).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown RPC error")
                    .to_string(),
            });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| self.invalid(format!("{method}: response missing 'result' field")))
    }

    /// `eth_call` against the registry at the latest block.
    async fn eth_call(&self, data: String) -> Result<String, AnchorError> {
        let call = serde_json::json!({
            "to": self.config.contract_address,
            "data": data,
        });
        let result = self
            .rpc_call("eth_call", serde_json::json!([call, "latest"]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid("eth_call returned a non-string result"))
    }

    /// Submit the `setRootCID` transaction and return its hash.
    async fn send_root_tx(
        &self,
        root: &ContentAddress,
        credentials: &AnchorCredentials,
    ) -> Result<String, AnchorError> {
        let data = abi::encode_string_call(abi::SET_ROOT_CID_SELECTOR, root.as_str());

        let submitted = match credentials {
            AnchorCredentials::Managed { from_address, passphrase } => {
                let tx = serde_json::json!({
                    "from": from_address,
                    "to": self.config.contract_address,
                    "data": data,
                    "gas": abi::to_quantity(u128::from(self.config.gas_limit)),
                    "gasPrice": abi::to_quantity(self.config.gas_price_wei),
                    "chainId": abi::to_quantity(u128::from(self.config.chain_id)),
                });
                match passphrase {
                    Some(passphrase) => {
                        let params = serde_json::json!([tx, passphrase.as_str()]);
                        self.rpc_call("personal_sendTransaction", params).await
                    }
                    None => self.rpc_call("eth_sendTransaction", serde_json::json!([tx])).await,
                }
            }
            AnchorCredentials::LocalKey(signer) => {
                let raw = self.sign_locally(signer, &data).await?;
                let params = serde_json::json!([format!("0x{}", hex::encode(raw))]);
                self.rpc_call("eth_sendRawTransaction", params).await
            }
        };

        let result = submitted.map_err(|e| match e {
            AnchorError::Rpc { chain, message, .. } => AnchorError::Rejected {
                chain,
                reason: message,
            },
            other => other,
        })?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid("send transaction returned a non-string result"))
    }

    /// Build and sign a legacy EIP-155 transaction for `data`, using the
    /// signer's pending nonce.
    async fn sign_locally(&self, signer: &LocalSigner, data: &str) -> Result<Vec<u8>, AnchorError> {
        let count = self
            .rpc_call(
                "eth_getTransactionCount",
                serde_json::json!([signer.address(), "pending"]),
            )
            .await?;
        let nonce = count
            .as_str()
            .and_then(abi::parse_quantity)
            .ok_or_else(|| self.invalid("eth_getTransactionCount returned an invalid nonce"))?;

        let tx = LegacyTransaction {
            nonce,
            gas_price: self.config.gas_price_wei,
            gas_limit: self.config.gas_limit,
            to: signer::parse_address(&self.config.contract_address)?,
            value: 0,
            data: hex::decode(data.trim_start_matches("0x"))
                .map_err(|e| AnchorError::InvalidConfig(format!("calldata is not hex: {e}")))?,
            chain_id: self.config.chain_id,
        };
        tracing::debug!(from = signer.address(), nonce, "signing setRootCID locally");
        signer.sign(&tx)
    }

    /// Poll for the receipt of `tx_hash` until it appears or the
    /// confirmation window closes. Returns the inclusion block.
    async fn wait_for_inclusion(&self, tx_hash: &str) -> Result<u64, AnchorError> {
        let window = Duration::from_secs(self.config.confirmation_timeout_secs);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let deadline = Instant::now() + window;

        loop {
            let receipt = self
                .rpc_call("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                .await?;

            if !receipt.is_null() {
                let block = receipt
                    .get("blockNumber")
                    .and_then(|b| b.as_str())
                    .and_then(abi::parse_quantity)
                    .ok_or_else(|| self.invalid("receipt missing blockNumber"))?;
                let status = receipt.get("status").and_then(|s| s.as_str()).unwrap_or("0x1");
                if status == "0x0" {
                    return Err(AnchorError::Rejected {
                        chain: self.config.chain_name.clone(),
                        reason: format!("transaction {tx_hash} reverted in block {block}"),
                    });
                }
                return Ok(block);
            }

            if Instant::now() + poll > deadline {
                return Err(AnchorError::Timeout {
                    chain: self.config.chain_name.clone(),
                    transaction_id: tx_hash.to_string(),
                    waited_secs: self.config.confirmation_timeout_secs,
                });
            }
            tokio::time::sleep(poll).await;
        }
    }
}

#[async_trait]
impl VersionAnchor for EvmAnchorClient {
    async fn read_root(&self) -> Result<Option<ContentAddress>, AnchorError> {
        let data = self
            .eth_call(abi::encode_call(abi::GET_ROOT_CID_SELECTOR))
            .await?;
        let value =
            abi::decode_string(&data).map_err(|e| self.invalid(format!("getRootCID(): {e}")))?;
        ContentAddress::from_anchor_value(&value)
            .map_err(|e| self.invalid(format!("anchored root is not a content address: {e}")))
    }

    async fn propose_root(
        &self,
        root: &ContentAddress,
        credentials: &AnchorCredentials,
    ) -> Result<TransactionReceipt, AnchorError> {
        if !is_valid_eth_address(credentials.from_address()) {
            return Err(AnchorError::InvalidConfig(format!(
                "invalid from address: {}",
                credentials.from_address()
            )));
        }

        let tx_hash = self.send_root_tx(root, credentials).await?;
        tracing::info!(chain = %self.config.chain_name, tx = %tx_hash, %root, "submitted setRootCID");

        let block_number = self.wait_for_inclusion(&tx_hash).await?;
        tracing::info!(chain = %self.config.chain_name, tx = %tx_hash, block_number, "setRootCID included");

        Ok(TransactionReceipt {
            chain_id: self.config.chain_name.clone(),
            transaction_id: tx_hash,
            block_number,
            root: root.clone(),
        })
    }

    fn chain_id(&self) -> &str {
        &self.config.chain_name
    }
}

/// Validate that a string is a well-formed Ethereum address (0x + 40 hex chars).
pub fn is_valid_eth_address(addr: &str) -> bool {
    addr.len() == 42
        && addr.starts_with("0x")
        && addr[2..].chars().all(|c| c.is_ascii_hexdigit())
}
