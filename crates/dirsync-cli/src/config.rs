//! Node configuration: where the anchor chain, the registry contract, the
//! IPFS API and the local cache live, and who signs publishes.
//!
//! Loaded either from environment variables or from a YAML file passed with
//! `--config`. Both sources share the same defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use dirsync_client::anchor::evm::{DEFAULT_GAS_LIMIT, HARDHAT_CHAIN_ID};
use dirsync_client::ipfs::DEFAULT_API_URL;
use dirsync_client::{AnchorCredentials, DeploymentDescriptor, EvmAnchorConfig, IpfsStoreConfig};

const DEFAULT_ETH_NODE_URL: &str = "http://127.0.0.1:8545";
const DEFAULT_GAS_PRICE_GWEI: u64 = 10;
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CACHE_DIR: &str = "directories";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Everything needed to build a sync engine.
///
/// Custom `Debug` implementation redacts the passphrase and private key.
#[derive(Clone)]
pub struct NodeConfig {
    pub eth_node_url: Url,
    /// Registry contract address. Takes precedence over the deployment file.
    pub registry_address: Option<String>,
    /// Deployment descriptor written by the registry deploy script.
    pub registry_deployment_file: Option<PathBuf>,
    pub chain_id: u64,
    /// Signing account for publishes. Read-only nodes leave this unset.
    pub from_address: Option<String>,
    pub passphrase: Option<Zeroizing<String>>,
    /// Hex secp256k1 key for signing publishes in process, for RPC
    /// providers that do not manage accounts. Takes precedence over the
    /// passphrase.
    pub private_key: Option<Zeroizing<String>>,
    pub gas_limit: u64,
    pub gas_price_gwei: u64,
    pub confirmation_timeout_secs: u64,
    pub ipfs_api_url: Url,
    pub ipfs_pin: bool,
    pub cache_dir: PathBuf,
    /// Per-request timeout for both the anchor and the store.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConfig")
            .field("eth_node_url", &self.eth_node_url)
            .field("registry_address", &self.registry_address)
            .field("registry_deployment_file", &self.registry_deployment_file)
            .field("chain_id", &self.chain_id)
            .field("from_address", &self.from_address)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("gas_limit", &self.gas_limit)
            .field("gas_price_gwei", &self.gas_price_gwei)
            .field("confirmation_timeout_secs", &self.confirmation_timeout_secs)
            .field("ipfs_api_url", &self.ipfs_api_url)
            .field("ipfs_pin", &self.ipfs_pin)
            .field("cache_dir", &self.cache_dir)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// On-disk shape of the YAML configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    eth_node_url: Option<String>,
    registry_address: Option<String>,
    registry_deployment_file: Option<PathBuf>,
    chain_id: Option<u64>,
    from_address: Option<String>,
    passphrase: Option<String>,
    private_key: Option<String>,
    gas_limit: Option<u64>,
    gas_price_gwei: Option<u64>,
    confirmation_timeout_secs: Option<u64>,
    ipfs_api_url: Option<String>,
    ipfs_pin: Option<bool>,
    cache_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

impl NodeConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ETH_NODE_URL` (default: `http://127.0.0.1:8545`)
    /// - `REGISTRY_ADDRESS` or `REGISTRY_DEPLOYMENT_FILE`
    /// - `ETH_CHAIN_ID` (default: 31337)
    /// - `ETH_FROM`, `ETH_PASSPHRASE` (node-managed signing account)
    /// - `ETH_PK` (local signing key; `ETH_FROM` may be omitted)
    /// - `ETH_GAS_LIMIT` (default: 3000000)
    /// - `ETH_GAS_PRICE_GWEI` (default: 10)
    /// - `ETH_CONFIRMATION_TIMEOUT_SECS` (default: 120)
    /// - `IPFS_API_URL` (default: `http://127.0.0.1:5001/api/v0`)
    /// - `IPFS_PIN` (default: true)
    /// - `DIRSYNC_CACHE_DIR` (default: `directories`)
    /// - `DIRSYNC_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let number = |var: &str, default: u64| -> Result<u64, ConfigError> {
            match lookup(var) {
                None => Ok(default),
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: var.to_string(),
                    value: raw,
                }),
            }
        };

        let ipfs_pin = match lookup("IPFS_PIN") {
            None => true,
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "IPFS_PIN".into(),
                value: raw,
            })?,
        };

        Ok(Self {
            eth_node_url: parse_url("ETH_NODE_URL", lookup("ETH_NODE_URL"), DEFAULT_ETH_NODE_URL)?,
            registry_address: lookup("REGISTRY_ADDRESS").filter(|s| !s.is_empty()),
            registry_deployment_file: lookup("REGISTRY_DEPLOYMENT_FILE")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            chain_id: number("ETH_CHAIN_ID", HARDHAT_CHAIN_ID)?,
            from_address: lookup("ETH_FROM").filter(|s| !s.is_empty()),
            passphrase: lookup("ETH_PASSPHRASE").map(Zeroizing::new),
            private_key: lookup("ETH_PK").filter(|s| !s.is_empty()).map(Zeroizing::new),
            gas_limit: number("ETH_GAS_LIMIT", DEFAULT_GAS_LIMIT)?,
            gas_price_gwei: number("ETH_GAS_PRICE_GWEI", DEFAULT_GAS_PRICE_GWEI)?,
            confirmation_timeout_secs: number(
                "ETH_CONFIRMATION_TIMEOUT_SECS",
                DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            )?,
            ipfs_api_url: parse_url("IPFS_API_URL", lookup("IPFS_API_URL"), DEFAULT_API_URL)?,
            ipfs_pin,
            cache_dir: lookup("DIRSYNC_CACHE_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            timeout_secs: number("DIRSYNC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
        })
    }

    /// Load configuration from a YAML file. Relative paths inside the file
    /// are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let file: FileConfig = serde_yaml::from_str(&raw).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let relative_to_file = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        Ok(Self {
            eth_node_url: parse_url("eth_node_url", file.eth_node_url, DEFAULT_ETH_NODE_URL)?,
            registry_address: file.registry_address,
            registry_deployment_file: file.registry_deployment_file.map(relative_to_file),
            chain_id: file.chain_id.unwrap_or(HARDHAT_CHAIN_ID),
            from_address: file.from_address,
            passphrase: file.passphrase.map(Zeroizing::new),
            private_key: file.private_key.map(Zeroizing::new),
            gas_limit: file.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT),
            gas_price_gwei: file.gas_price_gwei.unwrap_or(DEFAULT_GAS_PRICE_GWEI),
            confirmation_timeout_secs: file
                .confirmation_timeout_secs
                .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            ipfs_api_url: parse_url("ipfs_api_url", file.ipfs_api_url, DEFAULT_API_URL)?,
            ipfs_pin: file.ipfs_pin.unwrap_or(true),
            cache_dir: relative_to_file(
                file.cache_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            ),
            timeout_secs: file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// `--config` if given, the environment otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    /// The registry contract address, from `registry_address` or the
    /// deployment descriptor.
    pub fn resolve_registry_address(&self) -> Result<String, ConfigError> {
        if let Some(address) = &self.registry_address {
            return Ok(address.clone());
        }
        let path = self
            .registry_deployment_file
            .as_ref()
            .ok_or(ConfigError::MissingRegistry)?;
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Deployment {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let descriptor = DeploymentDescriptor::from_json(&raw).map_err(|e| ConfigError::Deployment {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(descriptor.address)
    }

    pub fn anchor_config(&self) -> Result<EvmAnchorConfig, ConfigError> {
        let mut config = EvmAnchorConfig::new(
            self.eth_node_url.as_str(),
            self.resolve_registry_address()?,
            self.chain_id,
        )
        .with_gas(
            self.gas_limit,
            u128::from(self.gas_price_gwei) * WEI_PER_GWEI,
        );
        config.timeout_secs = self.timeout_secs;
        config.confirmation_timeout_secs = self.confirmation_timeout_secs;
        if self.chain_id == HARDHAT_CHAIN_ID {
            config = config.with_chain_name("hardhat");
        }
        Ok(config)
    }

    pub fn store_config(&self) -> IpfsStoreConfig {
        let mut config = IpfsStoreConfig::new(self.ipfs_api_url.clone());
        config.pin = self.ipfs_pin;
        config.timeout_secs = self.timeout_secs;
        config
    }

    /// Signing credentials, if a private key or a `from` address is
    /// configured. A private key wins; `from_address`, when also set, must
    /// name the account the key controls.
    pub fn credentials(&self) -> Result<Option<AnchorCredentials>, ConfigError> {
        if let Some(key) = &self.private_key {
            let credentials = AnchorCredentials::local_key(key)
                .map_err(|e| ConfigError::PrivateKey(e.to_string()))?;
            if let Some(from) = &self.from_address {
                if !from.eq_ignore_ascii_case(credentials.from_address()) {
                    return Err(ConfigError::SignerMismatch {
                        configured: from.clone(),
                        derived: credentials.from_address().to_string(),
                    });
                }
            }
            return Ok(Some(credentials));
        }

        let Some(from) = &self.from_address else {
            return Ok(None);
        };
        let mut credentials = AnchorCredentials::managed(from.clone());
        if let Some(passphrase) = &self.passphrase {
            credentials = credentials.with_passphrase(passphrase.as_str());
        }
        Ok(Some(credentials))
    }
}

fn parse_url(key: &str, raw: Option<String>, default: &str) -> Result<Url, ConfigError> {
    let raw = raw.filter(|s| !s.is_empty()).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(key.to_string(), e.to_string()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("no registry contract configured: set REGISTRY_ADDRESS or REGISTRY_DEPLOYMENT_FILE")]
    MissingRegistry,
    #[error("cannot use deployment descriptor {}: {reason}", path.display())]
    Deployment { path: PathBuf, reason: String },
    #[error("cannot load config file {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },
    #[error("invalid signing key: {0}")]
    PrivateKey(String),
    #[error("ETH_FROM {configured} does not match the signing key's address {derived}")]
    SignerMismatch { configured: String, derived: String },
}
