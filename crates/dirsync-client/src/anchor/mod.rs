//! # Version Anchor
//!
//! The trust anchor holds a single authoritative value: the content address
//! of the current directory snapshot. It is readable by anyone and writable
//! only through an authenticated state transition.
//!
//! ## Architecture
//!
//! The [`VersionAnchor`] trait is the whole interface the sync engine needs:
//! read the root, propose a new root. [`evm::EvmAnchorClient`] implements it
//! against a registry contract on an EVM chain;
//! [`MemoryAnchor`](crate::memory::MemoryAnchor) implements it in memory.
//!
//! ## Proposal Ordering
//!
//! Implementations do not coordinate nonces. Two concurrent proposals from
//! the same signing identity can collide, and one of them will come back as
//! [`AnchorError::Rejected`]. Callers serialize their own proposals.

pub mod abi;
pub mod evm;
pub mod signer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use dirsync_core::ContentAddress;

use crate::error::AnchorError;
pub use signer::LocalSigner;

/// Proof that a root transition was included by the anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// The chain the transition was recorded on.
    pub chain_id: String,
    /// Transaction identifier (hash) of the transition.
    pub transaction_id: String,
    /// Block that included the transition.
    pub block_number: u64,
    /// The root address carried by the transition.
    pub root: ContentAddress,
}

/// Credentials for proposing a root.
///
/// Secrets (the node passphrase, the local private key) are zeroized on drop
/// and redacted from `Debug` output.
#[derive(Clone)]
pub enum AnchorCredentials {
    /// An account the node signs for: unlocked, backed by the provider's key
    /// service, or unlocked per call with a passphrase.
    Managed {
        from_address: String,
        passphrase: Option<Zeroizing<String>>,
    },
    /// A private key held by this process. Transactions are signed locally
    /// and submitted raw.
    LocalKey(LocalSigner),
}

impl AnchorCredentials {
    /// Credentials for an account the node already manages.
    pub fn managed(from_address: impl Into<String>) -> Self {
        Self::Managed {
            from_address: from_address.into(),
            passphrase: None,
        }
    }

    /// Credentials for a hex secp256k1 private key.
    pub fn local_key(private_key: &str) -> Result<Self, AnchorError> {
        LocalSigner::from_hex(private_key).map(Self::LocalKey)
    }

    /// Attach the passphrase the node needs to sign for a managed account.
    /// Local keys ignore it.
    pub fn with_passphrase(self, passphrase: impl Into<String>) -> Self {
        match self {
            Self::Managed { from_address, .. } => Self::Managed {
                from_address,
                passphrase: Some(Zeroizing::new(passphrase.into())),
            },
            local => local,
        }
    }

    /// Account that signs and pays for the transition.
    pub fn from_address(&self) -> &str {
        match self {
            Self::Managed { from_address, .. } => from_address,
            Self::LocalKey(signer) => signer.address(),
        }
    }

    /// Passphrase unlocking a managed account on the node, if any.
    pub fn passphrase(&self) -> Option<&str> {
        match self {
            Self::Managed { passphrase, .. } => passphrase.as_deref().map(String::as_str),
            Self::LocalKey(_) => None,
        }
    }
}

impl std::fmt::Debug for AnchorCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Managed {
                from_address,
                passphrase,
            } => f
                .debug_struct("Managed")
                .field("from_address", from_address)
                .field("passphrase", &passphrase.as_ref().map(|_| "[REDACTED]"))
                .finish(),
            Self::LocalKey(signer) => f.debug_tuple("LocalKey").field(signer).finish(),
        }
    }
}

/// Read and propose the anchored root address.
#[async_trait]
pub trait VersionAnchor: Send + Sync + std::fmt::Debug {
    /// The currently anchored root. `None` means no version has been
    /// published yet.
    async fn read_root(&self) -> Result<Option<ContentAddress>, AnchorError>;

    /// Submit a signed transition setting the root to `root`, and wait for
    /// its inclusion.
    ///
    /// Fails with [`AnchorError::Rejected`] if the transition does not take
    /// effect and [`AnchorError::Timeout`] if inclusion is not observed within
    /// the implementation's bounded wait.
    async fn propose_root(
        &self,
        root: &ContentAddress,
        credentials: &AnchorCredentials,
    ) -> Result<TransactionReceipt, AnchorError>;

    /// Identifier of the chain or register backing this anchor.
    fn chain_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_passphrase() {
        let creds = AnchorCredentials::managed("0x0000000000000000000000000000000000000001")
            .with_passphrase("hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn managed_credentials_have_no_passphrase() {
        let creds = AnchorCredentials::managed("0xabc");
        assert!(creds.passphrase().is_none());
        assert_eq!(creds.from_address(), "0xabc");
        assert!(format!("{creds:?}").contains("None"));
    }

    #[test]
    fn local_key_credentials_use_derived_address() {
        let creds = AnchorCredentials::local_key(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap()
        .with_passphrase("ignored");
        assert_eq!(creds.from_address(), "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
        assert!(creds.passphrase().is_none());
        let debug = format!("{creds:?}");
        assert!(debug.starts_with("LocalKey"));
        assert!(!debug.contains("ac0974bec39a17e3"));
    }

    #[test]
    fn receipt_serializes_root_as_string() {
        let receipt = TransactionReceipt {
            chain_id: "hardhat".into(),
            transaction_id: "0x01".into(),
            block_number: 7,
            root: ContentAddress::new("QmRoot").unwrap(),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["root"], "QmRoot");
        assert_eq!(json["block_number"], 7);
    }
}
