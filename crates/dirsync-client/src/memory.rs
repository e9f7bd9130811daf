//! In-memory content store and anchor.
//!
//! Both keep their state in process memory and count every call, which makes
//! them the fixtures of choice for exercising the sync engine: tests can
//! assert not only on results but on how many network round-trips a path
//! would have cost. Failure injection covers the error paths that are hard
//! to provoke against a real node.
//!
//! ## Warning
//!
//! Nothing here is durable or shared between processes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use dirsync_core::{ContentAddress, CoreError};

use crate::anchor::{AnchorCredentials, TransactionReceipt, VersionAnchor};
use crate::error::{AnchorError, StoreError};
use crate::store::ContentStore;

/// Address the in-memory store assigns to `bytes`: `sha256-<hex digest>`.
pub fn address_for(bytes: &[u8]) -> Result<ContentAddress, CoreError> {
    ContentAddress::new(format!("sha256-{}", hex::encode(Sha256::digest(bytes))))
}

/// A content store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    blobs: Mutex<HashMap<ContentAddress, Vec<u8>>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    fail_next_get: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls so far, including failed ones.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn contains(&self, address: &ContentAddress) -> bool {
        self.blobs.lock().contains_key(address)
    }

    /// Place arbitrary bytes under an arbitrary address, bypassing content
    /// addressing and the call counters. Used to stage corrupt content.
    pub fn insert_at(&self, address: ContentAddress, bytes: Vec<u8>) {
        self.blobs.lock().insert(address, bytes);
    }

    /// Make the next `get` fail with a transport error.
    pub fn fail_next_get(&self) {
        self.fail_next_get.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentAddress, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let address = address_for(&bytes).map_err(|e| StoreError::Transport {
            endpoint: "memory put".into(),
            reason: e.to_string(),
        })?;
        self.blobs.lock().entry(address.clone()).or_insert(bytes);
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Vec<u8>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_get.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transport {
                endpoint: "memory get".into(),
                reason: "injected transport failure".into(),
            });
        }
        self.blobs
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                endpoint: "memory get".into(),
                address: address.clone(),
            })
    }
}

/// Injected outcome for the next proposal to a [`MemoryAnchor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalFailure {
    Reject,
    Timeout,
}

/// A single-register anchor held in memory.
///
/// Blocks are numbered from 1 and advance by one per accepted proposal.
#[derive(Debug)]
pub struct MemoryAnchor {
    chain_id: String,
    root: Mutex<Option<ContentAddress>>,
    next_block: AtomicU64,
    reads: AtomicUsize,
    proposals: AtomicUsize,
    next_failure: Mutex<Option<ProposalFailure>>,
}

impl Default for MemoryAnchor {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryAnchor {
    /// An anchor with nothing published.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            root: Mutex::new(None),
            next_block: AtomicU64::new(1),
            reads: AtomicUsize::new(0),
            proposals: AtomicUsize::new(0),
            next_failure: Mutex::new(None),
        }
    }

    /// The current root, without counting a read.
    pub fn root(&self) -> Option<ContentAddress> {
        self.root.lock().clone()
    }

    /// Overwrite the root directly, as another writer would.
    pub fn set_root(&self, root: Option<ContentAddress>) {
        *self.root.lock() = root;
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of proposals received, including failed ones.
    pub fn proposal_count(&self) -> usize {
        self.proposals.load(Ordering::SeqCst)
    }

    /// Make the next proposal fail without touching the root.
    pub fn fail_next_proposal(&self, failure: ProposalFailure) {
        *self.next_failure.lock() = Some(failure);
    }
}

#[async_trait]
impl VersionAnchor for MemoryAnchor {
    async fn read_root(&self) -> Result<Option<ContentAddress>, AnchorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.root())
    }

    async fn propose_root(
        &self,
        root: &ContentAddress,
        _credentials: &AnchorCredentials,
    ) -> Result<TransactionReceipt, AnchorError> {
        let attempt = self.proposals.fetch_add(1, Ordering::SeqCst) + 1;
        let transaction_id = format!("memory-tx-{attempt}");

        match self.next_failure.lock().take() {
            Some(ProposalFailure::Reject) => {
                return Err(AnchorError::Rejected {
                    chain: self.chain_id.clone(),
                    reason: "nonce too low".into(),
                })
            }
            Some(ProposalFailure::Timeout) => {
                return Err(AnchorError::Timeout {
                    chain: self.chain_id.clone(),
                    transaction_id,
                    waited_secs: 0,
                })
            }
            None => {}
        }

        let block_number = self.next_block.fetch_add(1, Ordering::SeqCst);
        *self.root.lock() = Some(root.clone());

        Ok(TransactionReceipt {
            chain_id: self.chain_id.clone(),
            transaction_id,
            block_number,
            root: root.clone(),
        })
    }

    fn chain_id(&self) -> &str {
        &self.chain_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> AnchorCredentials {
        AnchorCredentials::managed("0x0000000000000000000000000000000000000001")
    }

    #[tokio::test]
    async fn put_is_idempotent_by_content() {
        let store = MemoryContentStore::new();
        let a = store.put(b"same".to_vec()).await.unwrap();
        let b = store.put(b"same".to_vec()).await.unwrap();
        let c = store.put(b"different".to_vec()).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.put_count(), 3);
        assert!(a.as_str().starts_with("sha256-"));
    }

    #[tokio::test]
    async fn get_returns_bytes_or_not_found() {
        let store = MemoryContentStore::new();
        let addr = store.put(b"payload".to_vec()).await.unwrap();
        assert_eq!(store.get(&addr).await.unwrap(), b"payload");

        let missing = ContentAddress::new("QmMissing").unwrap();
        assert!(matches!(
            store.get(&missing).await,
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(store.get_count(), 2);
    }

    #[tokio::test]
    async fn injected_get_failure_fires_once() {
        let store = MemoryContentStore::new();
        let addr = store.put(b"x".to_vec()).await.unwrap();
        store.fail_next_get();
        assert!(matches!(store.get(&addr).await, Err(StoreError::Transport { .. })));
        assert!(store.get(&addr).await.is_ok());
    }

    #[tokio::test]
    async fn anchor_starts_empty_and_records_proposals() {
        let anchor = MemoryAnchor::new("memory-test");
        assert_eq!(anchor.read_root().await.unwrap(), None);

        let root = ContentAddress::new("QmOne").unwrap();
        let receipt = anchor.propose_root(&root, &creds()).await.unwrap();
        assert_eq!(receipt.block_number, 1);
        assert_eq!(receipt.root, root);
        assert_eq!(receipt.chain_id, "memory-test");
        assert_eq!(anchor.read_root().await.unwrap(), Some(root));
        assert_eq!(anchor.read_count(), 2);
        assert_eq!(anchor.proposal_count(), 1);
    }

    #[tokio::test]
    async fn injected_proposal_failures_leave_root_untouched() {
        let anchor = MemoryAnchor::default();
        let first = ContentAddress::new("QmFirst").unwrap();
        anchor.propose_root(&first, &creds()).await.unwrap();

        let second = ContentAddress::new("QmSecond").unwrap();
        anchor.fail_next_proposal(ProposalFailure::Reject);
        assert!(matches!(
            anchor.propose_root(&second, &creds()).await,
            Err(AnchorError::Rejected { .. })
        ));
        anchor.fail_next_proposal(ProposalFailure::Timeout);
        assert!(matches!(
            anchor.propose_root(&second, &creds()).await,
            Err(AnchorError::Timeout { .. })
        ));
        assert_eq!(anchor.root(), Some(first));

        let receipt = anchor.propose_root(&second, &creds()).await.unwrap();
        assert_eq!(receipt.block_number, 2);
        assert_eq!(anchor.root(), Some(second));
    }
}
