//! # Sync Engine
//!
//! Keeps a local copy of the directory version the anchor currently points
//! at, and publishes new versions.
//!
//! ## States
//!
//! ```text
//!                 check_staleness                resolve_stale
//!   Unknown ───────────────────────▶ Stale(R) ─────────────────▶ Synced(R)
//!      ▲        anchor holds R,         ▲                           │
//!      │        no cache entry          │   anchor moved to R',     │
//!      │                                └── no entry for R' ────────┘
//!      └── anchor empty
//! ```
//!
//! `check_staleness` is cheap: one anchor read and one cache lookup, never a
//! content store fetch. Only `resolve_stale` fetches, and only when the
//! cache does not already hold the root.
//!
//! ## Concurrency
//!
//! - Concurrent resolutions are coalesced behind one async gate. A caller
//!   that waited re-checks the cache and skips the fetch.
//! - Publishes run one at a time per engine, so a single signing identity
//!   never races itself at the anchor.
//! - The state cell sits behind a `parking_lot` mutex that is never held
//!   across an `.await`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use dirsync_client::TransactionReceipt;
use dirsync_core::{CollectionName, ContentAddress, CoreError, Directory, Record, Snapshot};

use crate::assembler::DirectoryAssembler;
use crate::context::SyncContext;
use crate::error::{CacheError, SyncError};
use crate::op::{KbOperation, KbResponse};

/// What the engine last observed about the anchored root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "root", rename_all = "snake_case")]
pub enum SyncState {
    /// No local copy of the current root; either nothing is published or the
    /// anchor has not been read yet.
    Unknown,
    /// The cache holds the directory for this root, the anchor's current one.
    Synced(ContentAddress),
    /// The anchor points at this root and the cache has no entry for it.
    Stale(ContentAddress),
}

impl SyncState {
    pub fn root(&self) -> Option<&ContentAddress> {
        match self {
            Self::Unknown => None,
            Self::Synced(root) | Self::Stale(root) => Some(root),
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced(_))
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Synced(root) => write!(f, "synced at {root}"),
            Self::Stale(root) => write!(f, "stale, anchor at {root}"),
        }
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Content address the directory was stored under and anchored at.
    pub address: ContentAddress,
    pub receipt: TransactionReceipt,
    pub published_at: DateTime<Utc>,
}

/// Result of [`SyncEngine::refresh_from`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The anchored directory already equals the assembled one.
    UpToDate { address: ContentAddress },
    Published(PublishReceipt),
}

#[derive(Debug)]
struct Cell {
    state: SyncState,
    /// Parsed directory for the synced root, kept to spare a cache read.
    snapshot: Option<Snapshot>,
}

/// Orchestrates the anchor, the content store and the local cache.
#[derive(Debug)]
pub struct SyncEngine {
    ctx: SyncContext,
    cell: Mutex<Cell>,
    resolve_gate: tokio::sync::Mutex<()>,
    publish_gate: tokio::sync::Mutex<()>,
}

impl SyncEngine {
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            cell: Mutex::new(Cell {
                state: SyncState::Unknown,
                snapshot: None,
            }),
            resolve_gate: tokio::sync::Mutex::new(()),
            publish_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// The last observed state. Does not touch the anchor.
    pub fn state(&self) -> SyncState {
        self.cell.lock().state.clone()
    }

    fn set_state(&self, state: SyncState) {
        let mut cell = self.cell.lock();
        if cell.state != state {
            tracing::info!(from = %cell.state, to = %state, "sync state changed");
        }
        if cell.snapshot.as_ref().map(Snapshot::address) != state.root() {
            cell.snapshot = None;
        }
        cell.state = state;
    }

    /// Move `Stale(root)` to `Synced(root)`. A state that has moved on to a
    /// different root in the meantime is left alone.
    fn mark_synced(&self, root: &ContentAddress, snapshot: Option<Snapshot>) {
        let mut cell = self.cell.lock();
        if cell.state.root() != Some(root) {
            return;
        }
        if !cell.state.is_synced() {
            tracing::info!(%root, "sync state changed to synced");
        }
        cell.state = SyncState::Synced(root.clone());
        if snapshot.is_some() {
            cell.snapshot = snapshot;
        }
    }

    /// Read the anchored root and compare it with the cache.
    ///
    /// Performs one anchor read and one cache lookup. Never fetches from the
    /// content store.
    pub async fn check_staleness(&self) -> Result<SyncState, SyncError> {
        let root = self
            .ctx
            .anchor
            .read_root()
            .await
            .map_err(SyncError::AnchorRead)?;

        let state = match root {
            None => SyncState::Unknown,
            Some(root) if self.ctx.cache.has(&root).await => {
                tracing::debug!(%root, "anchored root is cached");
                SyncState::Synced(root)
            }
            Some(root) => SyncState::Stale(root),
        };
        self.set_state(state.clone());
        Ok(state)
    }

    /// Fetch the anchored root into the cache.
    ///
    /// From `Stale(R)`: fetch R, parse it, cache it, become `Synced(R)`. If
    /// another caller cached R first, no fetch happens. From `Synced(R)` this
    /// is a no-op. From `Unknown` it fails with [`SyncError::NoData`]. On
    /// failure the engine stays `Stale(R)`.
    pub async fn resolve_stale(&self) -> Result<ContentAddress, SyncError> {
        self.resolve().await.map(|snapshot| snapshot.address().clone())
    }

    async fn resolve(&self) -> Result<Snapshot, SyncError> {
        match self.state() {
            SyncState::Unknown => Err(SyncError::NoData),
            SyncState::Synced(root) => self.load_synced(&root).await,
            SyncState::Stale(root) => self.fetch_into_cache(&root).await,
        }
    }

    /// The `Stale(root)` → `Synced(root)` transition, coalesced behind the
    /// resolve gate.
    async fn fetch_into_cache(&self, root: &ContentAddress) -> Result<Snapshot, SyncError> {
        let _gate = self.resolve_gate.lock().await;

        if self.ctx.cache.has(root).await {
            tracing::debug!(%root, "root cached by a concurrent resolution");
            let snapshot = Snapshot::new(root.clone(), self.ctx.cache.load(root).await?);
            self.mark_synced(root, Some(snapshot.clone()));
            return Ok(snapshot);
        }

        let bytes = self
            .ctx
            .store
            .get(root)
            .await
            .map_err(|source| SyncError::Fetch {
                root: root.clone(),
                source,
            })?;
        let directory = Directory::from_slice(&bytes).map_err(|source| SyncError::CorruptEntry {
            root: root.clone(),
            source,
        })?;
        self.ctx.cache.store(root, &directory).await?;

        tracing::info!(%root, records = directory.record_count(), "fetched anchored directory");
        let snapshot = Snapshot::new(root.clone(), directory);
        self.mark_synced(root, Some(snapshot.clone()));
        Ok(snapshot)
    }

    async fn load_synced(&self, root: &ContentAddress) -> Result<Snapshot, SyncError> {
        let memo = self.cell.lock().snapshot.clone();
        if let Some(snapshot) = memo.filter(|s| s.address() == root) {
            return Ok(snapshot);
        }
        let directory = match self.ctx.cache.load(root).await {
            Ok(directory) => directory,
            Err(CacheError::Missing { .. }) => {
                // Entry removed behind our back.
                self.set_state(SyncState::Stale(root.clone()));
                return self.fetch_into_cache(root).await;
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot = Snapshot::new(root.clone(), directory);
        let mut cell = self.cell.lock();
        if cell.state.root() == Some(root) {
            cell.snapshot = Some(snapshot.clone());
        }
        Ok(snapshot)
    }

    /// Bring the engine to `Synced` at the current anchored root and return
    /// the snapshot.
    async fn ensure_synced(&self) -> Result<Snapshot, SyncError> {
        match self.check_staleness().await? {
            SyncState::Unknown => Err(SyncError::NoData),
            SyncState::Synced(_) | SyncState::Stale(_) => self.resolve().await,
        }
    }

    /// The whole anchored directory.
    pub async fn directory(&self) -> Result<Snapshot, SyncError> {
        self.ensure_synced().await
    }

    /// One collection of the anchored directory.
    pub async fn read(&self, name: CollectionName) -> Result<Vec<Record>, SyncError> {
        let snapshot = self.ensure_synced().await?;
        tracing::debug!(collection = %name, root = %snapshot.address(), "read collection");
        Ok(snapshot.collection(name).to_vec())
    }

    /// [`read`](Self::read) addressed by collection name. Unknown names fail
    /// with [`SyncError::UnknownCollection`] before the anchor is touched.
    pub async fn read_named(&self, name: &str) -> Result<Vec<Record>, SyncError> {
        let name = name
            .parse::<CollectionName>()
            .map_err(SyncError::UnknownCollection)?;
        self.read(name).await
    }

    /// Upload `directory`, cache it, and anchor its address.
    ///
    /// If the proposal fails the cache keeps the new entry (it is addressed
    /// by content, so it is harmless) and the anchor keeps its previous root.
    /// The whole operation is then safe to repeat.
    pub async fn publish(&self, directory: Directory) -> Result<PublishReceipt, SyncError> {
        let credentials = self
            .ctx
            .credentials
            .as_ref()
            .ok_or(SyncError::MissingCredentials)?;

        let _gate = self.publish_gate.lock().await;

        let bytes = directory
            .canonical_bytes()
            .map_err(SyncError::Serialization)?;
        let address = self
            .ctx
            .store
            .put(bytes.into_vec())
            .await
            .map_err(SyncError::Store)?;
        self.ctx.cache.store(&address, &directory).await?;

        let receipt = match self.ctx.anchor.propose_root(&address, credentials).await {
            Ok(receipt) => receipt,
            Err(source) => {
                tracing::warn!(root = %address, error = %source, "root proposal failed");
                return Err(SyncError::Propose {
                    root: address,
                    source,
                });
            }
        };

        tracing::info!(
            root = %address,
            chain = %receipt.chain_id,
            tx = %receipt.transaction_id,
            block = receipt.block_number,
            "published directory"
        );

        let snapshot = Snapshot::new(address.clone(), directory);
        {
            let mut cell = self.cell.lock();
            cell.state = SyncState::Synced(address.clone());
            cell.snapshot = Some(snapshot);
        }

        Ok(PublishReceipt {
            address,
            receipt,
            published_at: Utc::now(),
        })
    }

    /// [`publish`](Self::publish), then read the anchor back and fail with
    /// [`SyncError::VerificationFailed`] if it holds a different root. The
    /// state then follows the observed root as in
    /// [`check_staleness`](Self::check_staleness).
    pub async fn publish_and_verify(
        &self,
        directory: Directory,
    ) -> Result<PublishReceipt, SyncError> {
        let published = self.publish(directory).await?;
        let observed = self
            .ctx
            .anchor
            .read_root()
            .await
            .map_err(SyncError::AnchorRead)?;

        if observed.as_ref() != Some(&published.address) {
            tracing::warn!(
                expected = %published.address,
                observed = ?observed,
                "anchor does not hold the published root"
            );
            let state = match observed.clone() {
                None => SyncState::Unknown,
                Some(root) if self.ctx.cache.has(&root).await => SyncState::Synced(root),
                Some(root) => SyncState::Stale(root),
            };
            self.set_state(state);
            return Err(SyncError::VerificationFailed {
                expected: published.address,
                observed,
            });
        }
        Ok(published)
    }

    /// Assemble a fresh directory and publish it unless the anchored
    /// directory already equals it.
    pub async fn refresh_from(
        &self,
        assembler: &dyn DirectoryAssembler,
    ) -> Result<RefreshOutcome, SyncError> {
        let assembled = assembler.assemble().await.map_err(SyncError::Assemble)?;

        match self.ensure_synced().await {
            Ok(current) if current.directory() == &assembled => {
                tracing::info!(root = %current.address(), "directory already up to date");
                return Ok(RefreshOutcome::UpToDate {
                    address: current.address().clone(),
                });
            }
            Ok(_) | Err(SyncError::NoData) => {}
            Err(e) => return Err(e),
        }

        self.publish(assembled).await.map(RefreshOutcome::Published)
    }

    /// Run an operation and wrap its result in the response envelope.
    pub async fn run(&self, op: KbOperation) -> Result<KbResponse, SyncError> {
        tracing::info!(operation = %op, "running operation");
        match op {
            KbOperation::Init => {
                let state = self.check_staleness().await?;
                Ok(KbResponse::success(to_json(&state)?))
            }
            KbOperation::UpdateFromHub => {
                let assembler = self.ctx.assembler.clone().ok_or(SyncError::NoAssembler)?;
                let message = match self.refresh_from(assembler.as_ref()).await? {
                    RefreshOutcome::UpToDate { .. } => "Already up to date",
                    RefreshOutcome::Published(_) => "Successfully updated from Hub",
                };
                Ok(KbResponse::success(message))
            }
            KbOperation::GetDirectory => {
                let snapshot = self.directory().await?;
                Ok(KbResponse::success(to_json(snapshot.directory())?))
            }
            KbOperation::GetCollection(name) => {
                let records = self.read(name).await?;
                let message = serde_json::Value::Array(
                    records.into_iter().map(serde_json::Value::Object).collect(),
                );
                Ok(KbResponse::success(message))
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, SyncError> {
    serde_json::to_value(value).map_err(|e| SyncError::Serialization(CoreError::Serialization(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_with_tag() {
        let root = ContentAddress::new("QmRoot").unwrap();
        assert_eq!(
            serde_json::to_value(SyncState::Synced(root.clone())).unwrap(),
            serde_json::json!({ "state": "synced", "root": "QmRoot" })
        );
        assert_eq!(
            serde_json::to_value(SyncState::Unknown).unwrap(),
            serde_json::json!({ "state": "unknown" })
        );
        assert_eq!(SyncState::Stale(root.clone()).root(), Some(&root));
        assert!(SyncState::Synced(root).is_synced());
    }

    #[test]
    fn state_display() {
        let root = ContentAddress::new("QmRoot").unwrap();
        assert_eq!(SyncState::Unknown.to_string(), "unknown");
        assert_eq!(SyncState::Stale(root).to_string(), "stale, anchor at QmRoot");
    }
}
