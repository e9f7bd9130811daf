//! Wiring a [`SyncEngine`] from a [`NodeConfig`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use dirsync_client::{EvmAnchorClient, IpfsStoreClient};
use dirsync_engine::{JsonFileAssembler, SnapshotCache, SyncContext, SyncEngine};

use crate::config::NodeConfig;

/// A connected node: the engine plus the concrete anchor client, kept for
/// the registry calls the engine does not expose (`owner`).
pub struct Node {
    pub engine: SyncEngine,
    pub anchor: Arc<EvmAnchorClient>,
}

impl Node {
    /// Build the IPFS store, the EVM anchor and the cache described by
    /// `config`. `assembler` is the directory export `update_from_hub`
    /// publishes from, if any.
    pub async fn connect(
        config: &NodeConfig,
        assembler: Option<PathBuf>,
    ) -> Result<Self> {
        let store = IpfsStoreClient::new(config.store_config())
            .context("failed to create IPFS store client")?;
        let anchor = Arc::new(
            EvmAnchorClient::new(config.anchor_config()?)
                .context("failed to create registry anchor client")?,
        );
        let cache = SnapshotCache::open(config.cache_dir.clone())
            .await
            .with_context(|| format!("failed to open cache at {}", config.cache_dir.display()))?;

        let mut ctx = SyncContext::new(Arc::new(store), anchor.clone(), cache);
        if let Some(credentials) = config.credentials()? {
            ctx = ctx.with_credentials(credentials);
        }
        if let Some(path) = assembler {
            ctx = ctx.with_assembler(Arc::new(JsonFileAssembler::new(path)));
        }

        tracing::debug!(
            rpc = %config.eth_node_url,
            ipfs = %config.ipfs_api_url,
            cache = %config.cache_dir.display(),
            "node connected"
        );

        Ok(Self {
            engine: SyncEngine::new(ctx),
            anchor,
        })
    }
}
