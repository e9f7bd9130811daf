//! The collaborators a [`SyncEngine`](crate::SyncEngine) works with,
//! constructed once by the caller and handed over explicitly.

use std::sync::Arc;

use dirsync_client::{AnchorCredentials, ContentStore, VersionAnchor};

use crate::assembler::DirectoryAssembler;
use crate::cache::SnapshotCache;

#[derive(Debug, Clone)]
pub struct SyncContext {
    pub store: Arc<dyn ContentStore>,
    pub anchor: Arc<dyn VersionAnchor>,
    pub cache: Arc<SnapshotCache>,
    /// Signing identity for publishes. Read-only engines leave this unset.
    pub credentials: Option<AnchorCredentials>,
    /// Source of fresh directories for `UpdateFromHub`.
    pub assembler: Option<Arc<dyn DirectoryAssembler>>,
}

impl SyncContext {
    pub fn new(
        store: Arc<dyn ContentStore>,
        anchor: Arc<dyn VersionAnchor>,
        cache: SnapshotCache,
    ) -> Self {
        Self {
            store,
            anchor,
            cache: Arc::new(cache),
            credentials: None,
            assembler: None,
        }
    }

    pub fn with_credentials(mut self, credentials: AnchorCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_assembler(mut self, assembler: Arc<dyn DirectoryAssembler>) -> Self {
        self.assembler = Some(assembler);
        self
    }
}
