//! The content store interface.

use async_trait::async_trait;
use dirsync_core::ContentAddress;

use crate::error::StoreError;

/// A content-addressed blob store.
///
/// Implementations keep no local state. Idempotence of `put` is a property
/// of the store: identical bytes always come back with the same address.
#[async_trait]
pub trait ContentStore: Send + Sync + std::fmt::Debug {
    /// Upload a blob and return its content address.
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentAddress, StoreError>;

    /// Fetch the blob stored under `address`.
    ///
    /// Fails with [`StoreError::NotFound`] when the store does not know the
    /// address and [`StoreError::Transport`] on any network or protocol failure.
    async fn get(&self, address: &ContentAddress) -> Result<Vec<u8>, StoreError>;
}
