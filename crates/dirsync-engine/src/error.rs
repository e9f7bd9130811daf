//! # Engine Error Types
//!
//! [`CacheError`] and [`AssembleError`] belong to the local collaborators;
//! [`SyncError`] is what every engine operation returns and wraps the client
//! errors with the root or address they concern.
//!
//! Messages describe only their own layer. The wrapped error is reachable
//! through `source()`, so `{:#}` on an `anyhow::Error` prints each cause once.

use std::path::PathBuf;

use dirsync_client::{AnchorError, StoreError};
use dirsync_core::{ContentAddress, CoreError};
use thiserror::Error;

/// Errors from the local snapshot cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure while touching the cache directory.
    #[error("cache {op} failed for {}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No entry is stored under the address.
    #[error("no cache entry for {address}")]
    Missing { address: ContentAddress },

    /// The entry exists but does not parse as a directory document.
    #[error("cache entry {address} is corrupt")]
    Corrupt {
        address: ContentAddress,
        #[source]
        source: CoreError,
    },

    /// The directory could not be serialized for writing.
    #[error("cache entry {address} could not be serialized")]
    Serialization {
        address: ContentAddress,
        #[source]
        source: CoreError,
    },
}

impl CacheError {
    /// Only I/O failures are worth repeating; a corrupt entry stays corrupt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Errors from a directory assembler.
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("failed to read directory source {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory source {} is malformed", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    /// The upstream registry the assembler draws from could not be reached.
    #[error("directory source unavailable: {0}")]
    Unavailable(String),
}

impl AssembleError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Unavailable(_))
    }
}

/// Errors from sync engine operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The anchor holds no root; nothing has been published yet.
    #[error("no directory has been published to the anchor yet")]
    NoData,

    #[error("failed to read the anchored root")]
    AnchorRead(#[source] AnchorError),

    /// The anchored root could not be fetched from the content store.
    #[error("failed to fetch root {root}")]
    Fetch {
        root: ContentAddress,
        #[source]
        source: StoreError,
    },

    /// The bytes stored under the anchored root are not a directory document.
    #[error("content under root {root} is not a valid directory")]
    CorruptEntry {
        root: ContentAddress,
        #[source]
        source: CoreError,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("failed to upload directory")]
    Store(#[source] StoreError),

    /// Proposing the new root failed; the anchor still holds its previous root.
    #[error("failed to anchor root {root}")]
    Propose {
        root: ContentAddress,
        #[source]
        source: AnchorError,
    },

    /// After a successful publish the anchor reports a different root.
    #[error("anchor holds {observed:?} after publishing {expected}")]
    VerificationFailed {
        expected: ContentAddress,
        observed: Option<ContentAddress>,
    },

    #[error(transparent)]
    UnknownCollection(CoreError),

    #[error("publishing requires signing credentials")]
    MissingCredentials,

    #[error("no directory assembler is configured")]
    NoAssembler,

    #[error("failed to assemble directory")]
    Assemble(#[source] AssembleError),

    #[error("failed to serialize directory")]
    Serialization(#[source] CoreError),
}

impl SyncError {
    /// Whether repeating the whole operation, from a fresh anchor read, may
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AnchorRead(e) | Self::Propose { source: e, .. } => e.is_retryable(),
            Self::Fetch { source, .. } | Self::Store(source) => source.is_retryable(),
            Self::Cache(e) => e.is_retryable(),
            Self::Assemble(e) => e.is_retryable(),
            Self::VerificationFailed { .. } => true,
            Self::NoData
            | Self::CorruptEntry { .. }
            | Self::UnknownCollection(_)
            | Self::MissingCredentials
            | Self::NoAssembler
            | Self::Serialization(_) => false,
        }
    }
}
