//! # dirsync-engine: Anchored Directory Synchronization
//!
//! Ties the content store, the version anchor and a local snapshot cache
//! together into a [`SyncEngine`] that keeps an up-to-date local copy of
//! the anchored directory and publishes new versions.
//!
//! ## Modules
//!
//! - [`cache`]: atomic on-disk cache, one file per content address.
//! - [`assembler`]: the [`DirectoryAssembler`] seam and a JSON-file
//!   implementation.
//! - [`context`]: the explicitly constructed collaborator bundle.
//! - [`engine`]: the `Unknown`/`Synced`/`Stale` state machine.
//! - [`op`]: the closed [`KbOperation`] set dispatched by [`SyncEngine::run`].
//!
//! ## Retry Policy
//!
//! The engine never retries. A failed resolution leaves the engine `Stale`;
//! a failed publish leaves the anchor untouched. [`SyncError::is_retryable`]
//! tells the caller whether repeating the operation may help.

pub mod assembler;
pub mod cache;
pub mod context;
pub mod engine;
pub mod error;
pub mod op;

pub use assembler::{DirectoryAssembler, JsonFileAssembler};
pub use cache::SnapshotCache;
pub use context::SyncContext;
pub use engine::{PublishReceipt, RefreshOutcome, SyncEngine, SyncState};
pub use error::{AssembleError, CacheError, SyncError};
pub use op::{KbOperation, KbResponse, UnknownOperation};
