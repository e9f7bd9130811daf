//! # dirsync-client: Content Store and Version Anchor Clients
//!
//! The two network-facing collaborators of the sync engine:
//!
//! - **Content store** ([`ContentStore`]): put/get blobs by content address.
//!   Production implementation: [`IpfsStoreClient`] over the IPFS (Kubo)
//!   HTTP RPC API.
//! - **Version anchor** ([`VersionAnchor`]): read the anchored root address
//!   and propose a new one as a signed transaction. Production
//!   implementation: [`EvmAnchorClient`] over Ethereum JSON-RPC against the
//!   root-CID registry contract.
//!
//! [`MemoryContentStore`] and [`MemoryAnchor`] implement the same traits in
//! process memory, with call counters and failure injection for tests.
//!
//! ## Retry Policy
//!
//! None of the clients retry. Every failure is returned to the caller with
//! the endpoint and address it concerns; [`StoreError::is_retryable()`] and
//! [`AnchorError::is_retryable()`] tell an outer retry layer what is safe to
//! repeat.

pub mod anchor;
pub mod error;
pub mod ipfs;
pub mod memory;
pub mod store;

pub use anchor::evm::{DeploymentDescriptor, EvmAnchorClient, EvmAnchorConfig};
pub use anchor::{AnchorCredentials, LocalSigner, TransactionReceipt, VersionAnchor};
pub use error::{AnchorError, StoreError};
pub use ipfs::{IpfsStoreClient, IpfsStoreConfig};
pub use memory::{MemoryAnchor, MemoryContentStore, ProposalFailure};
pub use store::ContentStore;
