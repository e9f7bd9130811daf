//! # dirsync-core: Foundational Types for dirsync
//!
//! Defines the data model shared by every other crate in the workspace:
//! content addresses, the fixed set of directory collections, the directory
//! document itself, and the immutable snapshot pairing the two.
//!
//! ## Key Design Principles
//!
//! 1. **Validated newtypes.** A [`ContentAddress`] is never a bare string.
//!    Its constructor guarantees the value is usable as a single path segment,
//!    so the on-disk cache can name files by address without escaping.
//!
//! 2. **Single `CollectionName` enum.** One definition, nine variants,
//!    exhaustive `match` everywhere. Collection lookups by name are parsed once
//!    at the edge; past that point an unknown collection cannot be expressed.
//!
//! 3. **Every collection is always present.** A [`Directory`] cannot be
//!    constructed with a missing key. Deserialization fills absent keys with
//!    empty sequences.
//!
//! 4. **`CanonicalBytes` for everything that gets addressed.** Directory bytes
//!    headed for the content store or the cache are produced by
//!    [`Directory::canonical_bytes()`], so equal directories serialize to equal
//!    bytes and therefore to equal content addresses.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dirsync-*` crates.
//! - No I/O.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod address;
pub mod collection;
pub mod directory;
pub mod error;

pub use address::ContentAddress;
pub use collection::{CollectionName, COLLECTION_COUNT};
pub use directory::{CanonicalBytes, Directory, Record, Snapshot};
pub use error::CoreError;
