//! # Directory Documents and Snapshots
//!
//! A [`Directory`] maps each [`CollectionName`] to an ordered sequence of
//! opaque [`Record`]s. A [`Snapshot`] pairs a directory with the content
//! address it was stored under and is never mutated afterwards.
//!
//! ## Wire Format
//!
//! A directory serializes as a JSON object with one key per collection, in
//! canonical collection order:
//!
//! ```json
//! {"servers": [...], "nodes": [...], "agents": [...], "tools": [...],
//!  "orchestrators": [...], "environments": [...], "personas": [...],
//!  "memories": [...], "kbs": [...]}
//! ```
//!
//! Parsing is lenient about the document's edges and strict about its shape:
//! absent keys and `null` collections become empty sequences, unknown keys are
//! ignored, but a collection that is not an array of JSON objects is rejected.

use std::sync::Arc;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::ContentAddress;
use crate::collection::{CollectionName, COLLECTION_COUNT};
use crate::error::CoreError;

/// One opaque entry inside a collection.
///
/// Keys are kept sorted, which keeps serialization deterministic.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Deterministic serialized form of a [`Directory`].
///
/// Only [`Directory::canonical_bytes()`] produces these, so every byte string
/// headed for the content store or the snapshot cache went through the same
/// serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Borrow the serialized bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the owned byte buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A directory document. Every collection is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    collections: [Vec<Record>; COLLECTION_COUNT],
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    /// An empty directory: all nine collections present, all empty.
    pub fn new() -> Self {
        Self {
            collections: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Build a directory from `(collection, records)` pairs. Collections not
    /// mentioned stay empty; a collection mentioned twice keeps the last value.
    pub fn from_collections(
        entries: impl IntoIterator<Item = (CollectionName, Vec<Record>)>,
    ) -> Self {
        let mut directory = Self::new();
        for (name, records) in entries {
            directory.set(name, records);
        }
        directory
    }

    /// The records of one collection.
    pub fn get(&self, name: CollectionName) -> &[Record] {
        &self.collections[name as usize]
    }

    /// Replace the records of one collection.
    pub fn set(&mut self, name: CollectionName, records: Vec<Record>) {
        self.collections[name as usize] = records;
    }

    /// Append a record to one collection.
    pub fn push(&mut self, name: CollectionName, record: Record) {
        self.collections[name as usize].push(record);
    }

    /// Iterate collections in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (CollectionName, &[Record])> + '_ {
        CollectionName::all()
            .iter()
            .map(move |name| (*name, self.get(*name)))
    }

    /// Total number of records across all collections.
    pub fn record_count(&self) -> usize {
        self.collections.iter().map(Vec::len).sum()
    }

    /// Serialize to the canonical byte form used for content addressing.
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, CoreError> {
        serde_json::to_vec(self)
            .map(CanonicalBytes)
            .map_err(CoreError::Serialization)
    }

    /// Parse a directory document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(CoreError::MalformedDirectory)
    }
}

impl Serialize for Directory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLLECTION_COUNT))?;
        for (name, records) in self.iter() {
            map.serialize_entry(name.as_str(), records)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Directory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut directory = Directory::new();
        for name in CollectionName::all() {
            match raw.remove(name.as_str()) {
                None | Some(serde_json::Value::Null) => {}
                Some(value) => {
                    let records: Vec<Record> = serde_json::from_value(value).map_err(|e| {
                        D::Error::custom(format!("collection {name:?} is malformed: {e}"))
                    })?;
                    directory.set(*name, records);
                }
            }
        }
        Ok(directory)
    }
}

/// An immutable (address, directory) pair: one published version.
///
/// The directory is shared behind an `Arc`, so cloning a snapshot is cheap
/// and every holder sees the same payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    address: ContentAddress,
    directory: Arc<Directory>,
}

impl Snapshot {
    pub fn new(address: ContentAddress, directory: Directory) -> Self {
        Self {
            address,
            directory: Arc::new(directory),
        }
    }

    /// The content address this snapshot is stored under.
    pub fn address(&self) -> &ContentAddress {
        &self.address
    }

    /// The directory payload.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Shorthand for `self.directory().get(name)`.
    pub fn collection(&self, name: CollectionName) -> &[Record] {
        self.directory.get(name)
    }
}
