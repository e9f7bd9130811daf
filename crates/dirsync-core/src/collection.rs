//! # Collection Names: Single Source of Truth
//!
//! Defines the `CollectionName` enum covering the nine sub-collections of a
//! directory document. Every `match` on `CollectionName` must be exhaustive,
//! so adding a collection forces every consumer to handle it at compile time.
//!
//! | # | Collection | Contents |
//! |---|------------|----------|
//! | 1 | servers | Hub servers |
//! | 2 | nodes | Compute nodes |
//! | 3 | agents | Agent modules |
//! | 4 | tools | Tool modules |
//! | 5 | orchestrators | Orchestrator modules |
//! | 6 | environments | Environment modules |
//! | 7 | personas | Persona modules |
//! | 8 | memories | Memory modules |
//! | 9 | kbs | Knowledge-base modules |
//!
//! The records inside each collection are opaque to dirsync.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;

/// The sub-collections of a directory document, in canonical order.
///
/// `Ord` follows declaration order, which is also the order collections
/// appear in a serialized directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionName {
    Servers,
    Nodes,
    Agents,
    Tools,
    Orchestrators,
    Environments,
    Personas,
    Memories,
    Kbs,
}

/// Total number of collections.
pub const COLLECTION_COUNT: usize = 9;

impl CollectionName {
    /// Returns all collections in canonical order.
    pub fn all() -> &'static [CollectionName; COLLECTION_COUNT] {
        &[
            Self::Servers,
            Self::Nodes,
            Self::Agents,
            Self::Tools,
            Self::Orchestrators,
            Self::Environments,
            Self::Personas,
            Self::Memories,
            Self::Kbs,
        ]
    }

    /// Returns the identifier used as the key in directory documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Servers => "servers",
            Self::Nodes => "nodes",
            Self::Agents => "agents",
            Self::Tools => "tools",
            Self::Orchestrators => "orchestrators",
            Self::Environments => "environments",
            Self::Personas => "personas",
            Self::Memories => "memories",
            Self::Kbs => "kbs",
        }
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionName {
    type Err = CoreError;

    /// Parse a collection from its document key. Case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "servers" => Ok(Self::Servers),
            "nodes" => Ok(Self::Nodes),
            "agents" => Ok(Self::Agents),
            "tools" => Ok(Self::Tools),
            "orchestrators" => Ok(Self::Orchestrators),
            "environments" => Ok(Self::Environments),
            "personas" => Ok(Self::Personas),
            "memories" => Ok(Self::Memories),
            "kbs" => Ok(Self::Kbs),
            other => Err(CoreError::UnknownCollection(other.to_string())),
        }
    }
}
