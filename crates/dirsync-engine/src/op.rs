//! # Knowledge-Base Operations
//!
//! The closed set of operations a directory knowledge base answers, and the
//! response envelope they return. [`SyncEngine::run`](crate::SyncEngine::run)
//! matches on [`KbOperation`] exhaustively.
//!
//! Callers that still address operations by function name (`init`,
//! `update_from_hub`, `get_directory`, `get_servers`, ...) parse the name once
//! via [`FromStr`]; past that point an unsupported operation cannot be
//! expressed.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dirsync_core::CollectionName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KbOperation {
    /// Observe the anchor and report the sync state.
    Init,
    /// Assemble a fresh directory and publish it unless it is already anchored.
    UpdateFromHub,
    /// Return the whole anchored directory.
    GetDirectory,
    /// Return one collection of the anchored directory.
    GetCollection(CollectionName),
}

impl KbOperation {
    /// Every operation, in a stable order.
    pub fn all() -> Vec<KbOperation> {
        let mut ops = vec![Self::Init, Self::UpdateFromHub, Self::GetDirectory];
        ops.extend(CollectionName::all().iter().copied().map(Self::GetCollection));
        ops
    }

    /// The function name this operation is addressed by.
    pub fn func_name(&self) -> String {
        match self {
            Self::Init => "init".to_string(),
            Self::UpdateFromHub => "update_from_hub".to_string(),
            Self::GetDirectory => "get_directory".to_string(),
            Self::GetCollection(name) => format!("get_{name}"),
        }
    }
}

impl std::fmt::Display for KbOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.func_name())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown operation: {0:?}")]
pub struct UnknownOperation(pub String);

impl FromStr for KbOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "update_from_hub" => Ok(Self::UpdateFromHub),
            "get_directory" => Ok(Self::GetDirectory),
            other => other
                .strip_prefix("get_")
                .and_then(|name| name.parse::<CollectionName>().ok())
                .map(Self::GetCollection)
                .ok_or_else(|| UnknownOperation(s.to_string())),
        }
    }
}

/// Response envelope: `{"status": "success", "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbResponse {
    pub status: String,
    pub message: serde_json::Value,
}

impl KbResponse {
    pub fn success(message: impl Into<serde_json::Value>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}
