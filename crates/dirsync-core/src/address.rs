//! # Content Address
//!
//! A content address (CID) is an opaque identifier that the content store
//! derives from a blob's bytes. dirsync never computes addresses for the
//! production store; it only carries them between the store, the anchor and
//! the cache.
//!
//! ## Validation
//!
//! Addresses must match `^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$`. CIDv0/CIDv1
//! strings (base58btc, base32) fit this shape, and so does every address
//! the in-memory store produces. The rule also guarantees an address is a
//! single, non-hidden path segment, which the snapshot cache relies on when it
//! names files by address.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;

/// Maximum accepted address length.
const MAX_ADDRESS_LEN: usize = 128;

/// A validated content address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Validate and wrap an address string.
    ///
    /// Surrounding whitespace is trimmed. The empty string is rejected: the
    /// anchor's "nothing published yet" sentinel is modelled as
    /// `Option<ContentAddress>::None`, not as an empty address.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let raw: String = value.into();
        let trimmed = raw.trim();
        let invalid = |reason| CoreError::InvalidAddress {
            value: raw.clone(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(invalid("address is empty"));
        }
        if trimmed.len() > MAX_ADDRESS_LEN {
            return Err(invalid("address exceeds 128 characters"));
        }
        let mut chars = trimmed.chars();
        if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("address must start with [A-Za-z0-9]"));
        }
        if trimmed.contains(['/', '\\']) {
            return Err(invalid("address contains a path separator"));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
            return Err(invalid("address contains characters outside [A-Za-z0-9._-]"));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Parse an anchor value where the empty string means "no address".
    pub fn from_anchor_value(value: &str) -> Result<Option<Self>, CoreError> {
        if value.trim().is_empty() {
            Ok(None)
        } else {
            Self::new(value).map(Some)
        }
    }

    /// Return the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentAddress> for String {
    fn from(address: ContentAddress) -> Self {
        address.0
    }
}

impl AsRef<str> for ContentAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_cid_shapes() {
        for cid in [
            "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o",
            "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi",
            "sha256-9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
        ] {
            let addr = ContentAddress::new(cid).unwrap();
            assert_eq!(addr.as_str(), cid);
        }
    }

    #[test]
    fn trims_whitespace() {
        let addr = ContentAddress::new("  QmAbc \n").unwrap();
        assert_eq!(addr.as_str(), "QmAbc");
    }

    #[test]
    fn rejects_path_like_values() {
        assert!(ContentAddress::new("").is_err());
        assert!(ContentAddress::new("   ").is_err());
        assert!(ContentAddress::new("..").is_err());
        assert!(ContentAddress::new(".hidden").is_err());
        assert!(ContentAddress::new("a/b").is_err());
        assert!(ContentAddress::new("a\\b").is_err());
        assert!(ContentAddress::new("Qm abc").is_err());
        assert!(ContentAddress::new("x".repeat(129)).is_err());
    }

    #[test]
    fn anchor_value_empty_means_none() {
        assert_eq!(ContentAddress::from_anchor_value("").unwrap(), None);
        assert_eq!(ContentAddress::from_anchor_value("  ").unwrap(), None);
        assert_eq!(
            ContentAddress::from_anchor_value("QmRoot").unwrap(),
            Some(ContentAddress::new("QmRoot").unwrap())
        );
        assert!(ContentAddress::from_anchor_value("../x").is_err());
    }

    #[test]
    fn serde_is_a_plain_string() {
        let addr = ContentAddress::new("QmRoot").unwrap();
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"QmRoot\"");
        let back: ContentAddress = serde_json::from_str("\"QmRoot\"").unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<ContentAddress>("\"a/b\"").is_err());
    }
}
