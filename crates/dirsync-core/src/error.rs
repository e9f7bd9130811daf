//! # Error Types
//!
//! Errors raised while constructing or (de)serializing core types. I/O
//! failures belong to the crates that perform I/O.

use thiserror::Error;

/// Errors from core type construction and serialization.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The string is not a well-formed content address.
    #[error("invalid content address {value:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The name does not belong to the fixed collection set.
    #[error("unknown collection: {0:?}")]
    UnknownCollection(String),

    /// Bytes could not be parsed as a directory document.
    #[error("malformed directory document: {0}")]
    MalformedDirectory(#[source] serde_json::Error),

    /// A directory could not be serialized.
    #[error("directory serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_address_display_names_value_and_reason() {
        let err = CoreError::InvalidAddress {
            value: "../etc".into(),
            reason: "contains a path separator",
        };
        let msg = err.to_string();
        assert!(msg.contains("../etc"));
        assert!(msg.contains("path separator"));
    }

    #[test]
    fn unknown_collection_display() {
        let err = CoreError::UnknownCollection("serverz".into());
        assert_eq!(err.to_string(), "unknown collection: \"serverz\"");
    }

    #[test]
    fn malformed_directory_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CoreError::MalformedDirectory(source);
        assert!(std::error::Error::source(&err).is_some());
    }
}
