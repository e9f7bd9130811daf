//! Client error types.

use dirsync_core::ContentAddress;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store does not know the requested address.
    #[error("content {address} not found ({endpoint})")]
    NotFound {
        endpoint: String,
        address: ContentAddress,
    },
    /// Network or protocol failure: connection errors, timeouts, unexpected
    /// status codes, malformed response bodies.
    #[error("content store transport error calling {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },
}

impl StoreError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Errors from version anchor operations.
#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    /// The anchor endpoint could not be reached or answered with a non-2xx status.
    #[error("anchor chain {chain} unavailable: {reason}")]
    Unavailable { chain: String, reason: String },

    /// The node answered a read call with a JSON-RPC error object.
    #[error("anchor chain {chain} returned RPC error {code}: {message}")]
    Rpc {
        chain: String,
        code: i64,
        message: String,
    },

    /// The node answered, but the payload did not have the expected shape.
    #[error("anchor chain {chain} returned an invalid response: {reason}")]
    InvalidResponse { chain: String, reason: String },

    /// A proposed root transition did not take effect (nonce conflict,
    /// missing authorization, reverted transaction).
    #[error("root proposal rejected on chain {chain}: {reason}")]
    Rejected { chain: String, reason: String },

    /// The proposal was submitted but its inclusion was not observed in time.
    #[error("root proposal {transaction_id} on chain {chain} not confirmed within {waited_secs}s")]
    Timeout {
        chain: String,
        transaction_id: String,
        waited_secs: u64,
    },

    /// The client or the credentials are misconfigured.
    #[error("invalid anchor configuration: {0}")]
    InvalidConfig(String),
}

impl AnchorError {
    /// Whether repeating the operation (with freshly read state) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Rejected { .. } | Self::Timeout { .. }
        )
    }
}
