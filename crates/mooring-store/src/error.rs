use mooring_core::{CanonicalizationError, ContentRef};
use thiserror::Error;

/// Errors from a [`crate::CommitStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record is stored under the reference.
    #[error("record not found: {0}")]
    NotFound(ContentRef),

    /// The stored bytes do not hash to the requested reference.
    #[error("integrity violation: expected {expected}, stored content hashes to {actual}")]
    Integrity {
        /// Reference that was requested.
        expected: ContentRef,
        /// Reference of the content actually found.
        actual: ContentRef,
    },

    /// The record could not be canonicalized for hashing.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// The stored bytes are not a valid record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True if the record was simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors from a [`crate::KeyValueStore`].
#[derive(Error, Debug)]
pub enum KvError {
    /// The key is absent. Expected during normal operation.
    #[error("key not found: {}", String::from_utf8_lossy(key))]
    NotFound {
        /// The missing key.
        key: Vec<u8>,
    },

    /// The backend failed while handling the key.
    #[error("store backend failed on key {}: {reason}", String::from_utf8_lossy(key))]
    Backend {
        /// Key being operated on.
        key: Vec<u8>,
        /// Backend message.
        reason: String,
    },

    /// A typed value could not be encoded or decoded.
    #[error("value serialization failed for key {}: {source}", String::from_utf8_lossy(key))]
    Serialization {
        /// Key being operated on.
        key: Vec<u8>,
        /// Decoder error.
        source: serde_json::Error,
    },
}

impl KvError {
    /// Backend failure on `key`, for adapters wrapping an external store.
    pub fn backend(key: &[u8], reason: impl std::fmt::Display) -> Self {
        Self::Backend {
            key: key.to_vec(),
            reason: reason.to_string(),
        }
    }

    /// True if the key was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
