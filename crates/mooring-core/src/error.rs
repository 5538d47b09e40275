//! # Error Types
//!
//! Errors raised while building the foundational types. Each constructor
//! that can reject input has its own error enum; [`MooringError`] folds them
//! together for callers that do not care which primitive failed.

use thiserror::Error;

/// Top-level error type for `mooring-core`.
#[derive(Error, Debug)]
pub enum MooringError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// An identifier or content reference was malformed.
    #[error("identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    /// A timestamp could not be parsed or was not UTC.
    #[error("timestamp error: {0}")]
    Timestamp(#[from] TimestampError),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values have no deterministic canonical form.
    #[error("float values are not permitted in canonical records: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error parsing a document identifier or content reference.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The identifier was empty.
    #[error("document id must not be empty")]
    Empty,

    /// The identifier exceeded the maximum length.
    #[error("document id is {len} bytes, maximum is {max}")]
    TooLong {
        /// Actual length in bytes.
        len: usize,
        /// Maximum permitted length in bytes.
        max: usize,
    },

    /// The identifier contained whitespace or control characters.
    #[error("document id contains whitespace or control characters: {0:?}")]
    InvalidCharacter(String),

    /// A content reference string did not have the `sha256:<hex>` form.
    #[error("malformed content reference: {0:?}")]
    MalformedRef(String),
}

/// Error constructing a [`crate::Timestamp`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// The string was not RFC 3339.
    #[error("invalid RFC 3339 timestamp {input:?}: {reason}")]
    Invalid {
        /// The rejected input.
        input: String,
        /// Parser message.
        reason: String,
    },

    /// The timestamp carried a non-`Z` offset.
    #[error("timestamp must use Z suffix (UTC only), got: {0:?}")]
    NotUtc(String),

    /// Epoch seconds outside the representable range.
    #[error("epoch seconds out of range: {0}")]
    OutOfRange(i64),
}
