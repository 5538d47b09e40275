//! # mooring-core — Foundational Types for Document Anchoring
//!
//! Leaf crate of the mooring workspace. Every other crate depends on it; it
//! depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Content references are derived, never assigned.** A [`ContentRef`] is
//!    the SHA-256 of a record's [`CanonicalBytes`]. The only way to obtain one
//!    for a record is [`Record::content_ref()`].
//!
//! 2. **`CanonicalBytes` newtype.** All hashing flows through
//!    `CanonicalBytes::new()`; two stores that hold the same record always
//!    agree on its reference.
//!
//! 3. **Validated identifiers.** [`DocumentId`] rejects empty and malformed
//!    values at construction, so queue and registry keys are always usable.
//!
//! 4. **UTC-only timestamps.** Block timestamps in anchor proofs use
//!    [`Timestamp`], seconds precision with a `Z` suffix.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `mooring-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod record;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest, ContentRef, DigestAlgorithm};
pub use error::{CanonicalizationError, IdentifierError, MooringError, TimestampError};
pub use identity::DocumentId;
pub use record::{AnchorCommit, AnchorProof, CommitHeader, Record};
pub use temporal::Timestamp;
