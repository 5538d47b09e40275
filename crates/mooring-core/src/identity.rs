//! # Document Identifiers
//!
//! A `DocumentId` names one document stream. It keys the request queue,
//! the conflict-resolution groups and the subscriber registry, so it is
//! validated once at construction and then treated as an opaque string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;

/// Maximum length of a document identifier in bytes.
pub const MAX_DOCUMENT_ID_LEN: usize = 256;

/// Identifier of a document stream.
///
/// Non-empty, at most [`MAX_DOCUMENT_ID_LEN`] bytes, no whitespace or
/// control characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Validate and wrap a document identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if id.len() > MAX_DOCUMENT_ID_LEN {
            return Err(IdentifierError::TooLong {
                len: id.len(),
                max: MAX_DOCUMENT_ID_LEN,
            });
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(IdentifierError::InvalidCharacter(id));
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}
