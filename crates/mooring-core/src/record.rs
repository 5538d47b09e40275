//! # Record Model
//!
//! Everything a commit store holds is a [`Record`]. Document commits come in
//! two shapes: a plain commit carrying a header and body, and a signed
//! wrapper that only links to its plain payload. Anchoring adds two more
//! shapes: the [`AnchorProof`] binding a commit to a ledger event, and the
//! [`AnchorCommit`] appended to the document chain that points at the proof.
//!
//! The wire form is internally tagged by `kind`.

use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalBytes;
use crate::digest::ContentRef;
use crate::error::CanonicalizationError;
use crate::temporal::Timestamp;

/// Header of a plain document commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHeader {
    /// Per-writer counter used to order conflicting updates. Absent means 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Controllers allowed to write the document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controllers: Vec<String>,
}

/// Evidence binding a root commit to a ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorProof {
    /// CAIP-2 style chain identifier, e.g. `eip155:1`.
    pub chain_id: String,
    /// Block containing the anchoring transaction.
    pub block_number: u64,
    /// Time of that block.
    pub block_timestamp: Timestamp,
    /// Ledger transaction reference.
    pub tx_ref: String,
    /// The commit being anchored.
    pub root: ContentRef,
}

/// The commit appended to a document chain once its tip is anchored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorCommit {
    /// Reference to the stored [`AnchorProof`].
    pub proof: ContentRef,
    /// Path from the proof root to `prev`; empty for root-level anchors.
    pub path: String,
    /// The anchored commit.
    pub prev: ContentRef,
}

/// A content-addressed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// Signed wrapper around a plain payload.
    Signed {
        /// Reference to the signed payload.
        link: ContentRef,
        /// Detached signatures over the payload; not verified here.
        #[serde(default)]
        signatures: Vec<String>,
    },
    /// Plain commit.
    Plain {
        /// Commit header.
        header: CommitHeader,
        /// Arbitrary document content or patch.
        #[serde(default)]
        body: serde_json::Value,
    },
    /// Ledger-binding proof.
    AnchorProof(AnchorProof),
    /// Anchor commit referencing a proof.
    AnchorCommit(AnchorCommit),
}

impl Record {
    /// A plain commit with the given nonce and body.
    pub fn plain(nonce: Option<u64>, body: serde_json::Value) -> Self {
        Self::Plain {
            header: CommitHeader {
                nonce,
                controllers: Vec::new(),
            },
            body,
        }
    }

    /// A signed wrapper linking to `payload`.
    pub fn signed(payload: ContentRef) -> Self {
        Self::Signed {
            link: payload,
            signatures: Vec::new(),
        }
    }

    /// True for the signed-wrapper shape.
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Signed { .. })
    }

    /// The payload link of a signed wrapper.
    pub fn link(&self) -> Option<&ContentRef> {
        match self {
            Self::Signed { link, .. } => Some(link),
            _ => None,
        }
    }

    /// The header nonce, if this is a plain commit that carries one.
    pub fn header_nonce(&self) -> Option<u64> {
        match self {
            Self::Plain { header, .. } => header.nonce,
            _ => None,
        }
    }

    /// Short name of the record shape, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Signed { .. } => "signed",
            Self::Plain { .. } => "plain",
            Self::AnchorProof(_) => "anchor_proof",
            Self::AnchorCommit(_) => "anchor_commit",
        }
    }

    /// Canonical bytes of this record.
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(self)
    }

    /// The content reference a store assigns to this record.
    pub fn content_ref(&self) -> Result<ContentRef, CanonicalizationError> {
        Ok(ContentRef::of(&self.canonical_bytes()?))
    }
}

impl From<AnchorProof> for Record {
    fn from(proof: AnchorProof) -> Self {
        Self::AnchorProof(proof)
    }
}

impl From<AnchorCommit> for Record {
    fn from(commit: AnchorCommit) -> Self {
        Self::AnchorCommit(commit)
    }
}
