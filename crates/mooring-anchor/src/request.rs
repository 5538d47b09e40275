//! # Anchor Requests
//!
//! A request asks for one document to be anchored at one commit. Requests
//! move through [`RequestState`]:
//!
//! ```text
//! Requested ──► Queued ──► Processing ──► ProofBuilt ──► CompletionScheduled ──► Completed
//!     │           │            │              │
//!     │           └────────────┴──────────────┴──► Failed
//!     └──────────────────────► Processing
//! ```
//!
//! `Queued` is the batched path; the immediate path goes straight to
//! `Processing`. A queued group fails before a winner is picked when one of
//! its commits cannot be fetched. `ProofBuilt` fails when the notice cannot
//! be scheduled because the scheduler shut down. `Failed` is surfaced to
//! subscribers as a failed completion notice.

use std::fmt;

use mooring_core::{ContentRef, DocumentId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of an anchor request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a new random request identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request:{}", self.0)
    }
}

/// One request to anchor `document_id` at `commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRequest {
    /// Request identifier.
    pub id: RequestId,
    /// Document to anchor.
    pub document_id: DocumentId,
    /// Commit to anchor the document at.
    pub commit: ContentRef,
}

impl AnchorRequest {
    /// Create a request with a fresh identifier.
    pub fn new(document_id: DocumentId, commit: ContentRef) -> Self {
        Self {
            id: RequestId::new(),
            document_id,
            commit,
        }
    }
}

/// Lifecycle of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    /// Accepted by the scheduler.
    Requested,
    /// Waiting in the request queue for the next cycle.
    Queued,
    /// Being anchored.
    Processing,
    /// Proof and anchor commit persisted.
    ProofBuilt,
    /// Completion notice waiting on the finality delay.
    CompletionScheduled,
    /// Completion notice delivered.
    Completed,
    /// Anchoring failed; a failed notice was delivered.
    Failed,
}

impl RequestState {
    /// True if `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Requested, Queued)
                | (Requested, Processing)
                | (Queued, Processing)
                | (Queued, Failed)
                | (Processing, ProofBuilt)
                | (Processing, Failed)
                | (ProofBuilt, CompletionScheduled)
                | (ProofBuilt, Failed)
                | (CompletionScheduled, Completed)
        )
    }

    /// Upper-case state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::ProofBuilt => "PROOF_BUILT",
            Self::CompletionScheduled => "COMPLETION_SCHEDULED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
