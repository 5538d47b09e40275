//! # Conflict Resolution
//!
//! Several updates to one document can be queued before a cycle runs. Only
//! one of them may be anchored. The resolver groups requests by document, in
//! order of each document's first appearance, and picks the request whose
//! commit carries the highest nonce.
//!
//! ## Nonce lookup
//!
//! - Plain commit: `header.nonce`.
//! - Signed wrapper: the nonce of the payload it links to.
//! - Absent nonce: `0`.
//!
//! ## Tie-break
//!
//! The running winner starts at the first candidate and is replaced only by
//! a strictly greater nonce, so equal nonces keep the earliest submission.
//!
//! ## Failures
//!
//! A commit that cannot be fetched fails its own document's group. Other
//! groups in the same batch are still resolved.

use std::sync::Arc;

use indexmap::IndexMap;
use mooring_core::{ContentRef, DocumentId, Record};
use mooring_store::CommitStore;

use crate::error::AnchorError;
use crate::request::AnchorRequest;

/// Outcome of resolving one document's requests.
#[derive(Debug)]
pub struct ResolvedGroup {
    /// The document.
    pub document_id: DocumentId,
    /// Number of competing requests for it in the batch.
    pub candidates: usize,
    /// The selected request, or why none could be selected.
    pub winner: Result<AnchorRequest, AnchorError>,
}

/// Outcome of resolving a drained batch.
#[derive(Debug, Default)]
pub struct Resolution {
    /// One entry per distinct document, in first-appearance order.
    pub groups: Vec<ResolvedGroup>,
}

impl Resolution {
    /// Selected requests, in first-appearance order of their documents.
    pub fn winners(&self) -> impl Iterator<Item = &AnchorRequest> {
        self.groups.iter().filter_map(|g| g.winner.as_ref().ok())
    }

    /// Documents whose resolution failed.
    pub fn failures(&self) -> impl Iterator<Item = (&DocumentId, &AnchorError)> {
        self.groups
            .iter()
            .filter_map(|g| g.winner.as_ref().err().map(|e| (&g.document_id, e)))
    }
}

/// Selects one request per document by nonce.
#[derive(Clone)]
pub struct ConflictResolver {
    store: Arc<dyn CommitStore>,
}

impl ConflictResolver {
    /// Create a resolver reading commits from `store`.
    pub fn new(store: Arc<dyn CommitStore>) -> Self {
        Self { store }
    }

    /// Resolve `requests` to one winner per distinct document.
    pub async fn resolve(&self, requests: Vec<AnchorRequest>) -> Resolution {
        let mut grouped: IndexMap<DocumentId, Vec<AnchorRequest>> = IndexMap::new();
        for request in requests {
            grouped
                .entry(request.document_id.clone())
                .or_default()
                .push(request);
        }

        let mut groups = Vec::with_capacity(grouped.len());
        for (document_id, candidates) in grouped {
            let count = candidates.len();
            let mut candidates = candidates.into_iter();
            let Some(first) = candidates.next() else {
                continue;
            };
            let winner = self.select_winner(first, candidates).await;
            match &winner {
                Ok(w) => tracing::debug!(
                    document = %document_id,
                    candidates = count,
                    commit = %w.commit,
                    "selected anchor candidate"
                ),
                Err(e) => tracing::warn!(
                    document = %document_id,
                    candidates = count,
                    "conflict resolution failed: {e}"
                ),
            }
            groups.push(ResolvedGroup {
                document_id,
                candidates: count,
                winner,
            });
        }
        Resolution { groups }
    }

    /// The effective nonce of `commit`.
    pub async fn nonce_of(&self, commit: &ContentRef) -> Result<u64, AnchorError> {
        let record = self.fetch(commit).await?;
        let nonce = match record.link() {
            Some(payload) => self.fetch(payload).await?.header_nonce(),
            None => record.header_nonce(),
        };
        Ok(nonce.unwrap_or(0))
    }

    async fn select_winner(
        &self,
        first: AnchorRequest,
        rest: impl Iterator<Item = AnchorRequest> + Send,
    ) -> Result<AnchorRequest, AnchorError> {
        let mut best_nonce = self.nonce_of(&first.commit).await?;
        let mut best = first;
        for candidate in rest {
            let nonce = self.nonce_of(&candidate.commit).await?;
            if nonce > best_nonce {
                best_nonce = nonce;
                best = candidate;
            }
        }
        Ok(best)
    }

    async fn fetch(&self, reference: &ContentRef) -> Result<Record, AnchorError> {
        self.store
            .retrieve(reference)
            .await
            .map_err(|source| AnchorError::Fetch {
                reference: *reference,
                source,
            })
    }
}
