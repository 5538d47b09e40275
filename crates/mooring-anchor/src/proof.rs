//! Proof construction: records the winning commit on the ledger, persists
//! the resulting [`AnchorProof`], then persists an [`AnchorCommit`] that
//! extends the document's chain.

use std::sync::Arc;

use mooring_core::{AnchorCommit, AnchorProof, ContentRef, Record};
use mooring_store::CommitStore;
use serde::Serialize;

use crate::error::AnchorError;
use crate::ledger::LedgerTarget;
use crate::request::AnchorRequest;

/// A persisted proof and the anchor commit that points at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltAnchor {
    /// Reference of the stored proof.
    pub proof_ref: ContentRef,
    /// The proof.
    pub proof: AnchorProof,
    /// Reference of the stored anchor commit; the document's new tip.
    pub commit_ref: ContentRef,
    /// The anchor commit.
    pub commit: AnchorCommit,
}

/// Builds and persists anchors for resolved requests.
#[derive(Clone)]
pub struct ProofBuilder {
    store: Arc<dyn CommitStore>,
    ledger: Arc<dyn LedgerTarget>,
}

impl ProofBuilder {
    pub fn new(store: Arc<dyn CommitStore>, ledger: Arc<dyn LedgerTarget>) -> Self {
        Self { store, ledger }
    }

    /// The ledger this builder records to.
    pub fn ledger(&self) -> &Arc<dyn LedgerTarget> {
        &self.ledger
    }

    /// Anchor `winner` and return the persisted records.
    ///
    /// Does not check chain inclusion; see [`ProofBuilder::validate_chain_inclusion`].
    pub async fn build(&self, winner: &AnchorRequest) -> Result<BuiltAnchor, AnchorError> {
        let event = self.ledger.record(&winner.commit).await?;
        let proof = AnchorProof {
            chain_id: event.chain_id,
            block_number: event.block_number,
            block_timestamp: event.block_timestamp,
            tx_ref: event.tx_ref,
            root: winner.commit,
        };
        let proof_ref = self
            .store
            .store(&Record::from(proof.clone()))
            .await
            .map_err(AnchorError::Store)?;

        let commit = AnchorCommit {
            proof: proof_ref,
            path: String::new(),
            prev: winner.commit,
        };
        let commit_ref = self
            .store
            .store(&Record::from(commit.clone()))
            .await
            .map_err(AnchorError::Store)?;

        tracing::debug!(
            document = %winner.document_id,
            root = %winner.commit,
            proof = %proof_ref,
            commit = %commit_ref,
            block = proof.block_number,
            "anchor commit persisted"
        );

        Ok(BuiltAnchor {
            proof_ref,
            proof,
            commit_ref,
            commit,
        })
    }

    /// Check `proof` against the ledger.
    pub async fn validate_chain_inclusion(&self, proof: &AnchorProof) -> Result<(), AnchorError> {
        self.ledger.validate_chain_inclusion(proof).await
    }
}
