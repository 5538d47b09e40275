//! # Ledger Targets
//!
//! The external, totally ordered ledger that anchors are bound to. The
//! engine never talks to a chain directly; it goes through a
//! [`LedgerTarget`], which records a root commit and reports the event
//! (chain, block, time, transaction) that now contains it.
//!
//! ## Inclusion checks
//!
//! [`LedgerTarget::validate_chain_inclusion`] is the verification seam. A
//! production target must check the proof against the real ledger. The
//! [`MockLedger`] accepts every proof.
//!
//! ## Contract
//!
//! `record()` only returns `Ok` once the root is durably recorded on the
//! target chain. The scheduler treats `Ok` as final.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use mooring_core::{AnchorProof, ContentRef, Timestamp};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_CHAIN_ID;
use crate::error::AnchorError;

/// The ledger event that contains an anchored root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Chain the event lives on.
    pub chain_id: String,
    /// Block number.
    pub block_number: u64,
    /// Block time.
    pub block_timestamp: Timestamp,
    /// Transaction reference.
    pub tx_ref: String,
}

/// A ledger that roots can be anchored to.
#[async_trait]
pub trait LedgerTarget: Send + Sync {
    /// Record `root` on the ledger and return the containing event.
    async fn record(&self, root: &ContentRef) -> Result<LedgerEvent, AnchorError>;

    /// Check that `proof` is actually included in the ledger.
    async fn validate_chain_inclusion(&self, proof: &AnchorProof) -> Result<(), AnchorError>;

    /// Chain identifier of this target.
    fn chain_id(&self) -> &str;
}

/// Synthetic ledger for local nodes and tests.
///
/// Block numbers start at 1 and increase by one per recorded root. The
/// transaction reference is derived from the root, so the same root always
/// gets the same reference.
///
/// Provides NO finality. Every inclusion check passes.
#[derive(Debug)]
pub struct MockLedger {
    chain_id: String,
    next_block: AtomicU64,
}

impl MockLedger {
    /// Create a mock ledger for `chain_id`.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            next_block: AtomicU64::new(1),
        }
    }

    /// Block number the next recorded root will get.
    pub fn next_block(&self) -> u64 {
        self.next_block.load(Ordering::SeqCst)
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CHAIN_ID)
    }
}

#[async_trait]
impl LedgerTarget for MockLedger {
    async fn record(&self, root: &ContentRef) -> Result<LedgerEvent, AnchorError> {
        let block_number = self.next_block.fetch_add(1, Ordering::SeqCst);
        let hex = root.to_hex();
        let tx_ref = format!("mock-tx-{}", hex.get(..16).unwrap_or(&hex));
        tracing::trace!(chain = %self.chain_id, block = block_number, root = %root, "recorded synthetic ledger event");
        Ok(LedgerEvent {
            chain_id: self.chain_id.clone(),
            block_number,
            block_timestamp: Timestamp::now(),
            tx_ref,
        })
    }

    async fn validate_chain_inclusion(&self, _proof: &AnchorProof) -> Result<(), AnchorError> {
        Ok(())
    }

    fn chain_id(&self) -> &str {
        &self.chain_id
    }
}
