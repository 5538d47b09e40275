use mooring_core::ContentRef;
use mooring_store::StoreError;
use thiserror::Error;

/// Errors from the anchoring engine.
///
/// Fetch and store failures are scoped to one document: the scheduler turns
/// them into a failed completion notice for that document and carries on
/// with the rest of the cycle.
#[derive(Error, Debug)]
pub enum AnchorError {
    /// A referenced commit could not be retrieved.
    #[error("failed to fetch commit {reference}: {source}")]
    Fetch {
        /// The commit that could not be read.
        reference: ContentRef,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// Persisting a proof or anchor commit failed.
    #[error("failed to persist anchor record: {0}")]
    Store(#[source] StoreError),

    /// The ledger could not record the anchor.
    #[error("ledger error on chain {chain_id}: {reason}")]
    Ledger {
        /// Chain the anchor was submitted to.
        chain_id: String,
        /// Failure reason.
        reason: String,
    },

    /// A proof could not be shown to be included in the ledger.
    #[error("chain inclusion check failed: {0}")]
    InclusionFailed(String),

    /// The scheduler has been shut down.
    #[error("anchor scheduler is shut down")]
    ShutDown,
}

impl AnchorError {
    /// Short label of the failing stage, used as a metrics label.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Store(_) => "store",
            Self::Ledger { .. } => "ledger",
            Self::InclusionFailed(_) => "inclusion",
            Self::ShutDown => "shutdown",
        }
    }
}
