//! # mooring-anchor — Document Anchoring Engine
//!
//! Binds the current tip of each document stream to an external, totally
//! ordered ledger.
//!
//! ## Flow
//!
//! ```text
//! request_anchor ─┬─► RequestQueue ──► anchor() ─┐
//!                 │                              ▼
//!                 └─────────────► process ─► ConflictResolver ─► ProofBuilder ─► LedgerTarget
//!                                                                     │
//!                                         CompletionTimers ◄──────────┘
//!                                                │
//!                                            EventBus ──► subscribers
//! ```
//!
//! - [`RequestQueue`]: pending batched requests; drain is atomic.
//! - [`ConflictResolver`]: one winner per document, highest nonce, earliest on ties.
//! - [`ProofBuilder`]: records the winner on a [`LedgerTarget`] and persists
//!   the [`AnchorProof`](mooring_core::AnchorProof) and
//!   [`AnchorCommit`](mooring_core::AnchorCommit).
//! - [`AnchorScheduler`]: ties the above together, owns the completion
//!   timers and the [`EventBus`].
//!
//! ## Metrics
//!
//! Emitted through the `metrics` facade; no recorder is installed here.
//!
//! | Name | Kind | Labels |
//! |---|---|---|
//! | `mooring_anchor_requests_total` | counter | `mode` |
//! | `mooring_anchor_commits_total` | counter | |
//! | `mooring_anchor_failures_total` | counter | `stage` |
//! | `mooring_anchor_queue_depth` | gauge | |

pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod proof;
pub mod queue;
pub mod request;
pub mod resolver;
pub mod scheduler;
pub mod timers;

pub use config::{AnchorConfig, ConfigError, DEFAULT_CHAIN_ID};
pub use error::AnchorError;
pub use events::{
    CompletionEvent, CompletionStatus, EventBus, ObserverId, Subscription, COMPLETED_MESSAGE,
};
pub use ledger::{LedgerEvent, LedgerTarget, MockLedger};
pub use proof::{BuiltAnchor, ProofBuilder};
pub use queue::RequestQueue;
pub use request::{AnchorRequest, RequestId, RequestState};
pub use resolver::{ConflictResolver, Resolution, ResolvedGroup};
pub use scheduler::{AnchorScheduler, AnchoredDocument, CycleReport, FailedDocument, Submitted};
pub use timers::{CompletionHandle, CompletionTimers};
