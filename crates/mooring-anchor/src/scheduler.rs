//! # Anchor Scheduler
//!
//! Drives requests from submission to completion notice.
//!
//! - **Immediate mode** (`anchor_on_request = true`): `request_anchor`
//!   anchors the request before returning. Its notice fires `anchor_delay`
//!   later, independently of the caller.
//! - **Batched mode**: `request_anchor` only queues. Each [`AnchorScheduler::anchor`]
//!   call drains the queue, resolves one winner per document, and anchors
//!   the winners in first-appearance order. [`AnchorScheduler::start_periodic`]
//!   runs cycles on `anchor_interval`.
//!
//! A document whose commit cannot be fetched, or whose anchor cannot be
//! persisted, gets a `FAILED` notice straight away. Other documents in the
//! same cycle are unaffected. Nothing is retried.
//!
//! Shutting down (or dropping) the scheduler cancels every pending notice
//! and the periodic task; later submissions fail with [`AnchorError::ShutDown`].

use std::sync::Arc;

use mooring_core::{AnchorProof, ContentRef, DocumentId};
use mooring_store::CommitStore;

use crate::config::AnchorConfig;
use crate::error::AnchorError;
use crate::events::{CompletionEvent, EventBus, ObserverId, Subscription};
use crate::ledger::LedgerTarget;
use crate::proof::{BuiltAnchor, ProofBuilder};
use crate::queue::RequestQueue;
use crate::request::{AnchorRequest, RequestId, RequestState};
use crate::resolver::ConflictResolver;
use crate::timers::{CompletionHandle, CompletionTimers};

/// A document anchored by a cycle or by immediate processing.
#[derive(Debug)]
pub struct AnchoredDocument {
    /// The winning request.
    pub request: AnchorRequest,
    /// The persisted proof and anchor commit.
    pub anchor: BuiltAnchor,
    /// The scheduled completion notice.
    pub completion: CompletionHandle,
}

/// What [`AnchorScheduler::request_anchor`] did with a request.
#[derive(Debug)]
pub enum Submitted {
    /// Batched mode: waiting for the next cycle.
    Queued(RequestId),
    /// Immediate mode: anchored, with its notice scheduled.
    Anchored(AnchoredDocument),
}

impl Submitted {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Queued(id) => *id,
            Self::Anchored(anchored) => anchored.request.id,
        }
    }

    /// The anchored document, if the request was processed immediately.
    pub fn into_anchored(self) -> Option<AnchoredDocument> {
        match self {
            Self::Queued(_) => None,
            Self::Anchored(anchored) => Some(anchored),
        }
    }
}

/// A document that could not be anchored.
#[derive(Debug)]
pub struct FailedDocument {
    pub document_id: DocumentId,
    pub error: AnchorError,
}

/// Outcome of one [`AnchorScheduler::anchor`] cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Anchored documents, in first-appearance order.
    pub anchored: Vec<AnchoredDocument>,
    /// Documents that failed, in first-appearance order.
    pub failed: Vec<FailedDocument>,
}

impl CycleReport {
    /// True if the cycle touched no document.
    pub fn is_empty(&self) -> bool {
        self.anchored.is_empty() && self.failed.is_empty()
    }

    /// References of the anchor commits produced.
    pub fn commits(&self) -> Vec<ContentRef> {
        self.anchored.iter().map(|a| a.anchor.commit_ref).collect()
    }
}

/// Anchoring engine for one set of documents.
pub struct AnchorScheduler {
    config: AnchorConfig,
    queue: Arc<RequestQueue>,
    resolver: ConflictResolver,
    builder: ProofBuilder,
    bus: Arc<EventBus>,
    timers: CompletionTimers,
}

impl AnchorScheduler {
    pub fn new(
        config: AnchorConfig,
        store: Arc<dyn CommitStore>,
        ledger: Arc<dyn LedgerTarget>,
    ) -> Self {
        if ledger.chain_id() != config.chain_id {
            tracing::warn!(
                configured = %config.chain_id,
                ledger = %ledger.chain_id(),
                "ledger chain differs from configured chain; proofs carry the ledger's"
            );
        }
        Self {
            config,
            queue: Arc::new(RequestQueue::new()),
            resolver: ConflictResolver::new(Arc::clone(&store)),
            builder: ProofBuilder::new(store, ledger),
            bus: Arc::new(EventBus::new()),
            timers: CompletionTimers::new(),
        }
    }

    /// Use `queue` instead of a private queue.
    pub fn with_queue(mut self, queue: Arc<RequestQueue>) -> Self {
        self.queue = queue;
        self
    }

    /// Use `bus` instead of a private event bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Receive future completion notices for `document_id`.
    pub fn subscribe(&self, document_id: DocumentId) -> Subscription {
        self.bus.subscribe(document_id)
    }

    /// Call `observer` for future completion notices for `document_id`.
    pub fn subscribe_fn<F>(&self, document_id: DocumentId, observer: F) -> ObserverId
    where
        F: Fn(&CompletionEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe_fn(document_id, observer)
    }

    /// Remove a callback observer registered with [`Self::subscribe_fn`].
    pub fn unsubscribe(&self, document_id: &DocumentId, observer: ObserverId) -> bool {
        self.bus.unsubscribe(document_id, observer)
    }

    /// Ask for `document_id` to be anchored at `commit`.
    ///
    /// Batched mode: queues and returns. Immediate mode: returns once the
    /// proof and anchor commit are persisted, or with the error that
    /// stopped them (a `FAILED` notice has been emitted by then).
    pub async fn request_anchor(
        &self,
        document_id: DocumentId,
        commit: ContentRef,
    ) -> Result<Submitted, AnchorError> {
        if self.timers.is_shut_down() {
            return Err(AnchorError::ShutDown);
        }
        let request = AnchorRequest::new(document_id, commit);
        let id = request.id;
        tracing::debug!(
            request = %id,
            document = %request.document_id,
            commit = %request.commit,
            state = %RequestState::Requested,
            "anchor requested"
        );

        if self.config.anchor_on_request {
            metrics::counter!("mooring_anchor_requests_total", "mode" => "immediate").increment(1);
            self.process(request).await.map(Submitted::Anchored)
        } else {
            metrics::counter!("mooring_anchor_requests_total", "mode" => "batched").increment(1);
            transition(id, RequestState::Requested, RequestState::Queued);
            self.queue.push(request);
            Ok(Submitted::Queued(id))
        }
    }

    /// Run one batched cycle over everything queued so far.
    ///
    /// Returns an empty report if the queue is empty. Per-document failures
    /// are reported in [`CycleReport::failed`], not as an `Err`.
    pub async fn anchor(&self) -> Result<CycleReport, AnchorError> {
        if self.timers.is_shut_down() {
            return Err(AnchorError::ShutDown);
        }
        let batch = self.queue.drain_all();
        if batch.is_empty() {
            return Ok(CycleReport::default());
        }
        let requests = batch.len();

        let resolution = self.resolver.resolve(batch).await;
        let mut report = CycleReport::default();
        for group in resolution.groups {
            let outcome = match group.winner {
                Ok(winner) => {
                    transition(winner.id, RequestState::Queued, RequestState::Processing);
                    self.anchor_winner(winner).await
                }
                Err(e) => {
                    self.fail(&group.document_id, RequestState::Queued, &e);
                    Err(e)
                }
            };
            match outcome {
                Ok(anchored) => report.anchored.push(anchored),
                Err(error) => {
                    report.failed.push(FailedDocument {
                        document_id: group.document_id,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            requests,
            anchored = report.anchored.len(),
            failed = report.failed.len(),
            "anchor cycle finished"
        );
        Ok(report)
    }

    /// Anchor a single request as a group of one.
    pub async fn process(&self, request: AnchorRequest) -> Result<AnchoredDocument, AnchorError> {
        if self.timers.is_shut_down() {
            return Err(AnchorError::ShutDown);
        }
        transition(request.id, RequestState::Requested, RequestState::Processing);
        if let Err(e) = self.resolver.nonce_of(&request.commit).await {
            self.fail(&request.document_id, RequestState::Processing, &e);
            return Err(e);
        }
        self.anchor_winner(request).await
    }

    /// Start the periodic cycle if batched mode and `anchor_interval` are
    /// configured. Returns whether a task was started.
    ///
    /// The task holds only a weak reference and stops when the scheduler is
    /// dropped or shut down.
    pub fn start_periodic(self: &Arc<Self>) -> Result<bool, AnchorError> {
        let Some(period) = self.config.anchor_interval else {
            return Ok(false);
        };
        if self.config.anchor_on_request {
            return Ok(false);
        }
        let weak = Arc::downgrade(self);
        self.timers.spawn_interval(period, move || {
            let weak = weak.clone();
            async move {
                let Some(scheduler) = weak.upgrade() else {
                    return false;
                };
                match scheduler.anchor().await {
                    Ok(_) => true,
                    Err(AnchorError::ShutDown) => false,
                    Err(e) => {
                        tracing::warn!(error = %e, "periodic anchor cycle failed");
                        true
                    }
                }
            }
        })?;
        tracing::info!(interval_ms = period.as_millis() as u64, "periodic anchoring started");
        Ok(true)
    }

    /// Check `proof` against the ledger.
    pub async fn validate_chain_inclusion(&self, proof: &AnchorProof) -> Result<(), AnchorError> {
        self.builder.validate_chain_inclusion(proof).await
    }

    /// Completion notices scheduled but not yet fired.
    pub fn pending_completions(&self) -> usize {
        self.timers.pending()
    }

    pub fn is_shut_down(&self) -> bool {
        self.timers.is_shut_down()
    }

    /// Cancel all pending notices and the periodic task.
    pub fn shutdown(&self) {
        if self.timers.is_shut_down() {
            return;
        }
        let cancelled = self.timers.shutdown();
        let abandoned = self.queue.len();
        tracing::info!(cancelled, abandoned, "anchor scheduler shut down");
    }

    /// Build and persist the anchor for a `Processing` request, then
    /// schedule its notice. Failures are reported through [`Self::fail`].
    async fn anchor_winner(&self, winner: AnchorRequest) -> Result<AnchoredDocument, AnchorError> {
        let anchor = match self.builder.build(&winner).await {
            Ok(anchor) => anchor,
            Err(e) => {
                self.fail(&winner.document_id, RequestState::Processing, &e);
                return Err(e);
            }
        };
        metrics::counter!("mooring_anchor_commits_total").increment(1);
        transition(winner.id, RequestState::Processing, RequestState::ProofBuilt);
        tracing::debug!(
            request = %winner.id,
            document = %winner.document_id,
            commit = %anchor.commit_ref,
            "anchor built"
        );

        let event = CompletionEvent::completed(winner.document_id.clone(), anchor.commit_ref);
        let bus = Arc::clone(&self.bus);
        let request = winner.id;
        let scheduled = self.timers.schedule(self.config.anchor_delay, move || {
            transition(request, RequestState::CompletionScheduled, RequestState::Completed);
            tracing::debug!(request = %request, document = %event.document_id, "anchor completed");
            bus.emit(&event);
        });
        let completion = match scheduled {
            Ok(handle) => handle,
            Err(e) => {
                self.fail(&winner.document_id, RequestState::ProofBuilt, &e);
                return Err(e);
            }
        };
        transition(winner.id, RequestState::ProofBuilt, RequestState::CompletionScheduled);
        tracing::trace!(
            request = %winner.id,
            delay_ms = self.config.anchor_delay.as_millis() as u64,
            "completion scheduled"
        );

        Ok(AnchoredDocument {
            request: winner,
            anchor,
            completion,
        })
    }

    fn fail(&self, document_id: &DocumentId, from: RequestState, error: &AnchorError) {
        debug_assert!(
            from.can_transition_to(RequestState::Failed),
            "illegal request transition {from} -> FAILED"
        );
        metrics::counter!("mooring_anchor_failures_total", "stage" => error.stage()).increment(1);
        tracing::warn!(
            document = %document_id,
            from = %from,
            state = %RequestState::Failed,
            stage = error.stage(),
            error = %error,
            "anchoring failed"
        );
        if !self.timers.is_shut_down() {
            self.bus
                .emit(&CompletionEvent::failed(document_id.clone(), error.to_string()));
        }
    }
}

/// Record a lifecycle step. Debug builds reject steps the lifecycle forbids.
fn transition(request: RequestId, from: RequestState, to: RequestState) {
    debug_assert!(
        from.can_transition_to(to),
        "illegal request transition {from} -> {to}"
    );
    tracing::trace!(request = %request, from = %from, to = %to, "request state changed");
}

impl std::fmt::Debug for AnchorScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorScheduler")
            .field("config", &self.config)
            .field("queued", &self.queue.len())
            .field("pending_completions", &self.timers.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CompletionStatus;
    use crate::ledger::MockLedger;
    use mooring_core::Record;
    use mooring_store::MemoryCommitStore;
    use std::time::Duration;

    fn doc(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    fn scheduler(config: AnchorConfig) -> (Arc<MemoryCommitStore>, AnchorScheduler) {
        let store = Arc::new(MemoryCommitStore::new());
        let s = AnchorScheduler::new(config, store.clone(), Arc::new(MockLedger::default()));
        (store, s)
    }

    async fn commit(store: &MemoryCommitStore, nonce: u64) -> ContentRef {
        store
            .store(&Record::plain(Some(nonce), serde_json::json!({"n": nonce})))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn batched_request_only_queues() {
        let (store, s) = scheduler(AnchorConfig::batched(Duration::ZERO));
        let c = commit(&store, 1).await;
        s.request_anchor(doc("a"), c).await.unwrap();
        assert_eq!(s.queue().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn empty_cycle_is_a_no_op() {
        let (_, s) = scheduler(AnchorConfig::batched(Duration::ZERO));
        let report = s.anchor().await.unwrap();
        assert!(report.is_empty());
        assert!(s.anchor().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cycle_drains_and_anchors() {
        let (store, s) = scheduler(AnchorConfig::batched(Duration::ZERO));
        let c = commit(&store, 1).await;
        s.request_anchor(doc("a"), c).await.unwrap();

        let report = s.anchor().await.unwrap();
        assert!(s.queue().is_empty());
        assert_eq!(report.anchored.len(), 1);
        let anchored = &report.anchored[0];
        assert_eq!(anchored.anchor.commit.prev, c);
        assert!(store.contains(&anchored.anchor.commit_ref));
        assert!(store.contains(&anchored.anchor.proof_ref));
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_notice_waits_for_delay() {
        let (store, s) = scheduler(AnchorConfig::immediate(Duration::from_secs(2)));
        let c = commit(&store, 1).await;
        let mut sub = s.subscribe(doc("a"));

        s.request_anchor(doc("a"), c).await.unwrap();
        assert_eq!(store.len(), 3);
        assert!(s.queue().is_empty());
        assert_eq!(s.pending_completions(), 1);

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(sub.try_next().is_none());

        let event = sub.next().await.unwrap();
        assert_eq!(event.status, CompletionStatus::Completed);
        assert_eq!(s.pending_completions(), 0);
    }

    #[tokio::test]
    async fn immediate_failure_emits_failed_notice() {
        let (_, s) = scheduler(AnchorConfig::immediate(Duration::ZERO));
        let dangling = Record::plain(Some(1), serde_json::json!({})).content_ref().unwrap();
        let mut sub = s.subscribe(doc("a"));

        let err = s.request_anchor(doc("a"), dangling).await.unwrap_err();
        assert!(matches!(err, AnchorError::Fetch { .. }));

        let event = sub.try_next().unwrap();
        assert_eq!(event.status, CompletionStatus::Failed);
        assert_eq!(event.anchor_commit, None);
        assert!(event.message.contains(&dangling.to_string()));
    }

    #[tokio::test]
    async fn batched_fetch_failure_fails_queued_group() {
        let (store, s) = scheduler(AnchorConfig::batched(Duration::ZERO));
        let dangling = Record::plain(Some(1), serde_json::json!({})).content_ref().unwrap();
        let good = commit(&store, 1).await;
        let mut sub = s.subscribe(doc("a"));
        s.request_anchor(doc("a"), dangling).await.unwrap();
        s.request_anchor(doc("b"), good).await.unwrap();

        let report = s.anchor().await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].document_id, doc("a"));
        assert_eq!(report.anchored.len(), 1);
        assert_eq!(sub.try_next().unwrap().status, CompletionStatus::Failed);
    }

    #[tokio::test]
    async fn immediate_request_returns_anchored_document() {
        let (store, s) = scheduler(AnchorConfig::immediate(Duration::ZERO));
        let c = commit(&store, 1).await;
        let submitted = s.request_anchor(doc("a"), c).await.unwrap();
        let id = submitted.request_id();
        let anchored = submitted.into_anchored().unwrap();
        assert_eq!(anchored.request.id, id);
        assert_eq!(anchored.anchor.commit.prev, c);

        let (store, s) = scheduler(AnchorConfig::batched(Duration::ZERO));
        let c = commit(&store, 1).await;
        assert!(s.request_anchor(doc("a"), c).await.unwrap().into_anchored().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_silences_pending_notices() {
        let (store, s) = scheduler(AnchorConfig::immediate(Duration::from_secs(5)));
        let c = commit(&store, 1).await;
        let mut sub = s.subscribe(doc("a"));
        s.request_anchor(doc("a"), c).await.unwrap();

        s.shutdown();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(sub.try_next().is_none());
        assert_eq!(s.pending_completions(), 0);
        assert!(matches!(
            s.request_anchor(doc("a"), c).await,
            Err(AnchorError::ShutDown)
        ));
        assert!(matches!(s.anchor().await, Err(AnchorError::ShutDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_completion_never_fires() {
        let (store, s) = scheduler(AnchorConfig::immediate(Duration::from_secs(1)));
        let c = commit(&store, 1).await;
        let mut sub = s.subscribe(doc("a"));
        let anchored = s.process(AnchorRequest::new(doc("a"), c)).await.unwrap();
        anchored.completion.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(sub.try_next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_cycle_anchors_queued_requests() {
        let mut config = AnchorConfig::batched(Duration::ZERO);
        config.anchor_interval = Some(Duration::from_secs(30));
        let (store, s) = scheduler(config);
        let s = Arc::new(s);
        assert!(s.start_periodic().unwrap());

        let c = commit(&store, 1).await;
        let mut sub = s.subscribe(doc("a"));
        s.request_anchor(doc("a"), c).await.unwrap();

        let event = sub.next().await.unwrap();
        assert!(event.is_completed());
        assert!(s.queue().is_empty());
    }

    #[tokio::test]
    async fn periodic_is_off_without_interval() {
        let (_, s) = scheduler(AnchorConfig::batched(Duration::ZERO));
        assert!(!Arc::new(s).start_periodic().unwrap());
    }

    #[tokio::test]
    async fn injected_queue_is_shared() {
        let queue = Arc::new(RequestQueue::new());
        let (store, s) = scheduler(AnchorConfig::batched(Duration::ZERO));
        let s = s.with_queue(Arc::clone(&queue));
        s.request_anchor(doc("a"), commit(&store, 1).await).await.unwrap();
        assert_eq!(queue.len(), 1);
        s.anchor().await.unwrap();
        assert!(queue.is_empty());
    }
}
