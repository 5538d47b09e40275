//! # Completion Notices
//!
//! Each scheduler owns an [`EventBus`]. Observers register per document,
//! either as a channel ([`EventBus::subscribe`]) or a callback
//! ([`EventBus::subscribe_fn`]). A notice is delivered to the observers
//! registered at the moment it is emitted; there is no buffering or replay.
//!
//! Channel observers are pruned once their [`Subscription`] is dropped.
//! Callback observers stay until [`EventBus::unsubscribe`] is called with
//! the [`ObserverId`] they were registered under.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mooring_core::{ContentRef, DocumentId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Message carried by successful completion notices.
pub const COMPLETED_MESSAGE: &str = "Commit successfully anchored.";

/// Outcome reported by a completion notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    Completed,
    Failed,
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("COMPLETED"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}

/// Notice that anchoring for a document finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub document_id: DocumentId,
    pub status: CompletionStatus,
    pub message: String,
    /// The new anchor commit. `None` for failed notices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_commit: Option<ContentRef>,
}

impl CompletionEvent {
    /// Successful anchoring of `document_id` at `anchor_commit`.
    pub fn completed(document_id: DocumentId, anchor_commit: ContentRef) -> Self {
        Self {
            document_id,
            status: CompletionStatus::Completed,
            message: COMPLETED_MESSAGE.to_string(),
            anchor_commit: Some(anchor_commit),
        }
    }

    /// Failed anchoring of `document_id`.
    pub fn failed(document_id: DocumentId, message: impl Into<String>) -> Self {
        Self {
            document_id,
            status: CompletionStatus::Failed,
            message: message.into(),
            anchor_commit: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == CompletionStatus::Completed
    }
}

type Callback = Arc<dyn Fn(&CompletionEvent) + Send + Sync>;

enum Subscriber {
    Channel(mpsc::UnboundedSender<CompletionEvent>),
    Callback(ObserverId, Callback),
}

/// Handle for removing a callback observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Per-scheduler registry of completion observers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<DocumentId, Vec<Subscriber>>>,
    next_observer: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every future notice for `document_id`.
    pub fn subscribe(&self, document_id: DocumentId) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .entry(document_id.clone())
            .or_default()
            .push(Subscriber::Channel(tx));
        Subscription { document_id, rx }
    }

    /// Call `observer` for every future notice for `document_id`.
    ///
    /// The observer runs on the emitting task and must not block.
    pub fn subscribe_fn<F>(&self, document_id: DocumentId, observer: F) -> ObserverId
    where
        F: Fn(&CompletionEvent) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .entry(document_id)
            .or_default()
            .push(Subscriber::Callback(id, Arc::new(observer)));
        id
    }

    /// Remove the callback observer `id` from `document_id`. Returns false if
    /// it was not registered there.
    pub fn unsubscribe(&self, document_id: &DocumentId, id: ObserverId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(list) = subscribers.get_mut(document_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| !matches!(s, Subscriber::Callback(registered, _) if *registered == id));
        let removed = list.len() < before;
        if list.is_empty() {
            subscribers.remove(document_id);
        }
        removed
    }

    /// Deliver `event` to the current observers of its document.
    ///
    /// Returns the number of observers reached. Dropped subscriptions are
    /// pruned here.
    pub fn emit(&self, event: &CompletionEvent) -> usize {
        let mut delivered = 0;
        let mut callbacks = Vec::new();
        {
            let mut subscribers = self.subscribers.lock();
            if let Some(list) = subscribers.get_mut(&event.document_id) {
                list.retain(|s| match s {
                    Subscriber::Channel(tx) => {
                        let sent = tx.send(event.clone()).is_ok();
                        delivered += usize::from(sent);
                        sent
                    }
                    Subscriber::Callback(_, cb) => {
                        callbacks.push(Arc::clone(cb));
                        true
                    }
                });
                if list.is_empty() {
                    subscribers.remove(&event.document_id);
                }
            }
        }
        // Callbacks run unlocked so they may subscribe.
        for cb in callbacks {
            cb(event);
            delivered += 1;
        }
        tracing::trace!(
            document = %event.document_id,
            status = %event.status,
            delivered,
            "completion notice emitted"
        );
        delivered
    }

    /// Live observers registered for `document_id`.
    pub fn subscriber_count(&self, document_id: &DocumentId) -> usize {
        self.subscribers
            .lock()
            .get(document_id)
            .map(|list| {
                list.iter()
                    .filter(|s| match s {
                        Subscriber::Channel(tx) => !tx.is_closed(),
                        Subscriber::Callback(..) => true,
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("documents", &self.subscribers.lock().len())
            .finish()
    }
}

/// Channel-backed subscription to one document's notices.
#[derive(Debug)]
pub struct Subscription {
    document_id: DocumentId,
    rx: mpsc::UnboundedReceiver<CompletionEvent>,
}

impl Subscription {
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Wait for the next notice. `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<CompletionEvent> {
        self.rx.recv().await
    }

    /// Take a notice if one is already delivered.
    pub fn try_next(&mut self) -> Option<CompletionEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mooring_core::Record;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    fn commit() -> ContentRef {
        Record::plain(Some(1), serde_json::json!({})).content_ref().unwrap()
    }

    #[tokio::test]
    async fn delivers_to_matching_document_only() {
        let bus = EventBus::new();
        let mut a = bus.subscribe(doc("a"));
        let mut b = bus.subscribe(doc("b"));

        let event = CompletionEvent::completed(doc("a"), commit());
        assert_eq!(bus.emit(&event), 1);
        assert_eq!(a.next().await, Some(event));
        assert!(b.try_next().is_none());
    }

    #[test]
    fn late_subscribers_miss_earlier_notices() {
        let bus = EventBus::new();
        bus.emit(&CompletionEvent::completed(doc("a"), commit()));
        let mut late = bus.subscribe(doc("a"));
        assert!(late.try_next().is_none());
    }

    #[test]
    fn callbacks_and_channels_both_fire() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        bus.subscribe_fn(doc("a"), move |e| {
            assert_eq!(e.status, CompletionStatus::Failed);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let mut rx = bus.subscribe(doc("a"));

        assert_eq!(bus.emit(&CompletionEvent::failed(doc("a"), "boom")), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_next().unwrap().message, "boom");
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let bus = EventBus::new();
        let sub = bus.subscribe(doc("a"));
        assert_eq!(bus.subscriber_count(&doc("a")), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(&doc("a")), 0);
        assert_eq!(bus.emit(&CompletionEvent::completed(doc("a"), commit())), 0);
    }

    #[test]
    fn unsubscribed_callback_is_removed() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let id = bus.subscribe_fn(doc("a"), move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let other = bus.subscribe_fn(doc("a"), |_| {});
        assert_eq!(bus.subscriber_count(&doc("a")), 2);

        assert!(!bus.unsubscribe(&doc("b"), id));
        assert!(bus.unsubscribe(&doc("a"), id));
        assert!(!bus.unsubscribe(&doc("a"), id));
        assert_eq!(bus.subscriber_count(&doc("a")), 1);
        assert_eq!(bus.emit(&CompletionEvent::completed(doc("a"), commit())), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert!(bus.unsubscribe(&doc("a"), other));
        assert_eq!(format!("{bus:?}"), "EventBus { documents: 0 }");
    }

    #[test]
    fn callback_may_subscribe_during_emit() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe_fn(doc("a"), move |_| {
            let _ = inner.subscribe(doc("b"));
        });
        assert_eq!(bus.emit(&CompletionEvent::completed(doc("a"), commit())), 1);
    }

    #[test]
    fn notice_wire_shape() {
        let c = commit();
        let json = serde_json::to_value(CompletionEvent::completed(doc("a"), c)).unwrap();
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["documentId"], "a");
        assert_eq!(json["anchorCommit"], c.to_string());
        assert_eq!(json["message"], COMPLETED_MESSAGE);

        let json = serde_json::to_value(CompletionEvent::failed(doc("a"), "x")).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert!(json.get("anchorCommit").is_none());
    }
}
