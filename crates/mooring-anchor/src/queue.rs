//! # Request Queue
//!
//! Pending requests for batched mode. The queue is an owned component
//! handed to the scheduler, so tests can share one and inspect it.
//!
//! ## Invariant
//!
//! [`RequestQueue::drain_all`] swaps the pending list for an empty one under
//! the same lock that `push` takes. A request pushed concurrently with a
//! drain lands either in the drained batch or in the next one, never in
//! neither.

use parking_lot::Mutex;

use crate::request::AnchorRequest;

/// FIFO of pending anchor requests.
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Mutex<Vec<AnchorRequest>>,
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request. Never blocks on I/O.
    pub fn push(&self, request: AnchorRequest) {
        let mut pending = self.pending.lock();
        pending.push(request);
        // Set under the lock so a concurrent drain cannot be overwritten
        // with a stale depth.
        metrics::gauge!("mooring_anchor_queue_depth").set(pending.len() as f64);
    }

    /// Remove and return every pending request, in submission order.
    pub fn drain_all(&self) -> Vec<AnchorRequest> {
        let mut pending = self.pending.lock();
        let drained = std::mem::take(&mut *pending);
        metrics::gauge!("mooring_anchor_queue_depth").set(0.0);
        drained
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mooring_core::{DocumentId, Record};
    use std::sync::Arc;

    fn request(doc: &str, nonce: u64) -> AnchorRequest {
        let commit = Record::plain(Some(nonce), serde_json::json!({}))
            .content_ref()
            .unwrap();
        AnchorRequest::new(DocumentId::new(doc).unwrap(), commit)
    }

    #[test]
    fn drain_returns_submission_order() {
        let queue = RequestQueue::new();
        let a = request("a", 1);
        let b = request("b", 2);
        queue.push(a.clone());
        queue.push(b.clone());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain_all(), vec![a, b]);
    }

    #[test]
    fn second_drain_is_empty() {
        let queue = RequestQueue::new();
        queue.push(request("a", 1));
        assert_eq!(queue.drain_all().len(), 1);
        assert!(queue.drain_all().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_of_empty_queue_is_empty() {
        assert!(RequestQueue::new().drain_all().is_empty());
    }

    mod depth {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        use metrics::{
            Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString,
            Unit,
        };

        #[derive(Default)]
        pub struct LastValue(AtomicU64);

        impl LastValue {
            pub fn get(&self) -> f64 {
                f64::from_bits(self.0.load(Ordering::SeqCst))
            }
        }

        impl GaugeFn for LastValue {
            fn increment(&self, _: f64) {}
            fn decrement(&self, _: f64) {}
            fn set(&self, value: f64) {
                self.0.store(value.to_bits(), Ordering::SeqCst);
            }
        }

        /// Routes every gauge to one cell.
        #[derive(Default)]
        pub struct DepthRecorder(pub Arc<LastValue>);

        impl Recorder for DepthRecorder {
            fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
                Counter::noop()
            }
            fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
                Gauge::from_arc(Arc::clone(&self.0))
            }
            fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
                Histogram::noop()
            }
        }
    }

    #[test]
    fn depth_gauge_tracks_queue() {
        let recorder = depth::DepthRecorder::default();
        let cell = Arc::clone(&recorder.0);
        metrics::with_local_recorder(&recorder, || {
            let queue = RequestQueue::new();
            queue.push(request("a", 1));
            queue.push(request("b", 2));
            assert_eq!(cell.get(), 2.0);
            queue.drain_all();
            assert_eq!(cell.get(), 0.0);
            queue.push(request("c", 3));
            assert_eq!(cell.get(), 1.0);
        });
    }

    #[test]
    fn concurrent_pushes_are_never_lost() {
        const WRITERS: usize = 4;
        const PER_WRITER: usize = 500;

        let queue = Arc::new(RequestQueue::new());
        let template = request("doc", 0);

        let writers: Vec<_> = (0..WRITERS)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let template = template.clone();
                std::thread::spawn(move || {
                    for _ in 0..PER_WRITER {
                        queue.push(template.clone());
                    }
                })
            })
            .collect();

        let mut drained = 0;
        while writers.iter().any(|w| !w.is_finished()) {
            drained += queue.drain_all().len();
        }
        for w in writers {
            w.join().unwrap();
        }
        drained += queue.drain_all().len();

        assert_eq!(drained, WRITERS * PER_WRITER);
    }
}
