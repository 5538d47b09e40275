//! Cancellable completion timers and the periodic anchoring task.
//!
//! Every timer is a spawned task racing its delay against a shared shutdown
//! signal. Firing happens under a read lock on the shutdown flag and
//! `shutdown()` takes the write lock, so once `shutdown()` returns no
//! callback can start. Callbacks must not call `shutdown()` themselves.
//!
//! Spawning requires a Tokio runtime.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::AnchorError;

/// Registry of scheduled completion notices.
#[derive(Debug)]
pub struct CompletionTimers {
    shutdown_tx: watch::Sender<bool>,
    shut_down: Arc<RwLock<bool>>,
    timers: Mutex<Vec<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl CompletionTimers {
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            shut_down: Arc::new(RwLock::new(false)),
            timers: Mutex::new(Vec::new()),
            background: Mutex::new(Vec::new()),
        }
    }

    /// Run `fire` once `delay` has elapsed, unless shut down first.
    pub fn schedule<F>(&self, delay: Duration, fire: F) -> Result<CompletionHandle, AnchorError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(AnchorError::ShutDown);
        }
        let deadline = Instant::now() + delay;
        let shutdown_rx = self.shutdown_tx.subscribe();
        let gate = Arc::clone(&self.shut_down);
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown_rx) => {}
                _ = tokio::time::sleep_until(deadline) => {
                    let shut_down = gate.read_recursive();
                    if !*shut_down {
                        fire();
                    }
                }
            }
        });
        let abort = handle.abort_handle();
        let mut timers = self.timers.lock();
        timers.retain(|h| !h.is_finished());
        timers.push(handle);
        Ok(CompletionHandle { abort })
    }

    /// Call `tick` every `period` until it returns `false` or shutdown.
    ///
    /// The first call happens one full period after spawning.
    pub fn spawn_interval<F, Fut>(&self, period: Duration, mut tick: F) -> Result<(), AnchorError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(AnchorError::ShutDown);
        }
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {}
                }
                if *shutdown_rx.borrow() || !tick().await {
                    break;
                }
            }
        });
        self.background.lock().push(handle);
        Ok(())
    }

    /// Completion timers that have not fired or been cancelled yet.
    pub fn pending(&self) -> usize {
        let mut timers = self.timers.lock();
        timers.retain(|h| !h.is_finished());
        timers.len()
    }

    /// Cancel every timer and background task. Returns how many timers were
    /// still pending.
    pub fn shutdown(&self) -> usize {
        *self.shut_down.write() = true;
        self.shutdown_tx.send_replace(true);
        let mut cancelled = 0;
        for handle in self.timers.lock().drain(..) {
            if !handle.is_finished() {
                cancelled += 1;
            }
            handle.abort();
        }
        for handle in self.background.lock().drain(..) {
            handle.abort();
        }
        cancelled
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shut_down.read_recursive()
    }
}

impl Default for CompletionTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CompletionTimers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Handle to one scheduled completion notice.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    abort: AbortHandle,
}

impl CompletionHandle {
    /// Cancel the notice if it has not fired yet.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// True once the notice fired or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}
