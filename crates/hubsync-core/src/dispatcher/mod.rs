//! Fixed-size worker pool draining the conflation manager's ready queue.
//!
//! Each worker loops: take the most urgent ready slot, move it in flight,
//! run the registered handler under a deadline, record the outcome and
//! release the slot. The slot is always released, whatever the handler did.


use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::conflation::{ConflationManager, ReadyBundle};
use crate::error::HandlerError;
use crate::storage::StatusStore;

/// Worker pool bound to one manager and one store.
pub struct WorkerPool {
    manager: Arc<ConflationManager>,
    store: Arc<dyn StatusStore>,
    size: usize,
    handler_timeout: Duration,
    idle: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(
        manager: Arc<ConflationManager>,
        store: Arc<dyn StatusStore>,
        size: usize,
        handler_timeout: Duration,
    ) -> Self {
        Self { manager, store, size, handler_timeout, idle: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_workers(&self) -> usize {
        self.idle.load(Ordering::SeqCst)
    }

    /// Spawn the workers. They stop once `shutdown_rx` flips or its sender
    /// is dropped; a handler already running finishes (bounded by the
    /// deadline) and its slot is released first.
    pub fn start(&self, shutdown_rx: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.idle.store(self.size, Ordering::SeqCst);
        self.manager.statistics().set_idle_workers(self.size);
        tracing::info!(
            "Starting {} workers (handler timeout {:?})",
            self.size,
            self.handler_timeout
        );

        (0..self.size)
            .map(|id| {
                let worker = Worker {
                    id,
                    manager: Arc::clone(&self.manager),
                    store: Arc::clone(&self.store),
                    handler_timeout: self.handler_timeout,
                    idle: Arc::clone(&self.idle),
                };
                tokio::spawn(worker.run(shutdown_rx.clone()))
            })
            .collect()
    }
}

struct Worker {
    id: usize,
    manager: Arc<ConflationManager>,
    store: Arc<dyn StatusStore>,
    handler_timeout: Duration,
    idle: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let key = match self.manager.next_ready() {
                Some(key) => key,
                None => {
                    tokio::select! {
                        () = self.manager.wait_ready() => {}
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                break;
                            }
                        }
                    }
                    continue;
                },
            };
            let Some(ready) = self.manager.select(&key) else {
                continue;
            };

            self.set_busy(true);
            self.process(ready).await;
            self.set_busy(false);
        }
        tracing::debug!("Worker {} stopped", self.id);
    }

    fn set_busy(&self, busy: bool) {
        let idle = if busy {
            self.idle.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
        } else {
            self.idle.fetch_add(1, Ordering::SeqCst).saturating_add(1)
        };
        self.manager.statistics().set_idle_workers(idle);
    }

    async fn process(&self, ready: ReadyBundle) {
        let statistics = self.manager.statistics();
        let bundle_type = ready.registration.bundle_type();
        statistics.record_queueing(bundle_type, ready.enqueued_at.elapsed());

        let started = Instant::now();
        let result = self.invoke(&ready).await;
        let elapsed = started.elapsed();
        let ok = result.is_ok();

        match &result {
            Ok(()) => tracing::debug!(
                "[worker {}] {} v{} applied in {:?}",
                self.id,
                ready.key,
                ready.bundle.version(),
                elapsed
            ),
            Err(err) => tracing::warn!(
                "[worker {}] {} v{} failed after {:?}: {}",
                self.id,
                ready.key,
                ready.bundle.version(),
                elapsed,
                err
            ),
        }

        statistics.record_processing(bundle_type, elapsed, ok);
        self.manager.complete(&ready.key, ok);
    }

    async fn invoke(&self, ready: &ReadyBundle) -> Result<(), HandlerError> {
        let handler = ready.registration.handler();
        let call = AssertUnwindSafe(handler.handle(&ready.bundle, self.store.as_ref())).catch_unwind();

        match tokio::time::timeout(self.handler_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HandlerError::Panicked),
            Err(_) => Err(HandlerError::Timeout(self.handler_timeout)),
        }
    }
}
