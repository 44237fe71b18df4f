//! Reuse of built workers across runs.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use super::Worker;

/// Two-tier cache of ready-to-run workers.
///
/// The first tier is a fixed-capacity LIFO stack behind a mutex; workers that
/// do not fit spill into an unbounded overflow queue. A capacity of zero
/// disables the first tier.
pub struct WorkerPool {
    cache: Mutex<Vec<Arc<Worker>>>,
    capacity: usize,
    overflow_tx: Sender<Arc<Worker>>,
    overflow_rx: Receiver<Arc<Worker>>,
}

impl WorkerPool {
    /// Create a pool whose first tier holds up to `capacity` workers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (overflow_tx, overflow_rx) = unbounded();
        Self {
            cache: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            overflow_tx,
            overflow_rx,
        }
    }

    /// Take a cached worker, most recently returned first.
    #[must_use]
    pub fn get(&self) -> Option<Arc<Worker>> {
        if self.capacity > 0 {
            if let Some(worker) = self.cache.lock().pop() {
                return Some(worker);
            }
        }
        self.overflow_rx.try_recv().ok()
    }

    /// Return a worker for reuse.
    pub fn put(&self, worker: Arc<Worker>) {
        if self.capacity > 0 {
            let mut cache = self.cache.lock();
            if cache.len() < self.capacity {
                cache.push(worker);
                return;
            }
        }
        // The pool owns the receiver, so the send cannot fail.
        let _ = self.overflow_tx.send(worker);
    }

    /// Drop every cached worker.
    pub fn reset(&self) {
        self.cache.lock().clear();
        while self.overflow_rx.try_recv().is_ok() {}
    }

    /// Number of cached workers across both tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().len() + self.overflow_rx.len()
    }

    /// Returns `true` if no worker is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity of the first tier.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .field("cached", &self.cache.lock().len())
            .field("overflow", &self.overflow_rx.len())
            .finish()
    }
}
