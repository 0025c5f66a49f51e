//! Dispatch counters and their snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of engine counters, returned by [`Engine::stats`](crate::Engine::stats).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Events taken off the queue by a worker.
    pub dispatched: u64,
    /// Top-level events that acquired a slot.
    pub admitted: u64,
    /// Top-level events dropped because the limit was reached.
    pub rejected: u64,
    /// Terminal events that released a slot.
    pub released: u64,
    /// Handler invocations that panicked.
    pub panicked: u64,
    /// Pipelines currently holding a slot.
    pub active: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    dispatched: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    released: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    pub(crate) fn dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, active: usize) -> EngineStats {
        EngineStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            active,
        }
    }
}
