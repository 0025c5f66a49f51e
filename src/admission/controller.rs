//! Admission counter shared by all workers, keyed by pipeline id.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::events::PipelineId;

/// Bounds the number of concurrently active top-level pipelines.
///
/// The slot count is a single CAS loop (`fetch_update`), so racing workers can
/// never push `active` past the limit or below zero. Each admitted pipeline is
/// also remembered by id, and only removing that id frees its slot: a pipeline
/// releases at most once no matter how many terminal events it produces.
#[derive(Debug)]
pub struct AdmissionController {
    active: AtomicUsize,
    held: Mutex<HashSet<PipelineId>>,
    /// `None` = unlimited.
    limit: Option<usize>,
}

impl AdmissionController {
    /// Creates a controller. `limit = None` admits everything (still counted).
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            active: AtomicUsize::new(0),
            held: Mutex::new(HashSet::new()),
            limit,
        }
    }

    /// Atomically admits pipeline `id` if there is room.
    ///
    /// Returns `false` when the limit is reached or `id` is already admitted.
    pub fn try_admit(&self, id: PipelineId) -> bool {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if held.contains(&id) {
            return false;
        }
        let limit = self.limit.unwrap_or(usize::MAX);
        let admitted = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok();
        if admitted {
            held.insert(id);
        }
        admitted
    }

    /// Releases the slot held by pipeline `id`.
    ///
    /// Returns `false` when `id` holds nothing (never admitted, or already
    /// released by an earlier terminal event).
    pub fn release(&self, id: PipelineId) -> bool {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.remove(&id) {
            return false;
        }
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        true
    }

    /// Returns true while pipeline `id` holds a slot.
    pub fn is_held(&self, id: PipelineId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
    }

    /// Number of pipelines currently admitted.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Configured ceiling (`None` = unlimited).
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}
