//! # Engine configuration.
//!
//! Provides [`EngineConfig`], the settings consumed by [`Engine::new`](crate::Engine::new)
//! and [`EngineBuilder`](crate::EngineBuilder).
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited admission (still counted)
//! - `heartbeat_interval = 0s` → no heartbeat loop
//! - `queue_capacity`/`worker_count` below 1 are raised to 1

use std::time::Duration;

use crate::admission::AdmissionRules;

/// Settings for the dispatch engine.
///
/// ## Field semantics
/// - `queue_capacity`: bounded queue size; publishers wait when it is full
/// - `worker_count`: number of concurrent dispatch loops
/// - `max_concurrent`: top-level pipelines allowed in flight (`0` = unlimited)
/// - `heartbeat_interval`: period of `Tick` events (`0s` = disabled)
/// - `admission`: which kinds open and close a pipeline
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to sprinkling sentinel
/// checks across the code.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Capacity of the event queue (min 1).
    pub queue_capacity: usize,

    /// Number of worker loops (min 1).
    pub worker_count: usize,

    /// Maximum number of admitted top-level pipelines.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = at most `n` pipelines between top-level and terminal event
    pub max_concurrent: usize,

    /// Interval between `Tick` events.
    ///
    /// `Duration::ZERO` disables the heartbeat.
    pub heartbeat_interval: Duration,

    /// Admission classification of event kinds.
    pub admission: AdmissionRules,
}

impl EngineConfig {
    /// Returns the admission limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` pipelines
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the heartbeat period, or `None` if disabled.
    #[inline]
    pub fn heartbeat(&self) -> Option<Duration> {
        if self.heartbeat_interval == Duration::ZERO {
            None
        } else {
            Some(self.heartbeat_interval)
        }
    }

    /// Returns a queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Returns a worker count clamped to a minimum of 1.
    #[inline]
    pub fn worker_count_clamped(&self) -> usize {
        self.worker_count.max(1)
    }
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - `queue_capacity = 32`
    /// - `worker_count = 5`
    /// - `max_concurrent = 2`
    /// - `heartbeat_interval = 1s`
    /// - `admission = AdmissionRules::default()`
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            worker_count: 5,
            max_concurrent: 2,
            heartbeat_interval: Duration::from_secs(1),
            admission: AdmissionRules::default(),
        }
    }
}
