//! # Pipeline events flowing through the engine.
//!
//! The [`EventKind`] enum classifies events across three groups:
//! - **System events**: emitted by the engine itself (`Tick`, `Heartbeat`, `Log`)
//! - **Stage events**: steps of a pipeline (`UserInputReceived` ... `SummaryComplete`)
//! - **Terminal failures**: `Timeout` and `Error`, published when a stage gives up
//!
//! The [`Event`] struct pairs a kind with a [`Payload`] plus a little metadata
//! (sequence number, timestamp, failure reason, origin kind, owning pipeline).
//!
//! ## Pipeline identity
//! A worker stamps a fresh [`PipelineId`] on every admitted top-level event.
//! The [`Publisher`](crate::Publisher) handed to the handler carries that id
//! onto every follow-up event that does not set one, so stages, fan-out
//! sub-tasks and the final terminal event all belong to the same pipeline.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! The queue is FIFO, but events finish on different workers, so use `seq` to restore
//! publication order in logs.
//!
//! ## Example
//! ```rust
//! use eventvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::Error)
//!     .with_reason("search backend unreachable")
//!     .with_origin(EventKind::SearchRequested);
//!
//! assert_eq!(ev.kind, EventKind::Error);
//! assert_eq!(ev.reason.as_deref(), Some("search backend unreachable"));
//! assert_eq!(ev.origin, Some(EventKind::SearchRequested));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Global counter for pipeline ids.
static PIPELINE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identity of one admitted pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(u64);

impl PipelineId {
    /// Allocates a fresh, process-unique id.
    pub fn next() -> Self {
        Self(PIPELINE_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Numeric value of the id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Classification of pipeline events.
///
/// The set is open: handler logic can introduce its own kinds through
/// [`EventKind::Custom`] without touching the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === System events ===
    /// Liveness notification published by hosts (not by the engine).
    Heartbeat,

    /// Periodic tick published by the engine heartbeat loop.
    ///
    /// Carries `Payload::Time` with the wall-clock time of the tick.
    Tick,

    /// Free-form log line routed through the pipeline.
    Log,

    // === Stage events ===
    /// A new top-level request entered the system (starts a pipeline).
    UserInputReceived,

    /// One sub-query of a fan-out should be searched.
    SearchRequested,

    /// One sub-query finished (successfully or not).
    SearchCompleted,

    /// All searches of a session are in; analysis should begin.
    AnalysisRequested,

    /// Analysis produced structured findings.
    StructuredDataReady,

    /// Report and summary text are ready to be finalized.
    SummaryRequested,

    /// Pipeline finished; output is ready.
    SummaryComplete,

    // === Terminal failures ===
    /// A stage exceeded its deadline (or was cancelled).
    ///
    /// Sets `reason` and usually `origin`.
    Timeout,

    /// A stage failed, or a handler panicked.
    ///
    /// Sets `reason` and usually `origin`.
    Error,

    /// Kind defined by handler logic.
    Custom(&'static str),
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::Heartbeat => "heartbeat",
            EventKind::Tick => "tick",
            EventKind::Log => "log",
            EventKind::UserInputReceived => "user_input_received",
            EventKind::SearchRequested => "search_requested",
            EventKind::SearchCompleted => "search_completed",
            EventKind::AnalysisRequested => "analysis_requested",
            EventKind::StructuredDataReady => "structured_data_ready",
            EventKind::SummaryRequested => "summary_requested",
            EventKind::SummaryComplete => "summary_complete",
            EventKind::Timeout => "timeout",
            EventKind::Error => "error",
            EventKind::Custom(name) => name,
        }
    }

    /// Returns true for engine-internal liveness kinds.
    #[inline]
    pub fn is_liveness(&self) -> bool {
        matches!(self, EventKind::Tick | EventKind::Heartbeat)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Kind-specific data carried by an [`Event`].
///
/// Payloads are immutable and cheap to clone (everything non-trivial sits behind an `Arc`).
#[derive(Clone, Default)]
pub enum Payload {
    /// No data.
    #[default]
    Empty,
    /// Plain text (prompts, log lines, messages).
    Text(Arc<str>),
    /// A point in time (ticks, heartbeats).
    Time(SystemTime),
    /// Any typed value; read it back with [`Event::data_ref`].
    Data(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Payload::Time(t) => f.debug_tuple("Time").field(t).finish(),
            Payload::Data(_) => f.write_str("Data(..)"),
        }
    }
}

/// Pipeline event: a kind, a payload and bookkeeping metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - `reason` / `origin`: set on `Timeout`/`Error` events
/// - `pipeline`: the admitted pipeline the event belongs to, if any
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Kind-specific data.
    pub payload: Payload,
    /// Human-readable failure cause.
    pub reason: Option<Arc<str>>,
    /// Kind of the event this one reports on (failures only).
    pub origin: Option<EventKind>,
    /// Pipeline the event belongs to; `None` outside any admitted pipeline.
    pub pipeline: Option<PipelineId>,
}

impl Event {
    /// Creates a new event of the given kind with an empty payload.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            payload: Payload::Empty,
            reason: None,
            origin: None,
            pipeline: None,
        }
    }

    /// Creates a text event (e.g. a user prompt).
    #[inline]
    pub fn text(kind: EventKind, text: impl Into<Arc<str>>) -> Self {
        Self::new(kind).with_payload(Payload::Text(text.into()))
    }

    /// Creates an event carrying a typed value.
    #[inline]
    pub fn data<T: Any + Send + Sync>(kind: EventKind, value: T) -> Self {
        Self::new(kind).with_payload(Payload::Data(Arc::new(value)))
    }

    /// Creates a `Tick` stamped with the current time.
    #[inline]
    pub fn tick() -> Self {
        Self::new(EventKind::Tick).with_payload(Payload::Time(SystemTime::now()))
    }

    /// Creates a `Timeout` event for a stage that gave up.
    pub fn timeout(origin: EventKind, reason: impl Into<Arc<str>>) -> Self {
        Self::new(EventKind::Timeout)
            .with_origin(origin)
            .with_reason(reason)
    }

    /// Creates an `Error` event for a stage that failed.
    pub fn error(origin: EventKind, reason: impl Into<Arc<str>>) -> Self {
        Self::new(EventKind::Error)
            .with_origin(origin)
            .with_reason(reason)
    }

    /// Replaces the payload.
    #[inline]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the kind this event reports on.
    #[inline]
    pub fn with_origin(mut self, origin: EventKind) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Assigns the event to a pipeline.
    #[inline]
    pub fn with_pipeline(mut self, pipeline: PipelineId) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Returns the text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the typed payload if it holds a `T`.
    pub fn data_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        match &self.payload {
            Payload::Data(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sample(u32);

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::Log);
        let b = Event::new(EventKind::Log);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_typed_payload_roundtrips_through_clone() {
        let ev = Event::data(EventKind::Custom("sample"), Sample(7));
        let copy = ev.clone();
        assert_eq!(copy.data_ref::<Sample>(), Some(&Sample(7)));
        assert!(copy.data_ref::<String>().is_none());
        assert!(copy.as_text().is_none());
    }

    #[test]
    fn test_failure_constructors_set_reason_and_origin() {
        let ev = Event::timeout(EventKind::AnalysisRequested, "deadline 90s");
        assert_eq!(ev.kind, EventKind::Timeout);
        assert_eq!(ev.origin, Some(EventKind::AnalysisRequested));
        assert_eq!(ev.reason.as_deref(), Some("deadline 90s"));
    }

    #[test]
    fn test_pipeline_ids_are_unique() {
        let a = PipelineId::next();
        let b = PipelineId::next();
        assert_ne!(a, b);
        assert!(Event::new(EventKind::Log).pipeline.is_none());
        assert_eq!(Event::new(EventKind::Log).with_pipeline(a).pipeline, Some(a));
        assert_eq!(format!("{a}"), format!("p{}", a.get()));
    }

    #[test]
    fn test_labels() {
        assert_eq!(EventKind::UserInputReceived.as_label(), "user_input_received");
        assert_eq!(EventKind::Custom("persisted").to_string(), "persisted");
        assert!(EventKind::Tick.is_liveness());
        assert!(!EventKind::Error.is_liveness());
    }
}
