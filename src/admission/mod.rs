//! # Admission control for top-level pipelines.
//!
//! The queue absorbs bursts up to its capacity, but only `max_concurrent`
//! pipelines may be **actively processing** at once. Admission is decided when a
//! worker dequeues an event, keyed by the event's kind:
//!
//! ```text
//! dequeue(ev) ──► AdmissionRules::classify(ev.kind)
//!                   ├─ TopLevel ──► try_admit(new id) ─┬─ true  ─► handler runs
//!                   │                                  └─ false ─► Rejected (dropped, counted)
//!                   ├─ Terminal ──► release(ev.pipeline) ─────────► handler runs
//!                   └─ Passthrough ───────────────────────────────► handler runs
//! ```
//!
//! ## Policy
//! Counter-based bouncer: excess top-level events are shed at the door rather
//! than queued. Unrelated kinds are never rejected.
//!
//! ## Invariants
//! - `0 <= active <= limit` at all times.
//! - Admission stamps a fresh [`PipelineId`](crate::PipelineId) on the event;
//!   follow-up events inherit it through the handler's publisher.
//! - A terminal event releases only the slot of the pipeline it carries, and
//!   only once; terminal events without a held pipeline release nothing.

mod controller;
mod rules;

pub use controller::AdmissionController;
pub use rules::{AdmissionClass, AdmissionRules};
