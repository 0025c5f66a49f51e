//! Pipeline events: kinds and payloads.
//!
//! This module holds the event **data model** shared by the engine, the
//! admission controller, handlers and detached stages.
//!
//! ## Contents
//! - [`EventKind`] event classification (open via `Custom`)
//! - [`Payload`] kind-specific data (text, time or any typed value)
//! - [`Event`] immutable unit of work flowing through the queue
//! - [`PipelineId`] identity of an admitted pipeline, carried by its events
//!
//! ## Quick reference
//! - **Publishers**: callers via `Engine::publish`, handlers via `Publisher`,
//!   the heartbeat loop, detached stages, and workers (panic reports).
//! - **Consumer**: exactly one worker per event.

mod event;

pub use event::{Event, EventKind, Payload, PipelineId};
