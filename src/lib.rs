//! # eventvisor
//!
//! **Eventvisor** is an in-process asynchronous event engine for Rust.
//!
//! Events are queued in a bounded, back-pressured channel, dispatched to a pool
//! of workers, and handed to one user [`Handler`] that may publish follow-up
//! events. Chains of events form multi-stage pipelines; the engine bounds how
//! many pipelines run at once, helps fan-out/fan-in stages finish exactly once,
//! and stops without losing queued work.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller ─► Engine::publish ─┐          handler ─► Publisher::publish ─┐
//!                              ▼                                          │
//! ┌──────────────────────────────────────────────────────────────────┐    │
//! │  Engine                                                          │◄───┘
//! │  - bounded mpsc queue (waits when full)                          │
//! │  - AdmissionController (shared counter, keyed by event kind)     │
//! │  - heartbeat (Tick every interval)                               │
//! └──────┬──────────────────┬──────────────────┬─────────────────────┘
//!        ▼                  ▼                  ▼
//!     worker 0           worker 1   ...     worker N-1
//!        │ admit / reject / release by kind
//!        └──► Handler::handle(event, publisher)   (panics caught)
//!                  │
//!                  ├─ quick work inline
//!                  ├─ slow work ─► Stage (deadline, retry) ─► exactly one event on exit
//!                  └─ fan-out  ─► SessionRegistry ─► exactly one fan-in winner
//! ```
//!
//! ### Pipeline lifecycle
//! ```text
//! UserInputReceived ─► admitted? ── no ─► dropped, counted as rejected
//!        │ yes (active += 1)
//!        ▼
//!   intermediate stages (never subject to admission)
//!        ▼
//! SummaryComplete | Timeout | Error ─► active -= 1 (clamped at 0)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                                 |
//! |-------------------|----------------------------------------------------------|-------------------------------------------|
//! | **Engine**        | Queue, workers, heartbeat, deterministic stop.           | [`Engine`], [`EngineConfig`], [`EngineStats`] |
//! | **Handlers**      | The single seam for pipeline logic.                      | [`Handler`], [`HandlerFn`], [`Publisher`] |
//! | **Admission**     | Counter-based load shedding of top-level events.         | [`AdmissionController`], [`AdmissionRules`] |
//! | **Sessions**      | Fan-out/fan-in with an exactly-once completion.          | [`SessionRegistry`], [`RecordOutcome`]    |
//! | **Stages**        | Background units with deadline, retry, publish-on-exit.  | [`Stage`], [`RetryPolicy`], [`BackoffPolicy`] |
//! | **Errors**        | Typed errors with stable labels.                         | [`EngineError`], [`PublishError`], [`StageError`] |
//!
//! ## Optional features
//! - `research` _(default)_: the research assistant pipeline in [`research`].
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use eventvisor::{Engine, EngineConfig, Event, EventKind, HandlerFn, Publisher, Stage, StageError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = HandlerFn::arc("echo", |ev: Event, p: Publisher| async move {
//!         match ev.kind {
//!             EventKind::UserInputReceived => {
//!                 let topic = ev.as_text().unwrap_or_default().to_string();
//!                 Stage::new("echo", ev.kind)
//!                     .with_deadline(Duration::from_secs(1))
//!                     .spawn(p, move |_ctx| {
//!                         let topic = topic.clone();
//!                         async move {
//!                             Ok::<_, StageError>(Event::text(EventKind::SummaryComplete, topic))
//!                         }
//!                     });
//!             }
//!             EventKind::SummaryComplete => println!("done: {:?}", ev.as_text()),
//!             _ => {}
//!         }
//!     });
//!
//!     let engine = Engine::new(EngineConfig::default(), handler);
//!     engine.start()?;
//!     engine.publish(Event::text(EventKind::UserInputReceived, "hello")).await?;
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     engine.stop().await;
//!     Ok(())
//! }
//! ```

pub mod admission;
mod core;
mod error;
pub mod events;
mod handlers;
pub mod policies;
#[cfg(feature = "research")]
pub mod research;
pub mod sessions;

// ---- Public re-exports ----

pub use crate::core::shutdown;
pub use crate::core::{Engine, EngineBuilder, EngineConfig, EngineStats, Publisher, Stage};
pub use admission::{AdmissionClass, AdmissionController, AdmissionRules};
pub use error::{EngineError, PublishError, SessionError, StageError};
pub use events::{Event, EventKind, Payload, PipelineId};
pub use handlers::{Handler, HandlerFn, HandlerRef};
pub use policies::{BackoffPolicy, JitterPolicy, RetryPolicy};
pub use sessions::{
    Begin, CompletedSession, RecordOutcome, SessionId, SessionRegistry, SessionSnapshot, SubResult,
};
