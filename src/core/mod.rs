//! # Runtime core: dispatch, lifecycle and detached stages.
//!
//! The public surface of this module is [`Engine`] (with [`EngineBuilder`]),
//! the [`Publisher`] capability handed to handlers, and [`Stage`] for
//! deadline-bound background work.
//!
//! Internal modules:
//! - [`engine`]: owns the queue, spawns workers and the heartbeat, drives stop;
//! - [`worker`]: dispatch loop with admission and panic isolation;
//! - [`heartbeat`]: periodic `Tick` publisher;
//! - [`publisher`]: sender slot shared by all publishers, closed on stop;
//! - [`stage`]: one unit of background work with deadline, retry and publish-on-exit;
//! - [`shutdown`]: OS signal handling for hosts;
//! - [`stats`]: dispatch counters.

mod config;
mod engine;
mod heartbeat;
mod publisher;
pub mod shutdown;
mod stage;
mod stats;
mod worker;

use std::any::Any;

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use publisher::Publisher;
pub use stage::Stage;
pub use stats::EngineStats;

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_info(panic_err: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic_err.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
