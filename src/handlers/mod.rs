//! # Handler abstractions.
//!
//! - [`Handler`] - trait the engine dispatches every admitted event to
//! - [`HandlerFn`] - closure-backed handler
//! - [`HandlerRef`] - shared handle (`Arc<dyn Handler>`)

mod handler;
mod handler_fn;

pub use handler::{Handler, HandlerRef};
pub use handler_fn::HandlerFn;
