//! # Closure-backed handler (`HandlerFn`).
//!
//! [`HandlerFn`] wraps `F: Fn(Event, Publisher) -> Fut`, producing a fresh
//! future per event. Shared state goes into the closure explicitly behind an `Arc`.
//!
//! ## Example
//! ```rust
//! use eventvisor::{Event, Handler, HandlerFn, HandlerRef, Publisher};
//!
//! let h: HandlerRef = HandlerFn::arc("noop", |_ev: Event, _p: Publisher| async {});
//! assert_eq!(h.name(), "noop");
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Publisher;
use crate::events::Event;
use crate::handlers::handler::Handler;

/// Closure-backed handler.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: &'static str,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new closure-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](crate::HandlerRef).
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    /// Creates the handler and returns it behind an `Arc`.
    pub fn arc(name: &'static str, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Event, Publisher) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, event: Event, publisher: Publisher) {
        (self.f)(event, publisher).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
