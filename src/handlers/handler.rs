//! # The handler seam.
//!
//! One [`Handler`] receives every event the engine dispatches. It runs on a
//! worker and may publish follow-up events through the supplied [`Publisher`].
//! Long-running work should be offloaded through [`Stage`](crate::Stage) so the
//! worker returns to the queue quickly.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Publisher;
use crate::events::Event;

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// # Event handler invoked by engine workers.
///
/// Handlers are called concurrently from several workers, so any state they
/// keep must be shareable. Failures are reported by publishing events, never
/// by returning errors; a panic is caught by the worker.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use eventvisor::{Event, EventKind, Handler, Publisher};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Handler for Echo {
///     async fn handle(&self, event: Event, publisher: Publisher) {
///         if event.kind == EventKind::UserInputReceived {
///             let _ = publisher.publish(Event::new(EventKind::SummaryComplete)).await;
///         }
///     }
///
///     fn name(&self) -> &'static str { "echo" }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Processes one event.
    async fn handle(&self, event: Event, publisher: Publisher);

    /// Stable name used in logs.
    fn name(&self) -> &'static str {
        "handler"
    }
}
