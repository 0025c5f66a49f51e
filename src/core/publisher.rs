//! # Publishing capability handed to handlers and stages.
//!
//! A [`Publisher`] wraps the engine's sender slot. It can enqueue events but
//! cannot stop the engine. Once stop begins the slot is emptied: every later
//! publish fails with [`PublishError::Closed`], and the channel closes as soon
//! as publishes already in progress complete.
//!
//!
//! A publisher handed to a handler is **scoped** to the pipeline of the event
//! being handled: events it publishes without a pipeline id inherit that one.
//!
//! ```text
//! Publisher ──clone sender under read lock──► send().await ──► queue
//!                     ▲
//! Engine::stop ───────┘ takes the sender under write lock
//! ```

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::error::PublishError;
use crate::events::{Event, PipelineId};

/// Shared slot holding the queue's sender until stop.
#[derive(Debug)]
pub(crate) struct SenderSlot {
    tx: RwLock<Option<mpsc::Sender<Event>>>,
}

impl SenderSlot {
    pub(crate) fn new(tx: mpsc::Sender<Event>) -> Self {
        Self {
            tx: RwLock::new(Some(tx)),
        }
    }

    /// Clones the sender; the lock is never held across an await.
    fn sender(&self) -> Option<mpsc::Sender<Event>> {
        self.tx.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drops the stored sender. Returns false if it was already gone.
    pub(crate) fn close(&self) -> bool {
        self.tx
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
    }

    fn is_closed(&self) -> bool {
        self.tx.read().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

/// Cloneable handle that enqueues events into an engine.
#[derive(Clone, Debug)]
pub struct Publisher {
    slot: Arc<SenderSlot>,
    pipeline: Option<PipelineId>,
}

impl Publisher {
    pub(crate) fn new(slot: Arc<SenderSlot>) -> Self {
        Self {
            slot,
            pipeline: None,
        }
    }

    /// Returns a publisher over the same queue that stamps `pipeline` on
    /// events published without one.
    pub fn scoped(&self, pipeline: Option<PipelineId>) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            pipeline,
        }
    }

    /// Pipeline this publisher is scoped to.
    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }

    fn stamp(&self, mut event: Event) -> Event {
        if event.pipeline.is_none() {
            event.pipeline = self.pipeline;
        }
        event
    }

    /// Creates a publisher over a fresh bounded channel, detached from any engine.
    ///
    /// Useful for driving handlers and stages directly in tests.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(Arc::new(SenderSlot::new(tx))), rx)
    }

    /// Enqueues an event, waiting while the queue is full.
    pub async fn publish(&self, event: Event) -> Result<(), PublishError> {
        let tx = self.slot.sender().ok_or(PublishError::Closed)?;
        tx.send(self.stamp(event)).await.map_err(|_| PublishError::Closed)
    }

    /// Enqueues an event without waiting.
    pub fn try_publish(&self, event: Event) -> Result<(), PublishError> {
        let tx = self.slot.sender().ok_or(PublishError::Closed)?;
        tx.try_send(self.stamp(event)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::Full,
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })
    }

    /// Returns true once the engine has stopped accepting events.
    pub fn is_closed(&self) -> bool {
        self.slot.is_closed()
    }

    /// Stops accepting events on this publisher and all of its clones.
    pub(crate) fn close(&self) -> bool {
        self.slot.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_publish_and_close() {
        let (publisher, mut rx) = Publisher::channel(1);
        publisher.publish(Event::new(EventKind::Log)).await.unwrap();
        assert_eq!(
            publisher.try_publish(Event::new(EventKind::Log)),
            Err(PublishError::Full)
        );
        assert_eq!(rx.recv().await.map(|e| e.kind), Some(EventKind::Log));

        let clone = publisher.clone();
        assert!(publisher.close());
        assert!(!clone.close());
        assert!(clone.is_closed());
        assert_eq!(
            clone.publish(Event::new(EventKind::Log)).await,
            Err(PublishError::Closed)
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_scoped_publisher_stamps_pipeline() {
        let (publisher, mut rx) = Publisher::channel(4);
        let id = PipelineId::next();
        let other = PipelineId::next();
        let scoped = publisher.scoped(Some(id));
        assert_eq!(scoped.pipeline(), Some(id));
        assert_eq!(publisher.pipeline(), None);

        scoped.publish(Event::new(EventKind::Log)).await.unwrap();
        scoped
            .try_publish(Event::new(EventKind::Log).with_pipeline(other))
            .unwrap();
        publisher.publish(Event::new(EventKind::Log)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().pipeline, Some(id));
        assert_eq!(rx.recv().await.unwrap().pipeline, Some(other));
        assert_eq!(rx.recv().await.unwrap().pipeline, None);
    }
}
