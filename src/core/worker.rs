//! # Dispatch loop run by each engine worker.
//!
//! ```text
//! loop:
//!   lock shared receiver ─► recv() ─► unlock
//!        │ None (queue closed and empty) → exit
//!        ▼
//!   classify(kind):
//!     TopLevel    → try_admit(new id) ─ full → drop event, count rejected
//!                   └ ok → event.pipeline = id
//!     Terminal    → release(event.pipeline)
//!     Passthrough → -
//!        ▼
//!   handler.handle(event, publisher scoped to event.pipeline)   (catch_unwind)
//!        └─ panic → count; if the event belongs to a pipeline and is not
//!                   terminal, publish Error{origin = kind, pipeline}
//! ```
//!
//! ## Rules
//! - The receiver lock is released before the handler runs.
//! - Terminal events release **before** the handler runs, so a handler that
//!   immediately publishes a new top-level event can reuse the slot.
//! - A panic never ends the loop.
//! - A panic outside any pipeline is logged only; it can never free a slot
//!   owned by another pipeline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, trace, warn};

use crate::admission::{AdmissionClass, AdmissionController, AdmissionRules};
use crate::core::{Publisher, panic_info, stats::Counters};
use crate::events::{Event, EventKind, PipelineId};
use crate::handlers::HandlerRef;

/// State shared by every worker of one engine.
pub(crate) struct Dispatch {
    pub(crate) handler: HandlerRef,
    pub(crate) admission: AdmissionController,
    pub(crate) rules: AdmissionRules,
    pub(crate) counters: Counters,
}

impl Dispatch {
    /// Releases the slot of `pipeline`, counting it. Returns false if nothing was held.
    pub(crate) fn release(&self, pipeline: PipelineId) -> bool {
        let released = self.admission.release(pipeline);
        if released {
            self.counters.released();
        }
        released
    }
}

pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) rx: Arc<Mutex<mpsc::Receiver<Event>>>,
    pub(crate) dispatch: Arc<Dispatch>,
    pub(crate) publisher: Publisher,
}

impl Worker {
    /// Runs until the queue is closed and drained.
    pub(crate) async fn run(self) {
        debug!(worker = self.id, "worker started");
        loop {
            let next = {
                let mut rx = self.rx.lock().await;
                rx.recv().await
            };
            let Some(event) = next else { break };
            self.dispatch(event).await;
        }
        debug!(worker = self.id, "worker drained");
    }

    async fn dispatch(&self, mut event: Event) {
        let d = &*self.dispatch;
        let kind = event.kind;
        d.counters.dispatched();

        let class = d.rules.classify(kind);
        match class {
            AdmissionClass::TopLevel => {
                let pipeline = PipelineId::next();
                if !d.admission.try_admit(pipeline) {
                    d.counters.rejected();
                    debug!(
                        worker = self.id,
                        seq = event.seq,
                        kind = %kind,
                        active = d.admission.active(),
                        "pipeline rejected: admission limit reached"
                    );
                    return;
                }
                event.pipeline = Some(pipeline);
                d.counters.admitted();
                debug!(worker = self.id, seq = event.seq, %pipeline, active = d.admission.active(), "pipeline admitted");
            }
            AdmissionClass::Terminal => match event.pipeline {
                Some(pipeline) if d.release(pipeline) => {
                    debug!(worker = self.id, seq = event.seq, kind = %kind, %pipeline, active = d.admission.active(), "pipeline released");
                }
                pipeline => {
                    debug!(worker = self.id, seq = event.seq, kind = %kind, ?pipeline, "terminal event without held slot");
                }
            },
            AdmissionClass::Passthrough => {
                trace!(worker = self.id, seq = event.seq, kind = %kind, "dispatching");
            }
        }

        let pipeline = event.pipeline;
        let fut = d.handler.handle(event, self.publisher.scoped(pipeline));
        if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
            let info = panic_info(&*panic_err);
            d.counters.panicked();
            error!(
                worker = self.id,
                handler = d.handler.name(),
                kind = %kind,
                ?pipeline,
                panic = %info,
                "handler panicked"
            );
            match pipeline {
                Some(pipeline) if class != AdmissionClass::Terminal => {
                    self.report_panic(kind, pipeline, info).await;
                }
                _ => {}
            }
        }
    }

    /// Publishes an `Error` that ends `pipeline`; releases directly if the
    /// engine no longer accepts events.
    async fn report_panic(&self, kind: EventKind, pipeline: PipelineId, info: String) {
        let ev = Event::error(kind, format!("handler panicked: {info}")).with_pipeline(pipeline);
        if self.publisher.publish(ev).await.is_err() && self.dispatch.release(pipeline) {
            warn!(worker = self.id, kind = %kind, %pipeline, "engine closed; released slot of panicked pipeline");
        }
    }
}
