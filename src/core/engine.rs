//! # Engine: bounded queue, worker pool, heartbeat, deterministic stop.
//!
//! The [`Engine`] owns the event queue and the workers draining it. Callers and
//! handlers enqueue through [`Publisher`]s; every dispatched event goes through
//! admission before reaching the handler.
//!
//! ## High-level architecture
//! ```text
//! publish(ev) ──► [bounded mpsc queue] ──► shared receiver (fair mutex)
//!   (waits when full)                          │
//!                              ┌───────────────┼───────────────┐
//!                              ▼               ▼               ▼
//!                          worker 0        worker 1  ...   worker N-1
//!                              │  admission by kind (shared counter)
//!                              └──► handler.handle(ev, publisher) ──► publish(follow-up)
//!
//! heartbeat ── every interval ──► publish(Tick)
//!
//! Stop path:
//!   token.cancel()        → heartbeat exits (pending tick abandoned)
//!   sender slot emptied   → later publishes fail with Closed
//!   queue closes once in-flight publishes finish
//!   workers drain the queue, finish their handler calls, exit
//!   drain task joins every worker, marks the engine Stopped
//!   stop() returns once the engine is Stopped
//! ```
//!
//! ## Rules
//! - Events published before `start` are buffered (up to capacity) and dispatched after it
//! - `start` may be called once; later calls fail with [`EngineError`]
//! - `stop` is idempotent: concurrent and repeated calls all return after the first completes
//! - `stop` is cancel-safe: the drain runs on its own task, so dropping a `stop`
//!   future does not leave the engine half-stopped
//! - Events still queued when `stop` begins are dispatched, never dropped, even
//!   if the engine was never started
//!
//! ## Example
//! ```rust
//! use eventvisor::{Engine, EngineConfig, Event, EventKind, HandlerFn, Publisher};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = HandlerFn::arc("finish", |ev: Event, p: Publisher| async move {
//!         if ev.kind == EventKind::UserInputReceived {
//!             let _ = p.publish(Event::new(EventKind::SummaryComplete)).await;
//!         }
//!     });
//!
//!     let engine = Engine::new(EngineConfig::default(), handler);
//!     engine.start()?;
//!     engine.publish(Event::text(EventKind::UserInputReceived, "rust async runtimes")).await?;
//!     engine.stop().await;
//!
//!     assert_eq!(engine.stats().active, 0);
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::{
    runtime::Handle,
    sync::{Mutex as AsyncMutex, mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::admission::{AdmissionController, AdmissionRules};
use crate::core::{
    EngineConfig, EngineStats, Publisher, heartbeat,
    publisher::SenderSlot,
    stats::Counters,
    worker::{Dispatch, Worker},
};
use crate::error::{EngineError, PublishError};
use crate::events::Event;
use crate::handlers::HandlerRef;

enum Lifecycle {
    Idle(mpsc::Receiver<Event>),
    Running {
        workers: Vec<JoinHandle<()>>,
        heartbeat: Option<JoinHandle<()>>,
    },
    Stopping,
    Stopped,
}

/// Builder for an [`Engine`] with optional overrides of the config.
pub struct EngineBuilder {
    cfg: EngineConfig,
    handler: HandlerRef,
}

impl EngineBuilder {
    /// Creates a builder with the given configuration and handler.
    pub fn new(cfg: EngineConfig, handler: HandlerRef) -> Self {
        Self { cfg, handler }
    }

    /// Sets the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.cfg.queue_capacity = capacity;
        self
    }

    /// Sets the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.cfg.worker_count = workers;
        self
    }

    /// Sets the admission limit (`0` = unlimited).
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.cfg.max_concurrent = max;
        self
    }

    /// Sets the heartbeat interval (`Duration::ZERO` = disabled).
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.cfg.heartbeat_interval = interval;
        self
    }

    /// Replaces the admission rules.
    pub fn with_admission_rules(mut self, rules: AdmissionRules) -> Self {
        self.cfg.admission = rules;
        self
    }

    /// Builds the engine. Nothing runs until [`Engine::start`].
    pub fn build(self) -> Engine {
        let (tx, rx) = mpsc::channel(self.cfg.queue_capacity_clamped());
        let publisher = Publisher::new(Arc::new(SenderSlot::new(tx)));
        let dispatch = Arc::new(Dispatch {
            handler: self.handler,
            admission: AdmissionController::new(self.cfg.concurrency_limit()),
            rules: self.cfg.admission.clone(),
            counters: Counters::default(),
        });
        let (done, _) = watch::channel(false);

        Engine {
            cfg: self.cfg,
            publisher,
            dispatch,
            token: CancellationToken::new(),
            shared: Arc::new(Shared {
                state: Mutex::new(Lifecycle::Idle(rx)),
                done,
            }),
        }
    }
}

/// In-process event engine.
///
/// All methods take `&self`; wrap the engine in an `Arc` to share it.
pub struct Engine {
    cfg: EngineConfig,
    publisher: Publisher,
    dispatch: Arc<Dispatch>,
    token: CancellationToken,
    shared: Arc<Shared>,
}

/// Lifecycle state shared with the drain task.
struct Shared {
    state: Mutex<Lifecycle>,
    done: watch::Sender<bool>,
}

impl Shared {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn spawn_workers(
    runtime: &Handle,
    rx: mpsc::Receiver<Event>,
    dispatch: &Arc<Dispatch>,
    publisher: &Publisher,
    count: usize,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(AsyncMutex::new(rx));
    (0..count)
        .map(|id| {
            let worker = Worker {
                id,
                rx: Arc::clone(&rx),
                dispatch: Arc::clone(dispatch),
                publisher: publisher.clone(),
            };
            runtime.spawn(worker.run())
        })
        .collect()
}

impl Engine {
    /// Creates an engine with the given configuration and handler.
    pub fn new(cfg: EngineConfig, handler: HandlerRef) -> Self {
        EngineBuilder::new(cfg, handler).build()
    }

    /// Returns a builder for an engine.
    pub fn builder(cfg: EngineConfig, handler: HandlerRef) -> EngineBuilder {
        EngineBuilder::new(cfg, handler)
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Launches the workers and the heartbeat on the current tokio runtime.
    pub fn start(&self) -> Result<(), EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let mut state = self.shared.lock_state();

        let rx = match std::mem::replace(&mut *state, Lifecycle::Stopping) {
            Lifecycle::Idle(rx) => rx,
            other => {
                let err = match other {
                    Lifecycle::Stopped => EngineError::Stopped,
                    _ => EngineError::AlreadyStarted,
                };
                *state = other;
                return Err(err);
            }
        };

        let worker_count = self.cfg.worker_count_clamped();
        let workers = spawn_workers(&runtime, rx, &self.dispatch, &self.publisher, worker_count);

        let heartbeat = self.cfg.heartbeat().map(|interval| {
            runtime.spawn(heartbeat::run(
                interval,
                self.publisher.clone(),
                self.token.clone(),
            ))
        });

        *state = Lifecycle::Running { workers, heartbeat };
        info!(
            workers = worker_count,
            queue_capacity = self.cfg.queue_capacity_clamped(),
            max_concurrent = ?self.cfg.concurrency_limit(),
            handler = self.dispatch.handler.name(),
            "engine started"
        );
        Ok(())
    }

    /// Enqueues an event, waiting while the queue is full.
    ///
    /// Fails with [`PublishError::Closed`] once stop has begun.
    pub async fn publish(&self, event: Event) -> Result<(), PublishError> {
        self.publisher.publish(event).await
    }

    /// Enqueues an event without waiting.
    pub fn try_publish(&self, event: Event) -> Result<(), PublishError> {
        self.publisher.try_publish(event)
    }

    /// Returns a publishing handle bound to this engine.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Snapshot of dispatch counters and the current admission count.
    pub fn stats(&self) -> EngineStats {
        self.dispatch
            .counters
            .snapshot(self.dispatch.admission.active())
    }

    /// Returns true while workers are running.
    pub fn is_running(&self) -> bool {
        matches!(*self.shared.lock_state(), Lifecycle::Running { .. })
    }

    /// Stops the engine and waits for the queue to drain.
    ///
    /// Stops accepting events, lets the workers dispatch everything already
    /// queued, and returns once every in-flight handler call has returned.
    /// Calling it again, or concurrently, waits for the first call to finish.
    /// Dropping the returned future does not interrupt the drain.
    pub async fn stop(&self) {
        let mut done = self.shared.done.subscribe();
        let prev = {
            let mut state = self.shared.lock_state();
            match *state {
                Lifecycle::Stopped => return,
                Lifecycle::Stopping => None,
                Lifecycle::Idle(_) | Lifecycle::Running { .. } => {
                    Some(std::mem::replace(&mut *state, Lifecycle::Stopping))
                }
            }
        };

        if let Some(prev) = prev {
            self.token.cancel();
            self.publisher.close();
            let drain = Drain {
                shared: Arc::clone(&self.shared),
                dispatch: Arc::clone(&self.dispatch),
                publisher: self.publisher.clone(),
                worker_count: self.cfg.worker_count_clamped(),
            };
            tokio::spawn(drain.run(prev));
        }

        let _ = done.wait_for(|stopped| *stopped).await;
    }
}

/// Joins the engine's tasks after stop has begun and marks it stopped.
struct Drain {
    shared: Arc<Shared>,
    dispatch: Arc<Dispatch>,
    publisher: Publisher,
    worker_count: usize,
}

impl Drain {
    async fn run(self, prev: Lifecycle) {
        let (workers, heartbeat) = match prev {
            Lifecycle::Idle(rx) => {
                let queued = rx.len();
                if queued > 0 {
                    info!(queued, "engine stopped before start; dispatching queued events");
                }
                let workers = spawn_workers(
                    &Handle::current(),
                    rx,
                    &self.dispatch,
                    &self.publisher,
                    self.worker_count,
                );
                (workers, None)
            }
            Lifecycle::Running { workers, heartbeat } => (workers, heartbeat),
            Lifecycle::Stopping | Lifecycle::Stopped => (Vec::new(), None),
        };

        if let Some(h) = heartbeat {
            if let Err(e) = h.await {
                error!(error = %e, "heartbeat task failed");
            }
        }
        for h in workers {
            if let Err(e) = h.await {
                error!(error = %e, "worker task failed");
            }
        }

        *self.shared.lock_state() = Lifecycle::Stopped;
        self.shared.done.send_replace(true);
        let stats = self
            .dispatch
            .counters
            .snapshot(self.dispatch.admission.active());
        info!(
            dispatched = stats.dispatched,
            rejected = stats.rejected,
            panicked = stats.panicked,
            active = stats.active,
            "engine stopped"
        );
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Workers drain what is queued and exit on their own.
        self.token.cancel();
        self.publisher.close();
    }
}
