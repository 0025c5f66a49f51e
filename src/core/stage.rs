//! # Detached pipeline stages.
//!
//! A [`Stage`] runs one long-running unit of pipeline work (a search, a model
//! call) off the worker that triggered it, under a deadline and an optional
//! retry policy. When spawned, it publishes **exactly one** event on exit.
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   attempt(child) → Ok(follow_up)        → publish follow_up
//!
//! Failure:
//!   attempt(child) → Err(Failed)          → retry? ─ yes → sleep(backoff) → next attempt
//!                                                  └ no  → publish Error{origin}
//!   attempt(child) → Err(Fatal) / panic   → publish Error{origin}
//!
//! Timeout:
//!   deadline exceeded → cancel child      → publish Timeout{origin}
//!
//! Cancellation:
//!   stage token fired                     → publish Timeout{origin, reason = "cancelled"}
//! ```
//!
//! ## Rules
//! - The deadline applies **per attempt**; timeouts are never retried
//! - Each attempt gets a **child token**, cancelled when its deadline passes
//! - Attempts run sequentially; backoff sleeps abort on cancellation
//! - If the engine no longer accepts events the outcome is dropped and logged
//! - The outcome inherits the pipeline of the publisher passed to `spawn`, so a
//!   `Timeout`/`Error` ends the pipeline that started the stage
//!
//! ## Example
//! ```rust
//! # async fn demo(publisher: eventvisor::Publisher) {
//! use std::time::Duration;
//! use eventvisor::{Event, EventKind, Stage, StageError};
//!
//! Stage::new("search", EventKind::SearchRequested)
//!     .with_deadline(Duration::from_secs(30))
//!     .spawn(publisher, |_ctx| async {
//!         Ok::<_, StageError>(Event::text(EventKind::SearchCompleted, "3 hits"))
//!     });
//! # }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::{Publisher, panic_info};
use crate::error::StageError;
use crate::events::{Event, EventKind};
use crate::policies::RetryPolicy;

/// Deadline-bound unit of background work that reports through one event.
#[derive(Clone, Debug)]
pub struct Stage {
    name: &'static str,
    origin: EventKind,
    deadline: Option<Duration>,
    retry: RetryPolicy,
    token: CancellationToken,
}

impl Stage {
    /// Creates a stage with no deadline, a single attempt and its own token.
    ///
    /// `origin` is recorded on the `Timeout`/`Error` event the stage publishes
    /// when it gives up.
    pub fn new(name: &'static str, origin: EventKind) -> Self {
        Self {
            name,
            origin,
            deadline: None,
            retry: RetryPolicy::once(),
            token: CancellationToken::new(),
        }
    }

    /// Sets the per-attempt deadline (`Duration::ZERO` = none).
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = (deadline > Duration::ZERO).then_some(deadline);
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Uses `token` to cancel the stage from outside.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Stage name used in logs and failure reasons.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Token that cancels this stage.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    /// Runs the stage on a new tokio task and publishes its outcome.
    pub fn spawn<F, Fut>(self, publisher: Publisher, attempt_fn: F) -> JoinHandle<()>
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Event, StageError>> + Send + 'static,
    {
        tokio::spawn(async move {
            let event = match self.run(attempt_fn).await {
                Ok(follow_up) => follow_up,
                Err(err) => self.failure_event(&err),
            };
            let kind = event.kind;
            if publisher.publish(event).await.is_err() {
                debug!(stage = self.name, kind = %kind, "engine closed; stage outcome dropped");
            }
        })
    }

    /// Runs attempts in place until one succeeds or the stage gives up.
    ///
    /// Nothing is published; callers that fold failures into their own
    /// follow-up event use this instead of [`Stage::spawn`].
    pub async fn run<T, F, Fut>(&self, mut attempt_fn: F) -> Result<T, StageError>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if self.token.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            attempt += 1;

            let child = self.token.child_token();
            let err = match self.attempt(attempt_fn(child.clone()), &child).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.retry.should_retry(attempt, &err) {
                return Err(err);
            }
            let delay = self.retry.backoff.delay_for(attempt);
            warn!(stage = self.name, attempt, ?delay, error = %err, "stage attempt failed; retrying");

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(StageError::Cancelled),
                _ = time::sleep(delay) => {}
            }
        }
    }

    /// Builds the `Timeout`/`Error` event reported for `err`, logging it.
    pub fn failure_event(&self, err: &StageError) -> Event {
        match err {
            StageError::Cancelled => {
                debug!(stage = self.name, "stage cancelled");
                Event::timeout(self.origin, "cancelled")
            }
            StageError::Timeout { .. } => {
                warn!(stage = self.name, error = %err, "stage deadline exceeded");
                Event::timeout(self.origin, format!("{} {err}", self.name))
            }
            _ => {
                error!(stage = self.name, label = err.as_label(), error = %err, "stage gave up");
                Event::error(self.origin, format!("{}: {err}", self.name))
            }
        }
    }

    async fn attempt<T, Fut>(&self, fut: Fut, child: &CancellationToken) -> Result<T, StageError>
    where
        Fut: Future<Output = Result<T, StageError>>,
    {
        let guarded = AssertUnwindSafe(fut).catch_unwind();
        let outcome = match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => return Err(StageError::Cancelled),
                    res = time::timeout(deadline, guarded) => match res {
                        Ok(outcome) => outcome,
                        Err(_elapsed) => {
                            child.cancel();
                            return Err(StageError::Timeout { timeout: deadline });
                        }
                    },
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => return Err(StageError::Cancelled),
                    outcome = guarded => outcome,
                }
            }
        };

        outcome.unwrap_or_else(|panic_err| {
            Err(StageError::Panicked {
                info: panic_info(&*panic_err),
            })
        })
    }
}
