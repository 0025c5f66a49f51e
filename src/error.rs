//! Error types used by the eventvisor engine, sessions and stages.
//!
//! - [`EngineError`]: lifecycle misuse of the engine itself.
//! - [`PublishError`]: an event could not be enqueued.
//! - [`SessionError`]: fan-out registration failed.
//! - [`StageError`]: a detached stage gave up.
//!
//! All of them provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by engine lifecycle calls.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// `start` was called on an engine that is already running.
    #[error("engine already started")]
    AlreadyStarted,

    /// `start` was called after `stop`.
    #[error("engine stopped")]
    Stopped,

    /// `start` was called outside a tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventvisor::EngineError;
    ///
    /// assert_eq!(EngineError::Stopped.as_label(), "engine_stopped");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::AlreadyStarted => "engine_already_started",
            EngineError::Stopped => "engine_stopped",
            EngineError::NoRuntime => "engine_no_runtime",
        }
    }
}

/// # Errors returned when publishing an event.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The engine stopped accepting events (stop has begun or completed).
    #[error("event queue closed")]
    Closed,

    /// The queue is full (only from `try_publish`).
    #[error("event queue full")]
    Full,
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Closed => "publish_closed",
            PublishError::Full => "publish_full",
        }
    }
}

/// # Errors produced by the session registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A session with this id is already registered.
    #[error("session {id} already exists")]
    AlreadyExists {
        /// The duplicated id.
        id: String,
    },
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::AlreadyExists { .. } => "session_already_exists",
        }
    }
}

/// # Errors produced by detached stages.
///
/// Each variant maps to the terminal event a stage publishes on exit:
/// `Timeout`/`Cancelled` become [`EventKind::Timeout`](crate::EventKind::Timeout),
/// `Failed`/`Panicked` become [`EventKind::Error`](crate::EventKind::Error).
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum StageError {
    /// Stage exceeded its deadline.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Stage failed; may succeed if retried.
    #[error("stage failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// Stage failed and must not be retried.
    #[error("fatal stage error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Stage was cancelled by its token.
    #[error("stage cancelled")]
    Cancelled,

    /// Stage task panicked.
    #[error("stage panicked: {info}")]
    Panicked {
        /// Panic message, if one could be extracted.
        info: String,
    },
}

impl StageError {
    /// Convenience constructor for a retryable failure.
    pub fn failed(error: impl ToString) -> Self {
        StageError::Failed {
            error: error.to_string(),
        }
    }

    /// Convenience constructor for a non-retryable failure.
    pub fn fatal(error: impl ToString) -> Self {
        StageError::Fatal {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventvisor::StageError;
    /// use std::time::Duration;
    ///
    /// let err = StageError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "stage_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StageError::Timeout { .. } => "stage_timeout",
            StageError::Failed { .. } => "stage_failed",
            StageError::Fatal { .. } => "stage_fatal",
            StageError::Cancelled => "stage_cancelled",
            StageError::Panicked { .. } => "stage_panicked",
        }
    }

    /// Indicates whether another attempt may help.
    ///
    /// Returns `true` for [`StageError::Failed`] only: a timeout already consumed
    /// the stage's whole deadline.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Failed { .. })
    }

    /// Returns true if the stage should report through a `Timeout` event.
    pub fn is_timeout_like(&self) -> bool {
        matches!(self, StageError::Timeout { .. } | StageError::Cancelled)
    }
}
