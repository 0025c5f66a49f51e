//! # Retry policy for stage attempts.
//!
//! [`RetryPolicy`] decides whether a failed stage attempt is tried again.
//!
//! ```text
//! RetryPolicy::once()           → a single attempt, failures are final (default)
//! RetryPolicy::attempts(3, b)   → up to 3 attempts, pausing per BackoffPolicy `b`
//! ```
//!
//! Only retryable failures (`StageError::Failed`) are repeated; timeouts,
//! cancellations, fatal errors and panics end the stage immediately.

use crate::error::StageError;
use crate::policies::BackoffPolicy;

/// Policy controlling repeated attempts of one stage.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts allowed (values below 1 are treated as 1).
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    /// A single attempt.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Up to `max_attempts` attempts with the given backoff.
    pub fn attempts(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Returns true if another attempt should follow attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32, err: &StageError) -> bool {
        err.is_retryable() && attempt < self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    /// Returns [`RetryPolicy::once`].
    fn default() -> Self {
        Self::once()
    }
}
