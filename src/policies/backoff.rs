//! # Backoff between stage attempts.
//!
//! The pause before retry `n` (1-based, counting retries not attempts) is
//! `first × factor^(n-1)`, capped at `max`, then jittered. The base is derived
//! from the retry number alone, so jitter never compounds across retries.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use eventvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(2),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(250));
//! assert_eq!(backoff.delay_for(2), Duration::from_millis(500));
//! assert_eq!(backoff.delay_for(6), Duration::from_secs(2));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Pause schedule between attempts of a stage.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Pause before the first retry.
    pub first: Duration,
    /// Upper bound for any pause.
    pub max: Duration,
    /// Growth factor per retry (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the capped pause.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 200ms`, `factor = 2.0`, `max = 5s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(200),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A constant pause with no growth and no jitter.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the pause before retry number `retry` (1-based; `0` is treated as `1`).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}
