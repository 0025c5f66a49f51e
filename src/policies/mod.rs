//! Retry policies for detached stages.
//!
//! These knobs control **whether** a failed stage attempt is repeated and
//! **how long** to wait before the next attempt.
//!
//! ## Contents
//! - [`RetryPolicy`]   how many attempts a stage gets
//! - [`BackoffPolicy`] how the pause between attempts grows (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization so parallel sub-tasks do not retry in lockstep
//!
//! ## Quick wiring
//! ```text
//! Stage { deadline, retry: RetryPolicy { max_attempts, backoff } }
//!      └─► Stage::run uses:
//!           - max_attempts to decide retry/give up
//!           - backoff.delay_for(attempt) to schedule the next attempt
//! ```
//!
//! The stage deadline bounds each attempt; a timed-out attempt is never retried.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
