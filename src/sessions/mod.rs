//! # Fan-out / fan-in sessions.
//!
//! A fan-out handler turns one parent request into `N` sub-tasks that run on
//! any worker, in any order. Each sub-task's completion handler records its
//! result; the registry guarantees that **exactly one** recorder observes the
//! session crossing from incomplete to complete, and that recorder alone runs
//! the fan-in step.
//!
//! ```text
//! fan-out handler:  begin(id, input, N) ──► SessionRegistry
//!                   publish SearchRequested{id} × N
//!
//! completion 1..N:  record(id, result)
//!                     ├─ Pending { completed, expected }  ─► nothing else to do
//!                     ├─ Complete(session)                ─► publish next stage (winner only)
//!                     └─ Unknown                          ─► already finalized / never existed
//! ```
//!
//! ## Rules
//! - Append, increment and the completion check happen under the session's lock.
//! - The finalizing transition removes the session, bounding memory.
//! - Results keep arrival order, which is not request order.
//! - `expected = 0` completes at `begin` without registering anything.

mod registry;
mod session;

pub use registry::{Begin, RecordOutcome, SessionRegistry};
pub use session::{CompletedSession, SessionId, SessionSnapshot, SubResult};
