//! Session data types.

use std::fmt;

use uuid::Uuid;

/// Collision-resistant session identifier (UUID v4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of one sub-task.
#[derive(Clone, Debug, PartialEq)]
pub enum SubResult<T> {
    /// Sub-task produced a value.
    Ok(T),
    /// Sub-task failed; carries the reason.
    Failed(String),
}

impl<T> SubResult<T> {
    /// Returns the value if the sub-task succeeded.
    pub fn ok(&self) -> Option<&T> {
        match self {
            SubResult::Ok(v) => Some(v),
            SubResult::Failed(_) => None,
        }
    }

    /// Returns true if the sub-task failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, SubResult::Failed(_))
    }
}

/// Live session state held by the registry.
pub(super) struct Session<T> {
    pub input: String,
    pub expected: usize,
    pub completed: usize,
    pub results: Vec<SubResult<T>>,
    /// Set by the finalizing transition or by `remove`; later records are no-ops.
    pub closed: bool,
}

impl<T> Session<T> {
    pub fn new(input: String, expected: usize) -> Self {
        Self {
            input,
            expected,
            completed: 0,
            results: Vec::with_capacity(expected),
            closed: false,
        }
    }
}

/// A session whose sub-tasks have all reported, handed to the fan-in winner.
#[derive(Clone, Debug)]
pub struct CompletedSession<T> {
    /// Session id.
    pub id: SessionId,
    /// The request that triggered the fan-out.
    pub input: String,
    /// Sub-task results in arrival order (`len() == expected`).
    pub results: Vec<SubResult<T>>,
}

impl<T> CompletedSession<T> {
    /// Iterates over successful results only.
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.results.iter().filter_map(SubResult::ok)
    }

    /// Number of failed sub-tasks.
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }
}

/// Read-only view of a session still in progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Session id.
    pub id: SessionId,
    /// The request that triggered the fan-out.
    pub input: String,
    /// Number of sub-tasks spawned.
    pub expected: usize,
    /// Number of results received so far.
    pub completed: usize,
}
