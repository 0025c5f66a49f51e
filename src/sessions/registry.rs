//! # Session registry: exactly-once fan-in.
//!
//! The map lock only guards membership; each session carries its own lock, so
//! recorders for different sessions never contend. Locks are never nested:
//! `record` drops the session lock before touching the map, and `remove` drops
//! the map lock before touching the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::debug;

use crate::error::SessionError;
use crate::sessions::session::{
    CompletedSession, Session, SessionId, SessionSnapshot, SubResult,
};

type Entry<T> = Arc<Mutex<Session<T>>>;

/// Result of [`SessionRegistry::begin`].
#[derive(Debug)]
pub enum Begin<T> {
    /// Session registered; `expected` results are awaited.
    Pending(SessionId),
    /// Nothing to wait for (`expected == 0`); fan in right away.
    Complete(CompletedSession<T>),
}

/// Result of [`SessionRegistry::record`].
#[derive(Debug)]
pub enum RecordOutcome<T> {
    /// Result stored; the session still waits for more.
    Pending {
        /// Results received so far.
        completed: usize,
        /// Results expected in total.
        expected: usize,
    },
    /// This call completed the session. Returned to exactly one caller.
    Complete(CompletedSession<T>),
    /// No live session with that id (already finalized, removed, or never begun).
    Unknown,
}

/// Registry of in-flight fan-out sessions, shared by all workers.
pub struct SessionRegistry<T> {
    sessions: RwLock<HashMap<SessionId, Entry<T>>>,
}

impl<T> SessionRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty registry behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Registers a session expecting `expected` sub-task results.
    ///
    /// With `expected == 0` nothing is registered and the completed (empty)
    /// session is returned directly.
    pub fn begin(
        &self,
        id: SessionId,
        input: impl Into<String>,
        expected: usize,
    ) -> Result<Begin<T>, SessionError> {
        let input = input.into();
        if expected == 0 {
            return Ok(Begin::Complete(CompletedSession {
                id,
                input,
                results: Vec::new(),
            }));
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if sessions.contains_key(&id) {
            return Err(SessionError::AlreadyExists { id: id.to_string() });
        }
        sessions.insert(id, Arc::new(Mutex::new(Session::new(input, expected))));
        debug!(session = %id.short(), expected, "session begun");
        Ok(Begin::Pending(id))
    }

    /// Appends a sub-task result.
    ///
    /// Exactly one call per session returns [`RecordOutcome::Complete`]: the one
    /// whose increment reaches `expected`. That call also removes the session.
    pub fn record(&self, id: &SessionId, result: SubResult<T>) -> RecordOutcome<T> {
        let Some(entry) = self.entry(id) else {
            debug!(session = %id.short(), "result for unknown session ignored");
            return RecordOutcome::Unknown;
        };

        let done = {
            let mut session = lock(&entry);
            if session.closed {
                debug!(session = %id.short(), "result for closed session ignored");
                return RecordOutcome::Unknown;
            }

            session.results.push(result);
            session.completed += 1;
            if session.completed < session.expected {
                return RecordOutcome::Pending {
                    completed: session.completed,
                    expected: session.expected,
                };
            }

            session.closed = true;
            CompletedSession {
                id: *id,
                input: std::mem::take(&mut session.input),
                results: std::mem::take(&mut session.results),
            }
        };

        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        debug!(session = %id.short(), results = done.results.len(), "session complete");
        RecordOutcome::Complete(done)
    }

    /// Returns a snapshot of a live session.
    pub fn lookup(&self, id: &SessionId) -> Option<SessionSnapshot> {
        let entry = self.entry(id)?;
        let session = lock(&entry);
        if session.closed {
            return None;
        }
        Some(SessionSnapshot {
            id: *id,
            input: session.input.clone(),
            expected: session.expected,
            completed: session.completed,
        })
    }

    /// Drops a session without finalizing it. Later results for it are no-ops.
    ///
    /// Returns `false` if no such session was registered.
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        match removed {
            Some(entry) => {
                lock(&entry).closed = true;
                true
            }
            None => false,
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns true if no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: &SessionId) -> Option<Entry<T>> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(entry: &Entry<T>) -> MutexGuard<'_, Session<T>> {
    entry.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pending(begin: Begin<u32>) -> SessionId {
        match begin {
            Begin::Pending(id) => id,
            Begin::Complete(_) => panic!("expected a pending session"),
        }
    }

    #[test]
    fn test_completes_on_last_result() {
        let reg = SessionRegistry::<u32>::new();
        let id = pending(reg.begin(SessionId::new(), "topic", 3).unwrap());

        assert!(matches!(
            reg.record(&id, SubResult::Ok(1)),
            RecordOutcome::Pending {
                completed: 1,
                expected: 3
            }
        ));
        assert!(matches!(
            reg.record(&id, SubResult::Failed("down".into())),
            RecordOutcome::Pending { completed: 2, .. }
        ));

        match reg.record(&id, SubResult::Ok(3)) {
            RecordOutcome::Complete(done) => {
                assert_eq!(done.input, "topic");
                assert_eq!(done.results.len(), 3);
                assert_eq!(done.successes().copied().collect::<Vec<_>>(), vec![1, 3]);
                assert_eq!(done.failures(), 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert!(reg.is_empty());
        assert!(reg.lookup(&id).is_none());
    }

    #[test]
    fn test_results_keep_arrival_order() {
        let reg = SessionRegistry::<&'static str>::new();
        let id = pending_str(reg.begin(SessionId::new(), "t", 3).unwrap());
        reg.record(&id, SubResult::Ok("c"));
        reg.record(&id, SubResult::Ok("a"));
        let RecordOutcome::Complete(done) = reg.record(&id, SubResult::Ok("b")) else {
            panic!("session should be complete");
        };
        assert_eq!(
            done.results,
            vec![SubResult::Ok("c"), SubResult::Ok("a"), SubResult::Ok("b")]
        );
    }

    fn pending_str(begin: Begin<&'static str>) -> SessionId {
        match begin {
            Begin::Pending(id) => id,
            Begin::Complete(_) => panic!("expected a pending session"),
        }
    }

    #[test]
    fn test_zero_expected_completes_immediately() {
        let reg = SessionRegistry::<u32>::new();
        match reg.begin(SessionId::new(), "nothing to search", 0).unwrap() {
            Begin::Complete(done) => {
                assert!(done.results.is_empty());
                assert_eq!(done.input, "nothing to search");
            }
            Begin::Pending(_) => panic!("empty session must not wait"),
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let reg = SessionRegistry::<u32>::new();
        let id = SessionId::new();
        reg.begin(id, "a", 1).unwrap();
        let err = reg.begin(id, "b", 1).unwrap_err();
        assert_eq!(err.as_label(), "session_already_exists");
    }

    #[test]
    fn test_unknown_and_late_results_are_noops() {
        let reg = SessionRegistry::<u32>::new();
        assert!(matches!(
            reg.record(&SessionId::new(), SubResult::Ok(1)),
            RecordOutcome::Unknown
        ));

        let id = pending(reg.begin(SessionId::new(), "t", 1).unwrap());
        assert!(matches!(
            reg.record(&id, SubResult::Ok(1)),
            RecordOutcome::Complete(_)
        ));
        assert!(matches!(
            reg.record(&id, SubResult::Ok(2)),
            RecordOutcome::Unknown
        ));
    }

    #[test]
    fn test_remove_closes_session() {
        let reg = SessionRegistry::<u32>::new();
        let id = pending(reg.begin(SessionId::new(), "t", 2).unwrap());
        assert_eq!(reg.lookup(&id).map(|s| s.expected), Some(2));
        assert!(reg.remove(&id));
        assert!(!reg.remove(&id));
        assert!(matches!(
            reg.record(&id, SubResult::Ok(1)),
            RecordOutcome::Unknown
        ));
    }

    #[test]
    fn test_exactly_one_winner_under_contention() {
        const N: usize = 32;

        for _ in 0..50 {
            let reg = Arc::new(SessionRegistry::<usize>::new());
            let id = pending_usize(reg.begin(SessionId::new(), "race", N).unwrap());
            let barrier = Arc::new(Barrier::new(N));
            let winners = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..N)
                .map(|i| {
                    let reg = Arc::clone(&reg);
                    let barrier = Arc::clone(&barrier);
                    let winners = Arc::clone(&winners);
                    std::thread::spawn(move || {
                        barrier.wait();
                        if let RecordOutcome::Complete(done) = reg.record(&id, SubResult::Ok(i)) {
                            assert_eq!(done.results.len(), N);
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }

            assert_eq!(winners.load(Ordering::SeqCst), 1);
            assert!(reg.is_empty());
        }
    }

    fn pending_usize(begin: Begin<usize>) -> SessionId {
        match begin {
            Begin::Pending(id) => id,
            Begin::Complete(_) => panic!("expected a pending session"),
        }
    }
}
