//! Which event kinds open and close a pipeline.

use crate::events::EventKind;

/// Admission class of an event kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionClass {
    /// Starts a new pipeline; must acquire a slot.
    TopLevel,
    /// Ends a pipeline (success, timeout or failure); releases a slot.
    Terminal,
    /// Intermediate stage or unrelated event; not subject to admission.
    Passthrough,
}

/// Mapping from event kinds to admission classes.
///
/// Defaults:
/// - top-level: `UserInputReceived`
/// - terminal: `SummaryComplete`, `Timeout`, `Error`
#[derive(Clone, Debug)]
pub struct AdmissionRules {
    top_level: Vec<EventKind>,
    terminal: Vec<EventKind>,
}

impl AdmissionRules {
    /// Creates rules from explicit kind lists.
    ///
    /// A kind listed in both is treated as top-level.
    pub fn new(top_level: Vec<EventKind>, terminal: Vec<EventKind>) -> Self {
        Self {
            top_level,
            terminal,
        }
    }

    /// Rules that never admit or release anything.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Classifies an event kind.
    pub fn classify(&self, kind: EventKind) -> AdmissionClass {
        if self.top_level.contains(&kind) {
            AdmissionClass::TopLevel
        } else if self.terminal.contains(&kind) {
            AdmissionClass::Terminal
        } else {
            AdmissionClass::Passthrough
        }
    }

    /// Returns true if `kind` closes a pipeline.
    pub fn is_terminal(&self, kind: EventKind) -> bool {
        self.classify(kind) == AdmissionClass::Terminal
    }
}

impl Default for AdmissionRules {
    fn default() -> Self {
        Self::new(
            vec![EventKind::UserInputReceived],
            vec![
                EventKind::SummaryComplete,
                EventKind::Timeout,
                EventKind::Error,
            ],
        )
    }
}
