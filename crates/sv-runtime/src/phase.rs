//! Run phase state machine.
//!
//! ```text
//! Start -> ResolvePatterns -> Normalize -> Reconcile -> Decide -> Terminal
//!   \            \                \            \           \
//!    +------------+----------------+------------+-----------+--> Aborted
//! ```
//!
//! One pass per invocation. Nothing is persisted across runs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Start,
    ResolvePatterns,
    /// Both sides gathered concurrently.
    Normalize,
    Reconcile,
    Decide,
    /// Result published. **Terminal.**
    Terminal,
    /// Configuration, secret or auth failure. **Terminal.**
    Aborted,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Terminal | RunPhase::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Start => "start",
            RunPhase::ResolvePatterns => "resolve_patterns",
            RunPhase::Normalize => "normalize",
            RunPhase::Reconcile => "reconcile",
            RunPhase::Decide => "decide",
            RunPhase::Terminal => "terminal",
            RunPhase::Aborted => "aborted",
        }
    }

    fn successor(&self) -> Option<RunPhase> {
        match self {
            RunPhase::Start => Some(RunPhase::ResolvePatterns),
            RunPhase::ResolvePatterns => Some(RunPhase::Normalize),
            RunPhase::Normalize => Some(RunPhase::Reconcile),
            RunPhase::Reconcile => Some(RunPhase::Decide),
            RunPhase::Decide => Some(RunPhase::Terminal),
            RunPhase::Terminal | RunPhase::Aborted => None,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: RunPhase,
    pub to: RunPhase,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal run transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// Tracks the current phase and the path taken.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: RunPhase,
    history: Vec<RunPhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: RunPhase::Start,
            history: vec![RunPhase::Start],
        }
    }

    pub fn current(&self) -> RunPhase {
        self.current
    }

    pub fn history(&self) -> &[RunPhase] {
        &self.history
    }

    /// Move to the next phase. Only the linear successor or `Aborted` (from a
    /// non-terminal phase) is legal.
    pub fn advance(&mut self, to: RunPhase) -> Result<(), TransitionError> {
        let legal = match to {
            RunPhase::Aborted => !self.current.is_terminal(),
            _ => self.current.successor() == Some(to),
        };
        if !legal {
            return Err(TransitionError {
                from: self.current,
                to,
            });
        }
        tracing::debug!(from = %self.current, to = %to, "run phase");
        self.current = to;
        self.history.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_path_reaches_terminal() {
        let mut t = PhaseTracker::new();
        for p in [
            RunPhase::ResolvePatterns,
            RunPhase::Normalize,
            RunPhase::Reconcile,
            RunPhase::Decide,
            RunPhase::Terminal,
        ] {
            t.advance(p).unwrap();
        }
        assert_eq!(t.current(), RunPhase::Terminal);
        assert_eq!(t.history().len(), 6);
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut t = PhaseTracker::new();
        let err = t.advance(RunPhase::Reconcile).unwrap_err();
        assert_eq!(err.from, RunPhase::Start);
        assert_eq!(t.current(), RunPhase::Start);
    }

    #[test]
    fn abort_is_legal_until_terminal() {
        let mut t = PhaseTracker::new();
        t.advance(RunPhase::Aborted).unwrap();
        assert!(t.advance(RunPhase::Aborted).is_err());
        assert!(t.advance(RunPhase::ResolvePatterns).is_err());
    }
}
