//! Aggregate transaction outcomes
//!
//! A commit or rollback sweep folds every branch disposition into an
//! `OutcomeTally`; when the sweep finishes, the tally resolves into the one
//! outcome reported to the caller. Indeterminate observations never resolve
//! into a final outcome; they surface as the retryable error, carrying
//! whatever heuristic signal the completed branches did produce.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final disposition of a transaction, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionOutcome {
    /// Every branch committed.
    Committed,
    /// Every branch rolled back.
    RolledBack,
    /// Rollback was requested, but some branch had already committed.
    HeuristicCommit,
    /// Commit was requested, but some branch had already rolled back.
    HeuristicRollback,
    /// Some branches committed while others rolled back.
    HeuristicMixed,
}

impl TransactionOutcome {
    /// Whether this outcome records a heuristic divergence from the
    /// requested decision.
    pub fn is_heuristic(&self) -> bool {
        matches!(
            self,
            Self::HeuristicCommit | Self::HeuristicRollback | Self::HeuristicMixed
        )
    }

    /// Convert to string label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::HeuristicCommit => "heuristic_commit",
            Self::HeuristicRollback => "heuristic_rollback",
            Self::HeuristicMixed => "heuristic_mixed",
        }
    }
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running observations from one commit or rollback sweep.
///
/// `commit_seen` / `rollback_seen` record confirmed branch dispositions.
/// `indeterminate` records that some branch finished the sweep in an unknown
/// state; it taints the whole sweep but never erases the other observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct OutcomeTally {
    commit_seen: bool,
    rollback_seen: bool,
    indeterminate: bool,
}

impl OutcomeTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a branch confirmed committed.
    pub fn observe_commit(&mut self) {
        self.commit_seen = true;
    }

    /// Record a branch confirmed rolled back.
    pub fn observe_rollback(&mut self) {
        self.rollback_seen = true;
    }

    /// Record a branch whose disposition is unknown.
    pub fn observe_indeterminate(&mut self) {
        self.indeterminate = true;
    }

    pub fn commit_seen(&self) -> bool {
        self.commit_seen
    }

    pub fn rollback_seen(&self) -> bool {
        self.rollback_seen
    }

    pub fn is_indeterminate(&self) -> bool {
        self.indeterminate
    }

    /// Resolve a commit sweep, ignoring indeterminacy: what did the branches
    /// that completed decide?
    pub fn resolve_commit(&self) -> TransactionOutcome {
        if self.commit_seen && self.rollback_seen {
            TransactionOutcome::HeuristicMixed
        } else if self.rollback_seen {
            TransactionOutcome::HeuristicRollback
        } else {
            TransactionOutcome::Committed
        }
    }

    /// Resolve a rollback sweep, ignoring indeterminacy.
    pub fn resolve_rollback(&self) -> TransactionOutcome {
        if self.commit_seen && self.rollback_seen {
            TransactionOutcome::HeuristicMixed
        } else if self.commit_seen {
            TransactionOutcome::HeuristicCommit
        } else {
            TransactionOutcome::RolledBack
        }
    }

    /// The heuristic signal a commit sweep produced, if any. `None` means no
    /// branch diverged from the commit decision.
    pub fn commit_signal(&self) -> Option<TransactionOutcome> {
        match self.resolve_commit() {
            TransactionOutcome::Committed => None,
            other => Some(other),
        }
    }

    /// The heuristic signal a rollback sweep produced, if any.
    pub fn rollback_signal(&self) -> Option<TransactionOutcome> {
        match self.resolve_rollback() {
            TransactionOutcome::RolledBack => None,
            other => Some(other),
        }
    }
}
