//! Failure codes a resource branch can report
//!
//! Every fallible branch call reports one of a closed set of kinds. The
//! coordinator classifies outcomes by matching exhaustively on the kind, so
//! adding a kind is a compile-time event at every classification site rather
//! than a silently-taken default arm.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for branch calls
pub type XaResult<T> = std::result::Result<T, XaError>;

/// Why a branch rolled work back on its own (the XA_RB* family).
///
/// The reason is advisory; classification only cares that the branch is
/// already rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollbackReason {
    /// Rolled back for an unspecified reason (XA_RBROLLBACK).
    Unspecified,
    /// A communication failure inside the branch (XA_RBCOMMFAIL).
    CommunicationFailure,
    /// A deadlock was detected (XA_RBDEADLOCK).
    Deadlock,
    /// A condition that violates resource integrity (XA_RBINTEGRITY).
    IntegrityViolation,
    /// Rolled back for a reason outside the other codes (XA_RBOTHER).
    Other,
    /// A protocol error occurred inside the branch (XA_RBPROTO).
    ProtocolError,
    /// The branch took too long (XA_RBTIMEOUT).
    Timeout,
    /// Transient condition; the whole transaction may be retried (XA_RBTRANSIENT).
    Transient,
}

impl RollbackReason {
    /// Convert to string label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::CommunicationFailure => "communication_failure",
            Self::Deadlock => "deadlock",
            Self::IntegrityViolation => "integrity_violation",
            Self::Other => "other",
            Self::ProtocolError => "protocol_error",
            Self::Timeout => "timeout",
            Self::Transient => "transient",
        }
    }
}

impl fmt::Display for RollbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of failure conditions a branch call can report.
///
/// These are the XA return codes reshaped into one enumeration: the rollback
/// family collapses into a single variant carrying its reason, and the
/// heuristic, caller-error and availability codes each get a variant. No
/// variant means "unknown code".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XaErrorKind {
    /// Work was rolled back at the branch (XA_RB* family).
    Rollback(RollbackReason),
    /// Branch was heuristically committed (XA_HEURCOM).
    HeuristicCommit,
    /// Branch was heuristically rolled back (XA_HEURRB).
    HeuristicRollback,
    /// Branch work was partially committed and partially rolled back (XA_HEURMIX).
    HeuristicMixed,
    /// Branch may have been heuristically completed (XA_HEURHAZ).
    HeuristicHazard,
    /// The resource manager does not recognize the branch (XAER_NOTA).
    UnknownBranch,
    /// The resource manager is unavailable (XAER_RMFAIL).
    ResourceUnavailable,
    /// An internal resource manager error (XAER_RMERR).
    ResourceManagerError,
    /// Invalid arguments were passed to the branch (XAER_INVAL).
    InvalidArguments,
    /// The call was made in an improper context (XAER_PROTO).
    ImproperContext,
    /// The branch identifier is already in use (XAER_DUPID).
    DuplicateBranch,
    /// The resource is doing work outside any transaction (XAER_OUTSIDE).
    OutsideTransaction,
}

impl XaErrorKind {
    /// Whether this is a rollback-family code.
    pub fn is_rollback(&self) -> bool {
        matches!(self, Self::Rollback(_))
    }

    /// Whether this is one of the four heuristic codes.
    pub fn is_heuristic(&self) -> bool {
        matches!(
            self,
            Self::HeuristicCommit
                | Self::HeuristicRollback
                | Self::HeuristicMixed
                | Self::HeuristicHazard
        )
    }
}

impl fmt::Display for XaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rollback(reason) => write!(f, "rollback({})", reason),
            Self::HeuristicCommit => f.write_str("heuristic_commit"),
            Self::HeuristicRollback => f.write_str("heuristic_rollback"),
            Self::HeuristicMixed => f.write_str("heuristic_mixed"),
            Self::HeuristicHazard => f.write_str("heuristic_hazard"),
            Self::UnknownBranch => f.write_str("unknown_branch"),
            Self::ResourceUnavailable => f.write_str("resource_unavailable"),
            Self::ResourceManagerError => f.write_str("resource_manager_error"),
            Self::InvalidArguments => f.write_str("invalid_arguments"),
            Self::ImproperContext => f.write_str("improper_context"),
            Self::DuplicateBranch => f.write_str("duplicate_branch"),
            Self::OutsideTransaction => f.write_str("outside_transaction"),
        }
    }
}

/// Failure reported by a resource branch call.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {detail}")]
pub struct XaError {
    kind: XaErrorKind,
    detail: String,
}

impl XaError {
    /// Create an error with a classification kind and human-readable detail.
    pub fn new(kind: XaErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// The classification kind.
    pub fn kind(&self) -> XaErrorKind {
        self.kind
    }

    /// The human-readable detail.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}
