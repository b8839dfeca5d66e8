//! Error types for the coordinator

use crate::outcome::TransactionOutcome;
use terminus_resource::XaError;
use thiserror::Error;

/// Coordinator error types
///
/// Per-branch failures never cross this boundary raw: protocol sweeps
/// classify them and report one of these conditions. Heuristic outcomes are
/// not errors at all; they come back as `Ok(TransactionOutcome::…)`.
#[derive(Error, Debug, Clone)]
pub enum CoordinatorError {
    /// At least one branch ended the sweep in an unknown state. The branch
    /// set is preserved, so retrying the same operation later resumes where
    /// this attempt stopped. `resolved` carries whatever heuristic signal
    /// the completed branches did produce.
    #[error("Transaction outcome indeterminate, resolved signal: {resolved:?}")]
    Indeterminate {
        resolved: Option<TransactionOutcome>,
    },

    /// The transaction can no longer commit and must be rolled back.
    #[error("Transaction must be rolled back")]
    RollbackRequired { source: Option<XaError> },

    /// A resource manager failed outside the rollback path.
    #[error("Resource manager failure")]
    SystemFailure { source: Option<XaError> },

    /// The caller named a resource that was never enlisted here.
    #[error("Resource not enlisted: {identifier}")]
    NotEnlisted { identifier: String },

    /// The operation is invalid for the coordinator's current branch set.
    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    /// A branch failure re-raised verbatim (prepare propagation and the
    /// one-phase availability codes).
    #[error("Branch error: {0}")]
    Branch(#[from] XaError),
}

impl CoordinatorError {
    /// Whether retrying the same operation later can still succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Indeterminate { .. })
    }
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use terminus_resource::XaErrorKind;

    #[test]
    fn test_retryable() {
        let err = CoordinatorError::Indeterminate { resolved: None };
        assert!(err.is_retryable());

        let err = CoordinatorError::SystemFailure { source: None };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_branch_conversion() {
        let branch = XaError::new(XaErrorKind::ResourceUnavailable, "rm is down");
        let err: CoordinatorError = branch.into();
        assert!(matches!(err, CoordinatorError::Branch(_)));
        assert_eq!(err.to_string(), "Branch error: resource_unavailable: rm is down");
    }
}
