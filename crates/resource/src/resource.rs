//! The resource-branch contract
//!
//! `XaResource` is the synchronous participant surface the coordinator
//! drives through both protocol phases. `XaResourceDescriptor` adds the
//! identity the coordinator needs to recognize an already-enlisted resource
//! manager and join new work onto its existing branch.

use crate::error::{XaError, XaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use terminus_common::{Vote, Xid};

/// Association flag passed to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartFlag {
    /// First association of a fresh branch (TMNOFLAGS).
    New,
    /// Join work already running under the same resource manager (TMJOIN).
    Join,
    /// Re-associate a suspended branch (TMRESUME).
    Resume,
}

impl StartFlag {
    /// Convert to string label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Join => "join",
            Self::Resume => "resume",
        }
    }
}

impl fmt::Display for StartFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dissociation flag passed to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndFlag {
    /// The work completed successfully (TMSUCCESS).
    Success,
    /// The work failed; the branch is rollback-only (TMFAIL).
    Fail,
    /// Dissociate but leave the branch resumable (TMSUSPEND).
    Suspend,
}

impl EndFlag {
    /// Convert to string label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Suspend => "suspend",
        }
    }
}

impl fmt::Display for EndFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous contract a resource branch implements.
///
/// The coordinator serializes all protocol calls under its own lock, so
/// implementations see one call at a time and only need to be `Send`.
/// Every failure is reported as an [`XaError`] whose kind the coordinator
/// classifies; implementations never see classification logic.
pub trait XaResource: Send {
    /// Associate the branch with a transaction.
    fn start(&mut self, xid: &Xid, flag: StartFlag) -> XaResult<()>;

    /// Dissociate the branch from a transaction.
    fn end(&mut self, xid: &Xid, flag: EndFlag) -> XaResult<()>;

    /// Phase one: vote on the branch outcome.
    fn prepare(&mut self, xid: &Xid) -> XaResult<Vote>;

    /// Phase two: commit the branch. With `one_phase` set, the branch
    /// prepares and commits in this single call.
    fn commit(&mut self, xid: &Xid, one_phase: bool) -> XaResult<()>;

    /// Phase two: roll the branch back.
    fn rollback(&mut self, xid: &Xid) -> XaResult<()>;

    /// Discard all knowledge of a heuristically completed branch.
    fn forget(&mut self, xid: &Xid) -> XaResult<()>;

    /// Current transaction timeout in seconds.
    fn transaction_timeout(&self) -> XaResult<u64>;

    /// Push a transaction timeout; `false` means the resource ignored it.
    fn set_transaction_timeout(&mut self, seconds: u64) -> XaResult<bool>;
}

/// A resource branch the coordinator can identify and deduplicate.
///
/// At enlistment the coordinator first looks for an existing branch backed
/// by the same resource manager: identifiers are compared, then `is_same_rm`
/// confirms. A failing identity probe counts as "not the same" rather than
/// failing the enlistment.
pub trait XaResourceDescriptor: XaResource {
    /// Stable identifier for the underlying resource (datasource name).
    fn identifier(&self) -> &str;

    /// Whether `other` is backed by the same resource manager instance.
    fn is_same_rm(&self, other: &dyn XaResourceDescriptor) -> Result<bool, XaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_labels() {
        assert_eq!(StartFlag::New.as_str(), "new");
        assert_eq!(StartFlag::Join.to_string(), "join");
        assert_eq!(StartFlag::Resume.as_str(), "resume");

        assert_eq!(EndFlag::Success.as_str(), "success");
        assert_eq!(EndFlag::Fail.to_string(), "fail");
        assert_eq!(EndFlag::Suspend.as_str(), "suspend");
    }
}
