//! Per-branch bookkeeping
//!
//! A `BranchArchive` pairs one enlisted resource with everything the
//! coordinator has recorded about it: branch identifier, last prepare vote,
//! and the completion flags the classification sweeps read and write.
//! Archives delegate protocol calls to the resource and return failures
//! verbatim; classifying those failures is the terminator's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use terminus_common::{Vote, Xid};
use terminus_resource::{EndFlag, StartFlag, XaResourceDescriptor, XaResult};

/// One enlisted resource branch and its recorded protocol state.
///
/// `completed` is monotonic: the `mark_*` mutators only ever set it, and
/// nothing clears a disposition flag. `committed` and `rolled_back` are both
/// set only for a branch that reported a mixed heuristic.
pub struct BranchArchive {
    descriptor: Box<dyn XaResourceDescriptor>,
    xid: Xid,
    vote: Option<Vote>,
    started: bool,
    delisted: bool,
    completed: bool,
    committed: bool,
    rolled_back: bool,
    heuristic: bool,
    read_only: bool,
    timeout_seconds: u64,
}

impl BranchArchive {
    /// Wrap a freshly enlisted resource under its branch identifier.
    pub fn new(descriptor: Box<dyn XaResourceDescriptor>, xid: Xid) -> Self {
        Self {
            descriptor,
            xid,
            vote: None,
            started: false,
            delisted: false,
            completed: false,
            committed: false,
            rolled_back: false,
            heuristic: false,
            read_only: false,
            timeout_seconds: 0,
        }
    }

    /// The enlisted resource's stable identifier.
    pub fn identifier(&self) -> &str {
        self.descriptor.identifier()
    }

    /// The underlying descriptor, for identity probes.
    pub fn descriptor(&self) -> &dyn XaResourceDescriptor {
        self.descriptor.as_ref()
    }

    /// The branch identifier.
    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    /// The recorded prepare vote, if the branch has voted.
    pub fn vote(&self) -> Option<Vote> {
        self.vote
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_delisted(&self) -> bool {
        self.delisted
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn is_rolled_back(&self) -> bool {
        self.rolled_back
    }

    pub fn is_heuristic(&self) -> bool {
        self.heuristic
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The timeout last pushed into the branch, in seconds.
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    // Protocol delegation. Failures come back verbatim.

    /// Associate the branch; a successful start marks it started.
    pub fn start(&mut self, flag: StartFlag) -> XaResult<()> {
        self.descriptor.start(&self.xid, flag)?;
        self.started = true;
        Ok(())
    }

    /// Dissociate the branch.
    pub fn end(&mut self, flag: EndFlag) -> XaResult<()> {
        self.descriptor.end(&self.xid, flag)
    }

    /// Drive phase one and record the vote.
    pub fn prepare(&mut self) -> XaResult<Vote> {
        let vote = self.descriptor.prepare(&self.xid)?;
        self.vote = Some(vote);
        Ok(vote)
    }

    /// Drive phase two commit (or the combined one-phase call).
    pub fn commit(&mut self, one_phase: bool) -> XaResult<()> {
        self.descriptor.commit(&self.xid, one_phase)
    }

    /// Drive phase two rollback.
    pub fn rollback(&mut self) -> XaResult<()> {
        self.descriptor.rollback(&self.xid)
    }

    /// Tell the resource to discard its record of this branch.
    pub fn forget(&mut self) -> XaResult<()> {
        self.descriptor.forget(&self.xid)
    }

    /// Push a timeout into the branch, remembering the value.
    pub fn set_timeout(&mut self, seconds: u64) -> XaResult<bool> {
        let accepted = self.descriptor.set_transaction_timeout(seconds)?;
        self.timeout_seconds = seconds;
        Ok(accepted)
    }

    // State transitions. Each completes the branch; nothing un-completes it.

    /// Record the branch committed. `heuristic` marks a decision the
    /// resource made on its own.
    pub fn mark_committed(&mut self, heuristic: bool) {
        self.committed = true;
        self.heuristic |= heuristic;
        self.completed = true;
    }

    /// Record the branch rolled back.
    pub fn mark_rolled_back(&mut self, heuristic: bool) {
        self.rolled_back = true;
        self.heuristic |= heuristic;
        self.completed = true;
    }

    /// Record a branch that split: part committed, part rolled back.
    pub fn mark_heuristic_mixed(&mut self) {
        self.committed = true;
        self.rolled_back = true;
        self.heuristic = true;
        self.completed = true;
    }

    /// Record a read-only branch; it is finished with nothing to decide.
    pub fn mark_read_only(&mut self) {
        self.read_only = true;
        self.completed = true;
    }

    /// Record completion without a disposition.
    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    pub fn set_delisted(&mut self, delisted: bool) {
        self.delisted = delisted;
    }

    /// Snapshot the recorded state for the external persistence
    /// collaborator.
    pub fn snapshot(&self) -> BranchSnapshot {
        BranchSnapshot {
            xid: self.xid.clone(),
            identifier: self.descriptor.identifier().to_string(),
            vote: self.vote,
            started: self.started,
            delisted: self.delisted,
            completed: self.completed,
            committed: self.committed,
            rolled_back: self.rolled_back,
            heuristic: self.heuristic,
            read_only: self.read_only,
            timeout_seconds: self.timeout_seconds,
        }
    }
}

impl fmt::Debug for BranchArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchArchive")
            .field("identifier", &self.descriptor.identifier())
            .field("xid", &self.xid)
            .field("vote", &self.vote)
            .field("started", &self.started)
            .field("delisted", &self.delisted)
            .field("completed", &self.completed)
            .field("committed", &self.committed)
            .field("rolled_back", &self.rolled_back)
            .field("heuristic", &self.heuristic)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Plain-data image of one branch archive.
///
/// This is the read-only view recovery and persistence collaborators get;
/// field names are part of that external contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSnapshot {
    pub xid: Xid,
    pub identifier: String,
    pub vote: Option<Vote>,
    pub started: bool,
    pub delisted: bool,
    pub completed: bool,
    pub committed: bool,
    pub rolled_back: bool,
    pub heuristic: bool,
    pub read_only: bool,
    pub timeout_seconds: u64,
}
