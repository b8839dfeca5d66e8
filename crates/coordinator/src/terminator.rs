//! Transaction termination across the enlisted branch set
//!
//! `XaTerminator` owns every branch of one global transaction and drives
//! them through the protocol: enlistment and delistment while the
//! transaction runs, then the prepare, commit, rollback and forget sweeps
//! that finish it. Sweeps classify per-branch failure codes into branch
//! dispositions, fold those into an [`OutcomeTally`] and report a single
//! [`TransactionOutcome`] or coordinator error.

use crate::archive::{BranchArchive, BranchSnapshot};
use crate::context::TransactionContext;
use crate::error::{CoordinatorError, Result};
use crate::outcome::{OutcomeTally, TransactionOutcome};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use terminus_common::{Timestamp, Vote, Xid};
use terminus_resource::{EndFlag, StartFlag, XaError, XaErrorKind, XaResourceDescriptor};

/// Mutable coordinator state, guarded by the terminator's lock.
#[derive(Debug)]
struct TerminatorInner {
    /// Enlisted branches, keyed by branch identifier. Iteration order is
    /// the key order, so every sweep visits branches deterministically.
    branches: BTreeMap<Xid, BranchArchive>,
    /// Transaction timeout in seconds, as last set by the caller.
    transaction_timeout: u64,
}

/// Coordinator for one global transaction.
///
/// Every operation takes the internal lock for its whole duration, so each
/// call is one atomic step over the branch set even when application,
/// reaper and recovery threads overlap. A commit or rollback sweep always
/// visits every remaining branch; an individual branch failure is
/// classified and folded, never allowed to short-circuit the sweep.
#[derive(Debug)]
pub struct XaTerminator {
    context: TransactionContext,
    inner: Mutex<TerminatorInner>,
}

impl XaTerminator {
    /// Create a terminator for the transaction described by `context`, with
    /// no branches enlisted yet.
    pub fn new(context: TransactionContext) -> Self {
        Self {
            context,
            inner: Mutex::new(TerminatorInner {
                branches: BTreeMap::new(),
                transaction_timeout: 0,
            }),
        }
    }

    /// The transaction context this terminator works under.
    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    /// Number of enlisted branches.
    pub fn branch_count(&self) -> usize {
        self.inner.lock().branches.len()
    }

    /// Plain-data images of every branch, for the persistence and recovery
    /// collaborators.
    pub fn branch_snapshots(&self) -> Vec<BranchSnapshot> {
        self.inner
            .lock()
            .branches
            .values()
            .map(BranchArchive::snapshot)
            .collect()
    }

    /// Transaction timeout in seconds.
    pub fn transaction_timeout(&self) -> u64 {
        self.inner.lock().transaction_timeout
    }

    /// Record the transaction timeout.
    pub fn set_transaction_timeout(&self, seconds: u64) {
        self.inner.lock().transaction_timeout = seconds;
    }

    // Phase one.

    /// Ask every branch to vote. A read-only vote completes the branch on
    /// the spot and drops it from the global vote; any other vote makes the
    /// whole transaction commit-required. The first branch failure aborts
    /// the poll and is returned raw, for the caller to drive rollback.
    pub fn prepare(&self, xid: &Xid) -> Result<Vote> {
        let mut inner = self.inner.lock();
        tracing::debug!("Preparing transaction {}", xid);

        let mut global_vote = Vote::ReadOnly;
        for (branch, archive) in inner.branches.iter_mut() {
            let vote = archive.prepare()?;
            match vote {
                Vote::ReadOnly => archive.mark_read_only(),
                Vote::Ok => global_vote = Vote::Ok,
            }
            tracing::info!("Branch {} prepared, vote: {}", branch, vote);
        }
        Ok(global_vote)
    }

    // Phase two.

    /// Commit the transaction, either as the one-phase optimization or as
    /// the second phase proper.
    ///
    /// Returns the resolved outcome; heuristic outcomes are ordinary
    /// return values here. [`CoordinatorError::Indeterminate`] reports a
    /// sweep some branch left in an unknown state, and carries whatever
    /// heuristic signal the completed branches produced; the branch set is
    /// kept so the call can be retried.
    pub fn commit(&self, xid: &Xid, one_phase: bool) -> Result<TransactionOutcome> {
        let mut inner = self.inner.lock();
        tracing::debug!("Committing transaction {}, one_phase: {}", xid, one_phase);

        let outcome = if one_phase {
            self.one_phase_commit(&mut inner)?
        } else {
            self.commit_sweep(&mut inner)?
        };
        tracing::info!("Transaction {} commit resolved: {}", xid, outcome);
        Ok(outcome)
    }

    /// Roll the transaction back across every branch.
    ///
    /// Same reporting contract as [`commit`](Self::commit): a heuristic
    /// divergence comes back as the outcome, an unfinished branch as
    /// [`CoordinatorError::Indeterminate`].
    pub fn rollback(&self, xid: &Xid) -> Result<TransactionOutcome> {
        let mut inner = self.inner.lock();
        tracing::debug!("Rolling back transaction {}", xid);

        let outcome = self.rollback_sweep(&mut inner)?;
        tracing::info!("Transaction {} rollback resolved: {}", xid, outcome);
        Ok(outcome)
    }

    /// Tell every heuristically completed branch to discard its record of
    /// the transaction. Best-effort: failures are logged or swallowed,
    /// never reported.
    pub fn forget(&self, xid: &Xid) {
        let mut inner = self.inner.lock();
        tracing::debug!("Forgetting heuristic branches of transaction {}", xid);

        for (branch, archive) in inner.branches.iter_mut() {
            if !archive.is_heuristic() {
                continue;
            }
            match archive.forget() {
                Ok(()) => tracing::info!("Branch {} forgotten", branch),
                Err(err) => match err.kind() {
                    XaErrorKind::UnknownBranch
                    | XaErrorKind::InvalidArguments
                    | XaErrorKind::ImproperContext => {}
                    XaErrorKind::ResourceManagerError | XaErrorKind::ResourceUnavailable => {
                        tracing::warn!("Branch {} forget failed: {}", branch, err);
                    }
                    XaErrorKind::Rollback(_)
                    | XaErrorKind::HeuristicCommit
                    | XaErrorKind::HeuristicRollback
                    | XaErrorKind::HeuristicMixed
                    | XaErrorKind::HeuristicHazard
                    | XaErrorKind::DuplicateBranch
                    | XaErrorKind::OutsideTransaction => {
                        tracing::warn!("Branch {} forget returned unexpected code: {}", branch, err);
                    }
                },
            }
        }
    }

    /// One-phase optimization: the single branch prepares and commits in
    /// one call. Valid only with exactly one branch enlisted.
    fn one_phase_commit(&self, inner: &mut TerminatorInner) -> Result<TransactionOutcome> {
        if inner.branches.len() != 1 {
            return Err(CoordinatorError::InvalidState(format!(
                "One-phase commit requires exactly one branch, found {}",
                inner.branches.len()
            )));
        }

        if let Some((branch, archive)) = inner.branches.iter_mut().next() {
            match archive.commit(true) {
                Ok(()) => {
                    archive.mark_committed(false);
                    tracing::info!("Branch {} committed in one phase", branch);
                }
                Err(err) => match err.kind() {
                    XaErrorKind::Rollback(_) => {
                        archive.mark_rolled_back(false);
                        tracing::warn!("Branch {} rolled back in one phase: {}", branch, err);
                        return Ok(TransactionOutcome::RolledBack);
                    }
                    // A heuristic needs a prepared branch, which cannot
                    // exist in a one-phase exchange.
                    XaErrorKind::HeuristicCommit
                    | XaErrorKind::HeuristicRollback
                    | XaErrorKind::HeuristicMixed
                    | XaErrorKind::HeuristicHazard
                    | XaErrorKind::ResourceManagerError => {
                        tracing::warn!(
                            "Branch {} reported {} in one phase, which the protocol rules out",
                            branch,
                            err
                        );
                    }
                    XaErrorKind::UnknownBranch
                    | XaErrorKind::ResourceUnavailable
                    | XaErrorKind::InvalidArguments
                    | XaErrorKind::ImproperContext
                    | XaErrorKind::DuplicateBranch
                    | XaErrorKind::OutsideTransaction => {
                        tracing::warn!("Branch {} one-phase commit failed: {}", branch, err);
                        return Err(CoordinatorError::Branch(err));
                    }
                },
            }
        }
        Ok(TransactionOutcome::Committed)
    }

    /// The commit sweep: visit every branch once, classify failures,
    /// resolve the tally.
    ///
    /// The compensating rule: if the first failure of the sweep arrives
    /// before any branch has confirmed a commit, the transaction can still
    /// be abandoned whole, so the sweep stops and a full rollback takes
    /// over the remaining branches. A plain rollback then reports as
    /// heuristic-rollback; a stronger outcome discovered during the
    /// rollback takes precedence.
    fn commit_sweep(&self, inner: &mut TerminatorInner) -> Result<TransactionOutcome> {
        let mut tally = OutcomeTally::new();
        let mut failure_seen = false;
        let mut compensate = false;

        for (branch, archive) in inner.branches.iter_mut() {
            if archive.is_completed() {
                if archive.is_committed() {
                    tally.observe_commit();
                } else if archive.is_rolled_back() {
                    tally.observe_rollback();
                }
                continue;
            }

            match archive.commit(false) {
                Ok(()) => {
                    archive.mark_committed(false);
                    tally.observe_commit();
                    tracing::info!("Branch {} committed", branch);
                }
                Err(err) => {
                    let first_failure = !failure_seen && !tally.commit_seen();
                    failure_seen = true;
                    match err.kind() {
                        XaErrorKind::HeuristicHazard | XaErrorKind::HeuristicCommit => {
                            archive.mark_committed(true);
                            tally.observe_commit();
                            tracing::warn!("Branch {} heuristically committed: {}", branch, err);
                        }
                        XaErrorKind::HeuristicRollback => {
                            archive.mark_rolled_back(true);
                            tally.observe_rollback();
                            tracing::warn!("Branch {} heuristically rolled back: {}", branch, err);
                        }
                        XaErrorKind::HeuristicMixed => {
                            archive.mark_heuristic_mixed();
                            tally.observe_commit();
                            tally.observe_rollback();
                            tracing::warn!("Branch {} split heuristically: {}", branch, err);
                        }
                        XaErrorKind::UnknownBranch => {
                            // The resource has forgotten the branch. Fold a
                            // disposition recorded earlier; otherwise the
                            // prepare vote decides: a commit-ready branch is
                            // taken as committed, anything unvoted as rolled
                            // back.
                            if archive.is_committed() {
                                tally.observe_commit();
                            } else if archive.is_rolled_back() {
                                tally.observe_rollback();
                            } else {
                                match archive.vote() {
                                    Some(Vote::Ok) => {
                                        archive.mark_committed(false);
                                        tally.observe_commit();
                                    }
                                    Some(Vote::ReadOnly) => archive.mark_completed(),
                                    None => {
                                        archive.mark_rolled_back(false);
                                        tally.observe_rollback();
                                    }
                                }
                            }
                            tracing::warn!("Branch {} unknown to its resource: {}", branch, err);
                        }
                        XaErrorKind::ResourceUnavailable
                        | XaErrorKind::InvalidArguments
                        | XaErrorKind::ImproperContext => {
                            tally.observe_indeterminate();
                            tracing::warn!("Branch {} commit outcome unknown: {}", branch, err);
                        }
                        XaErrorKind::Rollback(_)
                        | XaErrorKind::ResourceManagerError
                        | XaErrorKind::DuplicateBranch
                        | XaErrorKind::OutsideTransaction
                            if first_failure =>
                        {
                            tracing::warn!(
                                "Branch {} refused commit before any branch committed, \
                                 rolling the transaction back: {}",
                                branch,
                                err
                            );
                            compensate = true;
                            break;
                        }
                        XaErrorKind::Rollback(_)
                        | XaErrorKind::ResourceManagerError
                        | XaErrorKind::DuplicateBranch
                        | XaErrorKind::OutsideTransaction => {
                            archive.mark_rolled_back(false);
                            tally.observe_rollback();
                            tracing::warn!("Branch {} rolled back during commit: {}", branch, err);
                        }
                    }
                }
            }
        }

        if compensate {
            // The failed branch was left incomplete, so the rollback sweep
            // drives it again along with every remaining branch.
            let outcome = match self.rollback_sweep(inner)? {
                TransactionOutcome::RolledBack => TransactionOutcome::HeuristicRollback,
                other => other,
            };
            return Ok(outcome);
        }

        let resolved = tally.resolve_commit();
        if tally.is_indeterminate() {
            return Err(CoordinatorError::Indeterminate {
                resolved: tally.commit_signal(),
            });
        }
        Ok(resolved)
    }

    /// The rollback sweep: visit every branch once, classify failures,
    /// resolve the tally.
    fn rollback_sweep(&self, inner: &mut TerminatorInner) -> Result<TransactionOutcome> {
        let mut tally = OutcomeTally::new();

        for (branch, archive) in inner.branches.iter_mut() {
            if archive.is_completed() {
                if archive.is_committed() {
                    tally.observe_commit();
                } else if archive.is_rolled_back() {
                    tally.observe_rollback();
                }
                continue;
            }

            match archive.rollback() {
                Ok(()) => {
                    archive.mark_rolled_back(false);
                    tally.observe_rollback();
                    tracing::info!("Branch {} rolled back", branch);
                }
                Err(err) => match err.kind() {
                    XaErrorKind::HeuristicHazard | XaErrorKind::HeuristicCommit => {
                        archive.mark_committed(true);
                        tally.observe_commit();
                        tracing::warn!(
                            "Branch {} heuristically committed during rollback: {}",
                            branch,
                            err
                        );
                    }
                    XaErrorKind::HeuristicMixed => {
                        archive.mark_heuristic_mixed();
                        tally.observe_commit();
                        tally.observe_rollback();
                        tracing::warn!("Branch {} split heuristically: {}", branch, err);
                    }
                    XaErrorKind::HeuristicRollback => {
                        archive.mark_rolled_back(true);
                        tally.observe_rollback();
                        tracing::warn!("Branch {} heuristically rolled back: {}", branch, err);
                    }
                    XaErrorKind::ImproperContext => {
                        // Rollback reached the branch in the wrong protocol
                        // state; the recorded vote says which state that was.
                        match archive.vote() {
                            Some(Vote::Ok) => {
                                // Prepared and answering rollback with a
                                // context error: the branch is on the commit
                                // path. Dissociate and retry once as
                                // cleanup, tolerating failure, but record it
                                // committed either way.
                                if let Err(cleanup) =
                                    archive.end(EndFlag::Success).and_then(|()| archive.rollback())
                                {
                                    tracing::warn!(
                                        "Branch {} cleanup after context error failed: {}",
                                        branch,
                                        cleanup
                                    );
                                }
                                archive.mark_committed(false);
                                tally.observe_commit();
                                tracing::warn!("Branch {} already on the commit path", branch);
                            }
                            Some(Vote::ReadOnly) => {
                                // Nothing to roll back.
                            }
                            None => {
                                // Never voted, so the branch is still
                                // associated. Force the dissociation and
                                // roll back.
                                let retried =
                                    archive.end(EndFlag::Fail).and_then(|()| archive.rollback());
                                match retried {
                                    Ok(()) => {
                                        archive.mark_rolled_back(false);
                                        tally.observe_rollback();
                                        tracing::info!(
                                            "Branch {} rolled back after forced end",
                                            branch
                                        );
                                    }
                                    Err(retry_err) => {
                                        tally.observe_indeterminate();
                                        tracing::warn!(
                                            "Branch {} rollback unfinished: {}",
                                            branch,
                                            retry_err
                                        );
                                    }
                                }
                            }
                        }
                    }
                    XaErrorKind::UnknownBranch | XaErrorKind::ResourceManagerError => {
                        // The resource is allowed to drop a branch it has
                        // rolled back.
                        archive.mark_rolled_back(false);
                        tally.observe_rollback();
                        tracing::info!("Branch {} treated as rolled back: {}", branch, err);
                    }
                    XaErrorKind::ResourceUnavailable | XaErrorKind::InvalidArguments => {
                        tally.observe_indeterminate();
                        tracing::warn!("Branch {} rollback outcome unknown: {}", branch, err);
                    }
                    XaErrorKind::Rollback(_)
                    | XaErrorKind::DuplicateBranch
                    | XaErrorKind::OutsideTransaction => {
                        archive.mark_rolled_back(false);
                        tally.observe_rollback();
                        tracing::info!("Branch {} rolled back: {}", branch, err);
                    }
                },
            }
        }

        let resolved = tally.resolve_rollback();
        if tally.is_indeterminate() {
            return Err(CoordinatorError::Indeterminate {
                resolved: tally.rollback_signal(),
            });
        }
        Ok(resolved)
    }

    // Enlistment.

    /// Enlist a resource into the transaction.
    ///
    /// A resource already represented in the branch set joins its existing
    /// branch; otherwise a fresh branch is derived, sized to the time the
    /// transaction has left, and started. Returns `false` when the
    /// resource reports the branch as already enlisted elsewhere or the
    /// association as invalid, without treating that as an error.
    pub fn enlist_resource(&self, descriptor: Box<dyn XaResourceDescriptor>) -> Result<bool> {
        let mut inner = self.inner.lock();

        if let Some(archive) = Self::locate_existed(&mut inner.branches, descriptor.as_ref()) {
            return match archive.start(StartFlag::Join) {
                Ok(()) => {
                    archive.set_delisted(false);
                    tracing::info!(
                        "Branch {} joined by resource {}",
                        archive.xid(),
                        archive.identifier()
                    );
                    Ok(true)
                }
                Err(err) => {
                    tracing::error!("Branch {} join failed: {}", archive.xid(), err);
                    Self::classify_enlist_failure(err)
                }
            };
        }

        let branch = self.context.xid().new_branch();
        let mut archive = BranchArchive::new(descriptor, branch.clone());
        let remaining = self.context.remaining_seconds(Timestamp::now());

        let started = archive
            .set_timeout(remaining)
            .and_then(|_| archive.start(StartFlag::New));
        match started {
            Ok(()) => {
                tracing::info!(
                    "Branch {} enlisted for resource {}, timeout: {}s",
                    branch,
                    archive.identifier(),
                    remaining
                );
                inner.branches.insert(branch, archive);
                Ok(true)
            }
            Err(err) => {
                tracing::error!("Branch {} enlistment failed: {}", branch, err);
                Self::classify_enlist_failure(err)
            }
        }
    }

    /// Dissociate a resource's branch with the supplied flag.
    ///
    /// Returns `false` when the resource rejected the dissociation as
    /// invalid without endangering the transaction.
    pub fn delist_resource(
        &self,
        descriptor: &dyn XaResourceDescriptor,
        flag: EndFlag,
    ) -> Result<bool> {
        let mut inner = self.inner.lock();

        match Self::locate_existed(&mut inner.branches, descriptor) {
            Some(archive) => Self::delist_archive(archive, flag),
            None => Err(CoordinatorError::NotEnlisted {
                identifier: descriptor.identifier().to_string(),
            }),
        }
    }

    /// Suspend every branch still associated. Every branch is attempted;
    /// the strongest failure is reported after the full pass.
    pub fn suspend_all_resources(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        let mut rollback_required = false;
        let mut system_failure = false;
        for archive in inner.branches.values_mut() {
            if archive.is_delisted() {
                continue;
            }
            match Self::delist_archive(archive, EndFlag::Suspend) {
                Ok(_) => {}
                Err(CoordinatorError::RollbackRequired { .. }) => rollback_required = true,
                Err(_) => system_failure = true,
            }
        }
        Self::resolve_bulk(rollback_required, system_failure)
    }

    /// Re-associate every suspended branch.
    pub fn resume_all_resources(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        let mut rollback_required = false;
        let mut system_failure = false;
        for archive in inner.branches.values_mut() {
            if !archive.is_delisted() {
                continue;
            }
            match Self::resume_archive(archive) {
                Ok(_) => {}
                Err(CoordinatorError::RollbackRequired { .. }) => rollback_required = true,
                Err(_) => system_failure = true,
            }
        }
        Self::resolve_bulk(rollback_required, system_failure)
    }

    /// Dissociate every branch still associated, with completion
    /// semantics. Called before phase one.
    pub fn delist_all_resources(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        let mut rollback_required = false;
        let mut system_failure = false;
        for archive in inner.branches.values_mut() {
            if archive.is_delisted() {
                continue;
            }
            match Self::delist_archive(archive, EndFlag::Success) {
                Ok(_) => {}
                Err(CoordinatorError::RollbackRequired { .. }) => rollback_required = true,
                Err(_) => system_failure = true,
            }
        }
        Self::resolve_bulk(rollback_required, system_failure)
    }

    /// Find the branch already backed by the same resource manager:
    /// identifier match first, then the identity probe. A failing probe
    /// counts as a non-match and the scan continues.
    fn locate_existed<'a>(
        branches: &'a mut BTreeMap<Xid, BranchArchive>,
        descriptor: &dyn XaResourceDescriptor,
    ) -> Option<&'a mut BranchArchive> {
        branches.values_mut().find(|archive| {
            archive.identifier() == descriptor.identifier()
                && archive.descriptor().is_same_rm(descriptor).unwrap_or(false)
        })
    }

    fn delist_archive(archive: &mut BranchArchive, flag: EndFlag) -> Result<bool> {
        match archive.end(flag) {
            Ok(()) => {
                archive.set_delisted(true);
                tracing::info!("Branch {} delisted, flag: {}", archive.xid(), flag);
                Ok(true)
            }
            Err(err) => {
                tracing::error!("Branch {} delist failed: {}", archive.xid(), err);
                match err.kind() {
                    XaErrorKind::UnknownBranch
                    | XaErrorKind::InvalidArguments
                    | XaErrorKind::ImproperContext => Ok(false),
                    XaErrorKind::ResourceUnavailable | XaErrorKind::ResourceManagerError => {
                        Err(CoordinatorError::SystemFailure { source: Some(err) })
                    }
                    XaErrorKind::Rollback(_)
                    | XaErrorKind::HeuristicCommit
                    | XaErrorKind::HeuristicRollback
                    | XaErrorKind::HeuristicMixed
                    | XaErrorKind::HeuristicHazard
                    | XaErrorKind::DuplicateBranch
                    | XaErrorKind::OutsideTransaction => {
                        Err(CoordinatorError::RollbackRequired { source: Some(err) })
                    }
                }
            }
        }
    }

    fn resume_archive(archive: &mut BranchArchive) -> Result<bool> {
        match archive.start(StartFlag::Resume) {
            Ok(()) => {
                archive.set_delisted(false);
                tracing::info!("Branch {} resumed", archive.xid());
                Ok(true)
            }
            Err(err) => {
                tracing::error!("Branch {} resume failed: {}", archive.xid(), err);
                Self::classify_enlist_failure(err)
            }
        }
    }

    fn classify_enlist_failure(err: XaError) -> Result<bool> {
        match err.kind() {
            // The resource has already seen this branch.
            XaErrorKind::DuplicateBranch => Ok(false),
            XaErrorKind::OutsideTransaction
            | XaErrorKind::UnknownBranch
            | XaErrorKind::InvalidArguments
            | XaErrorKind::ImproperContext => Ok(false),
            XaErrorKind::ResourceUnavailable | XaErrorKind::ResourceManagerError => {
                Err(CoordinatorError::SystemFailure { source: Some(err) })
            }
            XaErrorKind::Rollback(_)
            | XaErrorKind::HeuristicCommit
            | XaErrorKind::HeuristicRollback
            | XaErrorKind::HeuristicMixed
            | XaErrorKind::HeuristicHazard => {
                Err(CoordinatorError::RollbackRequired { source: Some(err) })
            }
        }
    }

    fn resolve_bulk(rollback_required: bool, system_failure: bool) -> Result<()> {
        if rollback_required {
            Err(CoordinatorError::RollbackRequired { source: None })
        } else if system_failure {
            Err(CoordinatorError::SystemFailure { source: None })
        } else {
            Ok(())
        }
    }
}
