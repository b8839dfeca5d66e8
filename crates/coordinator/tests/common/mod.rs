//! Common test utilities for integration tests

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use terminus_common::{Timestamp, Vote, Xid};
use terminus_coordinator::{BranchSnapshot, TransactionContext, XaTerminator};
use terminus_resource::{
    EndFlag, StartFlag, XaError, XaResource, XaResourceDescriptor, XaResult,
};

/// One recorded call against a scripted resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start(StartFlag),
    End(EndFlag),
    Prepare,
    Commit { one_phase: bool },
    Rollback,
    Forget,
    SetTimeout(u64),
}

/// Handle onto a scripted resource's call log, kept after the resource is
/// boxed away into the terminator.
#[derive(Clone)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    #[allow(dead_code)]
    pub fn contains(&self, call: &Call) -> bool {
        self.0.lock().contains(call)
    }

    #[allow(dead_code)]
    pub fn count(&self, call: &Call) -> usize {
        self.0.lock().iter().filter(|c| *c == call).count()
    }
}

#[derive(Default)]
struct Script {
    start: VecDeque<XaResult<()>>,
    end: VecDeque<XaResult<()>>,
    prepare: VecDeque<XaResult<Vote>>,
    commit: VecDeque<XaResult<()>>,
    rollback: VecDeque<XaResult<()>>,
    forget: VecDeque<XaResult<()>>,
}

/// Resource whose responses are scripted per call. Each protocol verb pops
/// the next scripted result; an empty queue answers with success (and an
/// `Ok` vote for prepare).
pub struct ScriptedResource {
    identifier: String,
    script: Script,
    calls: Arc<Mutex<Vec<Call>>>,
    same_rm_fails: bool,
    timeout: u64,
}

impl ScriptedResource {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            script: Script::default(),
            calls: Arc::new(Mutex::new(Vec::new())),
            same_rm_fails: false,
            timeout: 0,
        }
    }

    #[allow(dead_code)]
    pub fn on_start(mut self, result: XaResult<()>) -> Self {
        self.script.start.push_back(result);
        self
    }

    #[allow(dead_code)]
    pub fn on_end(mut self, result: XaResult<()>) -> Self {
        self.script.end.push_back(result);
        self
    }

    #[allow(dead_code)]
    pub fn on_prepare(mut self, result: XaResult<Vote>) -> Self {
        self.script.prepare.push_back(result);
        self
    }

    #[allow(dead_code)]
    pub fn on_commit(mut self, result: XaResult<()>) -> Self {
        self.script.commit.push_back(result);
        self
    }

    #[allow(dead_code)]
    pub fn on_rollback(mut self, result: XaResult<()>) -> Self {
        self.script.rollback.push_back(result);
        self
    }

    #[allow(dead_code)]
    pub fn on_forget(mut self, result: XaResult<()>) -> Self {
        self.script.forget.push_back(result);
        self
    }

    /// Make the resource-manager identity probe fail, which the terminator
    /// must treat as "not the same resource manager."
    #[allow(dead_code)]
    pub fn failing_same_rm(mut self) -> Self {
        self.same_rm_fails = true;
        self
    }

    pub fn call_log(&self) -> CallLog {
        CallLog(Arc::clone(&self.calls))
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl XaResource for ScriptedResource {
    fn start(&mut self, _xid: &Xid, flag: StartFlag) -> XaResult<()> {
        self.record(Call::Start(flag));
        self.script.start.pop_front().unwrap_or(Ok(()))
    }

    fn end(&mut self, _xid: &Xid, flag: EndFlag) -> XaResult<()> {
        self.record(Call::End(flag));
        self.script.end.pop_front().unwrap_or(Ok(()))
    }

    fn prepare(&mut self, _xid: &Xid) -> XaResult<Vote> {
        self.record(Call::Prepare);
        self.script.prepare.pop_front().unwrap_or(Ok(Vote::Ok))
    }

    fn commit(&mut self, _xid: &Xid, one_phase: bool) -> XaResult<()> {
        self.record(Call::Commit { one_phase });
        self.script.commit.pop_front().unwrap_or(Ok(()))
    }

    fn rollback(&mut self, _xid: &Xid) -> XaResult<()> {
        self.record(Call::Rollback);
        self.script.rollback.pop_front().unwrap_or(Ok(()))
    }

    fn forget(&mut self, _xid: &Xid) -> XaResult<()> {
        self.record(Call::Forget);
        self.script.forget.pop_front().unwrap_or(Ok(()))
    }

    fn transaction_timeout(&self) -> XaResult<u64> {
        Ok(self.timeout)
    }

    fn set_transaction_timeout(&mut self, seconds: u64) -> XaResult<bool> {
        self.record(Call::SetTimeout(seconds));
        self.timeout = seconds;
        Ok(true)
    }
}

impl XaResourceDescriptor for ScriptedResource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn is_same_rm(&self, other: &dyn XaResourceDescriptor) -> Result<bool, XaError> {
        if self.same_rm_fails {
            return Err(XaError::new(
                terminus_resource::XaErrorKind::ResourceManagerError,
                "identity probe failed",
            ));
        }
        Ok(self.identifier == other.identifier())
    }
}

/// Terminator for a fresh transaction expiring 60 seconds out.
pub fn new_terminator() -> XaTerminator {
    let context = TransactionContext::new(Xid::new_global(), Timestamp::now().plus_seconds(60));
    XaTerminator::new(context)
}

/// Terminator with the given resources enlisted, in order.
///
/// Branch identifiers order by creation time, so enlistments are spaced a
/// few milliseconds apart to keep the sweep order equal to the enlistment
/// order.
#[allow(dead_code)]
pub fn terminator_with(resources: Vec<ScriptedResource>) -> XaTerminator {
    let terminator = new_terminator();
    for resource in resources {
        std::thread::sleep(Duration::from_millis(2));
        let enlisted = terminator
            .enlist_resource(Box::new(resource))
            .expect("enlistment failed");
        assert!(enlisted);
    }
    terminator
}

/// The snapshot of the branch enlisted for `identifier`.
#[allow(dead_code)]
pub fn snapshot_of(terminator: &XaTerminator, identifier: &str) -> BranchSnapshot {
    terminator
        .branch_snapshots()
        .into_iter()
        .find(|snapshot| snapshot.identifier == identifier)
        .expect("branch not enlisted")
}
