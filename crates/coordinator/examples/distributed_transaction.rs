//! Example driving a distributed transaction across two ledger resources
//!
//! Two in-memory ledgers play the resource managers. A transfer spanning
//! both is enlisted, prepared and committed through the terminator; a
//! second transaction overdraws an account and is rolled back; a third
//! touches a single ledger and takes the one-phase path.
//!
//! Run with: cargo run --example distributed_transaction

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use terminus_common::{Timestamp, Vote, Xid};
use terminus_coordinator::{TransactionContext, XaTerminator};
use terminus_resource::{
    EndFlag, RollbackReason, StartFlag, XaError, XaErrorKind, XaResource, XaResourceDescriptor,
    XaResult,
};

#[derive(Default)]
struct LedgerState {
    balances: BTreeMap<String, i64>,
    pending: Vec<(String, i64)>,
    timeout: u64,
}

/// In-memory ledger acting as one resource manager. Clones share state, so
/// the application keeps a handle while the terminator owns the enlisted
/// copy.
#[derive(Clone)]
struct Ledger {
    name: String,
    state: Arc<Mutex<LedgerState>>,
}

impl Ledger {
    fn new(name: &str, opening: &[(&str, i64)]) -> Self {
        let balances = opening
            .iter()
            .map(|(account, amount)| (account.to_string(), *amount))
            .collect();
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(LedgerState {
                balances,
                ..LedgerState::default()
            })),
        }
    }

    /// Stage a balance change under the transaction in flight.
    fn stage(&self, account: &str, delta: i64) {
        self.state.lock().pending.push((account.to_string(), delta));
    }

    fn balance(&self, account: &str) -> i64 {
        self.state.lock().balances.get(account).copied().unwrap_or(0)
    }
}

impl XaResource for Ledger {
    fn start(&mut self, _xid: &Xid, _flag: StartFlag) -> XaResult<()> {
        Ok(())
    }

    fn end(&mut self, _xid: &Xid, _flag: EndFlag) -> XaResult<()> {
        Ok(())
    }

    fn prepare(&mut self, _xid: &Xid) -> XaResult<Vote> {
        let state = self.state.lock();
        if state.pending.is_empty() {
            return Ok(Vote::ReadOnly);
        }

        let mut projected = state.balances.clone();
        for (account, delta) in &state.pending {
            let balance = projected.entry(account.clone()).or_insert(0);
            *balance += *delta;
            if *balance < 0 {
                return Err(XaError::new(
                    XaErrorKind::Rollback(RollbackReason::IntegrityViolation),
                    format!("account {} would overdraw ledger {}", account, self.name),
                ));
            }
        }
        Ok(Vote::Ok)
    }

    fn commit(&mut self, xid: &Xid, one_phase: bool) -> XaResult<()> {
        if one_phase {
            self.prepare(xid)?;
        }
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        for (account, delta) in pending {
            *state.balances.entry(account).or_insert(0) += delta;
        }
        Ok(())
    }

    fn rollback(&mut self, _xid: &Xid) -> XaResult<()> {
        self.state.lock().pending.clear();
        Ok(())
    }

    fn forget(&mut self, _xid: &Xid) -> XaResult<()> {
        Ok(())
    }

    fn transaction_timeout(&self) -> XaResult<u64> {
        Ok(self.state.lock().timeout)
    }

    fn set_transaction_timeout(&mut self, seconds: u64) -> XaResult<bool> {
        self.state.lock().timeout = seconds;
        Ok(true)
    }
}

impl XaResourceDescriptor for Ledger {
    fn identifier(&self) -> &str {
        &self.name
    }

    fn is_same_rm(&self, other: &dyn XaResourceDescriptor) -> Result<bool, XaError> {
        Ok(self.name == other.identifier())
    }
}

fn new_terminator() -> XaTerminator {
    let context = TransactionContext::new(Xid::new_global(), Timestamp::now().plus_seconds(30));
    XaTerminator::new(context)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Distributed Transfer Example ===\n");

    let bank_a = Ledger::new("bank-a", &[("alice", 100)]);
    let bank_b = Ledger::new("bank-b", &[("bob", 25)]);
    println!("✓ Opened ledgers: alice@bank-a = 100, bob@bank-b = 25\n");

    // 1. Transfer 40 from alice to bob, spanning both ledgers
    println!("=== Committing a Cross-Ledger Transfer ===");
    let terminator = new_terminator();
    let xid = terminator.context().xid().clone();

    terminator.enlist_resource(Box::new(bank_a.clone()))?;
    terminator.enlist_resource(Box::new(bank_b.clone()))?;
    println!("✓ Enlisted {} branches", terminator.branch_count());

    bank_a.stage("alice", -40);
    bank_b.stage("bob", 40);
    println!("→ Staged transfer of 40");

    terminator.delist_all_resources()?;
    let vote = terminator.prepare(&xid)?;
    println!("→ Prepared, global vote: {}", vote);

    let outcome = terminator.commit(&xid, false)?;
    println!("✓ Outcome: {}", outcome);
    println!(
        "  Balances: alice = {}, bob = {}\n",
        bank_a.balance("alice"),
        bank_b.balance("bob")
    );

    // 2. Overdraw alice; prepare refuses and the transaction rolls back
    println!("=== Aborting an Overdraw ===");
    let terminator = new_terminator();
    let xid = terminator.context().xid().clone();

    terminator.enlist_resource(Box::new(bank_a.clone()))?;
    terminator.enlist_resource(Box::new(bank_b.clone()))?;

    bank_a.stage("alice", -200);
    bank_b.stage("bob", 200);
    println!("→ Staged transfer of 200");

    terminator.delist_all_resources()?;
    match terminator.prepare(&xid) {
        Ok(vote) => println!("→ Prepared, global vote: {}", vote),
        Err(err) => println!("! Prepare refused: {}", err),
    }

    let outcome = terminator.rollback(&xid)?;
    println!("✓ Outcome: {}", outcome);
    println!(
        "  Balances unchanged: alice = {}, bob = {}\n",
        bank_a.balance("alice"),
        bank_b.balance("bob")
    );

    // 3. A single-ledger change takes the one-phase path
    println!("=== One-Phase Commit ===");
    let terminator = new_terminator();
    let xid = terminator.context().xid().clone();

    terminator.enlist_resource(Box::new(bank_b.clone()))?;
    bank_b.stage("bob", 10);
    println!("→ Staged deposit of 10 for bob");

    terminator.delist_all_resources()?;
    let outcome = terminator.commit(&xid, true)?;
    println!("✓ Outcome: {}", outcome);
    println!("  Balance: bob = {}", bank_b.balance("bob"));

    Ok(())
}

// Example output:
//
// === Distributed Transfer Example ===
//
// ✓ Opened ledgers: alice@bank-a = 100, bob@bank-b = 25
//
// === Committing a Cross-Ledger Transfer ===
// ✓ Enlisted 2 branches
// → Staged transfer of 40
// → Prepared, global vote: ok
// ✓ Outcome: committed
//   Balances: alice = 60, bob = 65
//
// === Aborting an Overdraw ===
// → Staged transfer of 200
// ! Prepare refused: Branch error: rollback(integrity_violation): account alice would overdraw ledger bank-a
// ✓ Outcome: rolled_back
//   Balances unchanged: alice = 60, bob = 65
//
// === One-Phase Commit ===
// → Staged deposit of 10 for bob
// ✓ Outcome: committed
//   Balance: bob = 75
