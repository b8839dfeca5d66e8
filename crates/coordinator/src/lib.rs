//! Transaction coordinator driving two-phase commit across XA-style
//! resource branches.
//!
//! One [`XaTerminator`] owns the branch set of one global transaction. It
//! enlists resources as branches, dissociates them when the application
//! hands the transaction back, then drives the prepare, commit, rollback
//! and forget sweeps through every branch, classifying per-branch failure
//! codes into a single [`TransactionOutcome`].
//!
//! This crate defines:
//! - [`XaTerminator`]: the coordinator for one transaction's branch set
//! - [`BranchArchive`]: one enlisted branch plus its recorded protocol state
//! - [`BranchSnapshot`]: the plain-data branch image handed to persistence
//! - [`TransactionContext`]: identifier and deadline the coordinator works under
//! - [`TransactionOutcome`]: the resolved disposition reported to the caller
//! - [`CoordinatorError`]: the classified failure conditions

pub mod archive;
pub mod context;
pub mod error;
pub mod outcome;
pub mod terminator;

pub use archive::{BranchArchive, BranchSnapshot};
pub use context::TransactionContext;
pub use error::{CoordinatorError, Result};
pub use outcome::TransactionOutcome;
pub use terminator::XaTerminator;
