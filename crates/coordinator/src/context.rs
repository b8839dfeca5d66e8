//! Transaction-scoped context
//!
//! Supplied by the enclosing transaction manager: the global identifier plus
//! the absolute expiration deadline that branch timeouts are sized against
//! at enlistment.

use serde::{Deserialize, Serialize};
use terminus_common::{Timestamp, Xid};

/// Per-transaction context the coordinator works under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionContext {
    xid: Xid,
    expires_at: Timestamp,
}

impl TransactionContext {
    /// Create a context for a global identifier expiring at `expires_at`.
    pub fn new(xid: Xid, expires_at: Timestamp) -> Self {
        Self { xid, expires_at }
    }

    /// The global transaction identifier.
    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    /// Absolute expiration deadline.
    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    /// Whole seconds remaining until expiration, measured from `now`. Zero
    /// once the deadline has passed.
    pub fn remaining_seconds(&self, now: Timestamp) -> u64 {
        self.expires_at.remaining_seconds(now)
    }
}
