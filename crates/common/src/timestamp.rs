//! Physical timestamps: milliseconds since the Unix epoch
//!
//! Used for transaction expiration deadlines and the remaining-timeout value
//! pushed into resource branches at enlistment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock timestamp in milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        Self(millis)
    }

    /// Create from milliseconds since the Unix epoch.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the Unix epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`; zero if `self` is not
    /// the later of the two.
    pub fn saturating_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Whole seconds remaining until this timestamp, measured from `now`.
    /// Zero once the deadline has passed.
    pub fn remaining_seconds(&self, now: Timestamp) -> u64 {
        self.0.saturating_sub(now.0) / 1000
    }

    /// The timestamp `seconds` later than this one.
    pub fn plus_seconds(&self, seconds: u64) -> Timestamp {
        Self(self.0.saturating_add(seconds.saturating_mul(1000)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
