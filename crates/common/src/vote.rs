//! Prepare-phase votes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict a resource branch returns from the prepare phase.
///
/// A read-only vote completes the branch immediately: it has nothing to
/// commit or roll back, so the second phase skips it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    /// Branch made no changes; it is finished and excluded from phase two.
    ReadOnly,
    /// Branch is prepared and awaits the commit or rollback decision.
    Ok,
}

impl Vote {
    /// Convert to string label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::Ok => "ok",
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(Vote::ReadOnly.as_str(), "read_only");
        assert_eq!(Vote::Ok.to_string(), "ok");
    }
}
