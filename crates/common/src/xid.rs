//! XA transaction identifiers
//!
//! A global identifier names the whole transaction; every enlisted branch
//! gets its own identifier sharing the global gtrid with a fresh branch
//! qualifier. Qualifiers are UUIDv7 bytes, so identifiers generated later
//! compare greater and a sorted branch set iterates in enlistment order.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Format identifier stamped on generated identifiers.
pub const DEFAULT_FORMAT_ID: i32 = 0x5458;

/// Maximum gtrid length in bytes (XA limit).
pub const MAX_GTRID_LENGTH: usize = 64;

/// Maximum branch qualifier length in bytes (XA limit).
pub const MAX_BQUAL_LENGTH: usize = 64;

/// XA transaction identifier: format id, global transaction id, branch
/// qualifier.
///
/// A global identifier carries an empty qualifier. Ordering is lexicographic
/// over (format_id, gtrid, bqual), which gives any sorted branch set a
/// deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Xid {
    format_id: i32,
    gtrid: Vec<u8>,
    bqual: Vec<u8>,
}

impl Xid {
    /// Create an identifier from raw parts, enforcing the XA length limits.
    pub fn new(format_id: i32, gtrid: Vec<u8>, bqual: Vec<u8>) -> Result<Self, String> {
        if gtrid.len() > MAX_GTRID_LENGTH {
            return Err(format!(
                "gtrid is {} bytes, limit is {}",
                gtrid.len(),
                MAX_GTRID_LENGTH
            ));
        }
        if bqual.len() > MAX_BQUAL_LENGTH {
            return Err(format!(
                "bqual is {} bytes, limit is {}",
                bqual.len(),
                MAX_BQUAL_LENGTH
            ));
        }
        Ok(Self {
            format_id,
            gtrid,
            bqual,
        })
    }

    /// Generate a fresh global identifier: UUIDv7 gtrid, empty qualifier.
    pub fn new_global() -> Self {
        Self {
            format_id: DEFAULT_FORMAT_ID,
            gtrid: Uuid::now_v7().as_bytes().to_vec(),
            bqual: Vec::new(),
        }
    }

    /// Derive a branch identifier: same format id and gtrid, fresh UUIDv7
    /// qualifier.
    pub fn new_branch(&self) -> Self {
        Self {
            format_id: self.format_id,
            gtrid: self.gtrid.clone(),
            bqual: Uuid::now_v7().as_bytes().to_vec(),
        }
    }

    /// Get the format identifier.
    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    /// Get the global transaction identifier bytes.
    pub fn gtrid(&self) -> &[u8] {
        &self.gtrid
    }

    /// Get the branch qualifier bytes (empty for a global identifier).
    pub fn bqual(&self) -> &[u8] {
        &self.bqual
    }

    /// Whether this is a global identifier (no branch qualifier).
    pub fn is_global(&self) -> bool {
        self.bqual.is_empty()
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:", self.format_id)?;
        for byte in &self.gtrid {
            write!(f, "{:02x}", byte)?;
        }
        f.write_str(":")?;
        for byte in &self.bqual {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
