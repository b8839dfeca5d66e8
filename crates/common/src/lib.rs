//! Common types for terminus
//!
//! This crate defines:
//! - XA transaction identifiers (UUIDv7-backed gtrid/bqual generation)
//! - Prepare-phase votes
//! - Physical timestamps (milliseconds since Unix epoch)

mod timestamp;
mod vote;
mod xid;

pub use timestamp::Timestamp;
pub use vote::Vote;
pub use xid::{Xid, DEFAULT_FORMAT_ID, MAX_BQUAL_LENGTH, MAX_GTRID_LENGTH};
