//! Resource-branch contract for terminus
//!
//! This crate defines:
//! - The synchronous branch surface the coordinator drives (`XaResource`)
//! - The identity extension used at enlistment (`XaResourceDescriptor`)
//! - Association flags (`StartFlag`, `EndFlag`)
//! - The closed branch-failure classification (`XaError`, `XaErrorKind`)

mod error;
mod resource;

pub use error::{RollbackReason, XaError, XaErrorKind, XaResult};
pub use resource::{EndFlag, StartFlag, XaResource, XaResourceDescriptor};
