//! Per-part synchronization with a repo's home storage location
//!
//! - **decision**: the pure push/pull/no-op/conflict table
//! - **baseline**: persistent last-agreed fingerprints
//! - **engine**: measuring, locking and transferring
//! - **report**: per-part outcomes

mod baseline;
mod decision;
mod engine;
mod report;

pub use baseline::BaselineStore;
pub use decision::{ConflictKind, Decision, decide};
pub use engine::SyncEngine;
pub use report::{PartOutcome, PartStatus, SyncReport};
