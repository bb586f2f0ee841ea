//! Core synchronization layer for Yard
//!
//! Keeps many small content trees ("repos") consistent across machines and
//! storage locations without a central server:
//!
//! - **config**: per-machine configuration, groups and storage locations
//! - **model**: repo ids, records and sync baselines
//! - **index**: record files and the cached repo index
//! - **storage**: backends for local and rclone storage locations
//! - **sync**: the per-part push/pull/no-op/conflict engine
//! - **inclusion**: materializing and evicting repo content
//! - **projection**: the flat and grouped symlink views
//! - **batch**: bounded parallel runs over many repos
//!
//! # Architecture
//!
//! ```text
//!                 yard-cli
//!                    |
//!                  Yard
//!        +-----------+-----------+
//!        |           |           |
//!   Inclusion   SyncEngine   Projector
//!        |      |        |       |
//!        +-- Storage  Metadata  LinkStore
//!                    |
//!                 yard-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use yard_core::{Config, RepoPart, Yard};
//!
//! let yard = Yard::open(&Config::default_config_path())?;
//! let record = yard.new_repo("notes", None, &[])?;
//! let report = yard.sync(&record, &RepoPart::ALL)?.into_result()?;
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod inclusion;
pub mod index;
pub mod model;
pub mod projection;
pub mod storage;
pub mod sync;
pub mod yard;

pub use batch::{BatchReport, RepoResult};
pub use config::{Config, GroupConfig, GroupFilter, StorageLocationConfig, StorageType, TitleMode};
pub use error::{Error, Result};
pub use inclusion::{InclusionManager, InclusionOutcome};
pub use index::{MetadataStore, RecordFailure, RepoIndex};
pub use model::{PendingTransfer, RepoId, RepoPart, RepoRecord, SyncRecord};
pub use projection::{ReconcileReport, SymlinkProjector, TitleCollision};
pub use storage::{ChangeSet, Direction, LocalBackend, RcloneBackend, StorageBackend};
pub use sync::{ConflictKind, Decision, PartOutcome, PartStatus, SyncEngine, SyncReport};
pub use yard::{DiscoveryReport, NewRepo, Yard};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_error_names_repo_and_part() {
        let error = Error::SyncConflict {
            repo: "01HZX3J8Q0M5V2W4Y6Z8A0B2C4__notes".into(),
            part: RepoPart::Data,
            kind: ConflictKind::BothChanged,
        };
        let display = error.to_string();
        assert!(display.contains("__notes"), "got: {display}");
        assert!(display.contains("data"), "got: {display}");
        assert!(!error.is_retryable());
    }

    #[test]
    fn lock_contention_is_retryable() {
        let error = Error::LockContention { repo: "r".into() };
        assert!(error.is_retryable());
    }
}
