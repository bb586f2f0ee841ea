//! Filesystem layer for Yard
//!
//! Everything that touches the local disk below the domain model lives here:
//!
//! - **path**: forward-slash normalized paths
//! - **io**: atomic writes guarded by advisory locks
//! - **tree**: directory scanning with ignore patterns
//! - **fingerprint**: structural/content digests over a scanned tree
//! - **lock**: per-repo cross-process exclusive locks
//! - **link**: the `LinkStore` abstraction used for user-facing views
//! - **config**: format-agnostic serde load/save

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod fingerprint;
pub mod io;
pub mod link;
pub mod lock;
pub mod path;
pub mod tree;

pub use config::ConfigStore;
pub use constants::YardPath;
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, FingerprintMode};
pub use io::RobustnessConfig;
pub use link::{LinkStore, SymlinkStore};
pub use lock::{LockManager, LockPolicy, RepoLock};
pub use path::{NormalizedPath, validate_identifier};
pub use tree::{IgnoreRules, ScanOptions, TreeEntry};
