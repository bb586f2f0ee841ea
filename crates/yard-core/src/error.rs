//! Error types for yard-core

use std::path::PathBuf;

use crate::model::RepoPart;
use crate::sync::ConflictKind;

/// Result type for yard-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in yard-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A storage backend call failed. Nothing was mutated; safe to retry.
    #[error("Storage location '{location}' is unreachable: {message}")]
    StorageUnreachable { location: String, message: String },

    /// Both sides of a part changed. Nothing was mutated.
    #[error("Sync conflict in {repo} ({part}): {kind}")]
    SyncConflict {
        repo: String,
        part: RepoPart,
        kind: ConflictKind,
    },

    /// Another process holds the repo's lock.
    #[error("Repo {repo} is busy (locked by another process)")]
    LockContention { repo: String },

    /// A record file could not be parsed.
    #[error("Corrupt record at {path}: {message}")]
    RecordCorrupt { path: PathBuf, message: String },

    /// Include or exclude refused in the current state.
    #[error("Cannot change inclusion of {repo}: {reason}")]
    InclusionState { repo: String, reason: String },

    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration loaded but failed validation
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("Unknown storage location '{name}'")]
    UnknownStorageLocation { name: String },

    #[error("No repo matches '{query}'")]
    RepoNotFound { query: String },

    #[error("Invalid index name '{value}': expected <id>__<name>")]
    InvalidIndexName { value: String },

    /// A repo with the same name already exists in a group with unique names
    #[error("Name '{name}' is already used by {existing} in group '{group}'")]
    NameTaken {
        name: String,
        group: String,
        existing: String,
    },

    /// The directory given to seed a new repo cannot be used.
    #[error("Cannot create a repo from {path}: {reason}")]
    InvalidSource { path: PathBuf, reason: String },

    /// A batch task panicked or was cancelled
    #[error("Task for {repo} did not complete: {message}")]
    TaskFailed { repo: String, message: String },

    // Transparent wrappers for underlying errors
    /// Filesystem error from yard-fs
    #[error(transparent)]
    Fs(#[from] yard_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnreachable { .. } | Self::LockContention { .. }
        )
    }

    pub(crate) fn unreachable(location: &str, message: impl Into<String>) -> Self {
        Self::StorageUnreachable {
            location: location.to_string(),
            message: message.into(),
        }
    }
}
