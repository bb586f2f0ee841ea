//! Well-known names in the Yard on-disk layout.

use std::path::Path;

/// Fixed file and directory names used under the data directory and inside
/// storage locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YardPath {
    /// `local_store` (per-location copies of repos on this machine)
    LocalStore,
    /// `sync_records` (per-part baselines)
    SyncRecords,
    /// `locks` (per-repo lock markers)
    Locks,
    /// `repo_index.json` (index cache)
    IndexCache,
    /// `yard.log` (per-machine log file)
    LogFile,
    /// `meta` (METADATA part directory inside a repo)
    MetaDir,
    /// `data` (DATA part directory inside a repo)
    DataDir,
    /// `repometa.toml` (the record file inside `meta`)
    RecordFile,
    /// `.data.staging` (DATA materialization in progress)
    StagingDir,
}

impl YardPath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalStore => "local_store",
            Self::SyncRecords => "sync_records",
            Self::Locks => "locks",
            Self::IndexCache => "repo_index.json",
            Self::LogFile => "yard.log",
            Self::MetaDir => "meta",
            Self::DataDir => "data",
            Self::RecordFile => "repometa.toml",
            Self::StagingDir => ".data.staging",
        }
    }
}

impl AsRef<Path> for YardPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for YardPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for YardPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Separator between id and name in an index name.
pub const INDEX_NAME_SEPARATOR: &str = "__";

/// Ignore patterns applied when a config does not set its own.
pub const DEFAULT_IGNORE: &[&str] = &[".venv/", "node_modules/", "__pycache__/"];
