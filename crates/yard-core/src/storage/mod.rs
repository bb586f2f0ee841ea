//! Storage backends
//!
//! A backend is bound to one storage location. Paths passed to it are
//! relative to the location's root (`<index_name>/data`); the other end of a
//! mirror is always a directory on this machine.

mod local;
mod rclone;

pub use local::LocalBackend;
pub use rclone::RcloneBackend;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use yard_fs::{NormalizedPath, ScanOptions, TreeEntry};

use crate::Result;
use crate::config::{Config, StorageLocationConfig, StorageType};

/// Which way a mirror copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local directory to storage location
    Push,
    /// Storage location to local directory
    Pull,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => f.write_str("push"),
            Self::Pull => f.write_str("pull"),
        }
    }
}

/// Files a mirror adds, overwrites and removes on the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<NormalizedPath>,
    pub modified: Vec<NormalizedPath>,
    pub deleted: Vec<NormalizedPath>,
}

impl ChangeSet {
    /// What mirroring `source` onto `destination` would change.
    ///
    /// Entries are compared by size, then by content hash when both sides
    /// carry one, otherwise by mtime.
    pub fn between(source: &[TreeEntry], destination: &[TreeEntry]) -> Self {
        let src: BTreeMap<&NormalizedPath, &TreeEntry> =
            source.iter().map(|e| (&e.path, e)).collect();
        let dst: BTreeMap<&NormalizedPath, &TreeEntry> =
            destination.iter().map(|e| (&e.path, e)).collect();

        let mut changes = Self::default();
        for (path, s) in &src {
            match dst.get(path) {
                None => changes.added.push((*path).clone()),
                Some(d) if differs(s, d) => changes.modified.push((*path).clone()),
                Some(_) => {}
            }
        }
        for path in dst.keys() {
            if !src.contains_key(path) {
                changes.deleted.push((*path).clone());
            }
        }
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Whether applying this would overwrite or remove anything.
    pub fn is_destructive(&self) -> bool {
        !self.modified.is_empty() || !self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{} ~{} -{}",
            self.added.len(),
            self.modified.len(),
            self.deleted.len()
        )
    }
}

fn differs(a: &TreeEntry, b: &TreeEntry) -> bool {
    if a.size != b.size {
        return true;
    }
    match (&a.hash, &b.hash) {
        (Some(x), Some(y)) => x != y,
        _ => a.modified != b.modified,
    }
}

/// Uniform access to one storage location.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Name of the storage location this backend is bound to.
    fn location(&self) -> &str;

    /// Regular files under `path`, relative to `path`. A missing `path` is
    /// empty; an unreachable location is [`crate::Error::StorageUnreachable`].
    fn list(&self, path: &str, options: &ScanOptions) -> Result<Vec<TreeEntry>>;

    /// Names of the directories directly under `path`.
    fn list_dirs(&self, path: &str) -> Result<Vec<String>>;

    fn exists(&self, path: &str) -> Result<bool>;

    /// Remove `path` and everything below it. Missing is not an error.
    fn delete(&self, path: &str) -> Result<()>;

    /// Make the destination identical to the source, skipping ignored paths
    /// on both sides. With `dry_run` nothing is touched and the returned
    /// changes are a preview.
    fn mirror(
        &self,
        direction: Direction,
        local: &Path,
        remote: &str,
        options: &ScanOptions,
        dry_run: bool,
    ) -> Result<ChangeSet>;
}

/// Build the backend for one configured location.
pub fn open_backend(name: &str, location: &StorageLocationConfig) -> Arc<dyn StorageBackend> {
    match location.storage_type {
        StorageType::Local => Arc::new(LocalBackend::new(name, &location.store_path)),
        StorageType::Rclone => Arc::new(RcloneBackend::new(name, location)),
    }
}

/// Backends for every configured location, keyed by name.
pub fn open_all(config: &Config) -> BTreeMap<String, Arc<dyn StorageBackend>> {
    config
        .storage_locations
        .iter()
        .map(|(name, location)| (name.clone(), open_backend(name, location)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, size: u64, modified: i64) -> TreeEntry {
        TreeEntry {
            path: NormalizedPath::new(path),
            size,
            modified,
            hash: None,
        }
    }

    #[test]
    fn changeset_classifies_paths() {
        let source = vec![entry("new", 1, 0), entry("same", 2, 5), entry("edited", 3, 9)];
        let destination = vec![entry("same", 2, 5), entry("edited", 3, 1), entry("gone", 1, 0)];

        let changes = ChangeSet::between(&source, &destination);
        assert_eq!(changes.added, vec![NormalizedPath::new("new")]);
        assert_eq!(changes.modified, vec![NormalizedPath::new("edited")]);
        assert_eq!(changes.deleted, vec![NormalizedPath::new("gone")]);
        assert!(changes.is_destructive());
        assert_eq!(changes.to_string(), "+1 ~1 -1");
    }

    #[test]
    fn additions_alone_are_not_destructive() {
        let changes = ChangeSet::between(&[entry("a", 1, 0)], &[]);
        assert!(!changes.is_destructive());
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn hashes_win_over_mtime() {
        let mut a = entry("f", 4, 100);
        let mut b = entry("f", 4, 200);
        a.hash = Some("sha256:aa".into());
        b.hash = Some("sha256:aa".into());
        assert!(ChangeSet::between(&[a], &[b]).is_empty());
    }
}
