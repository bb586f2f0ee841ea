//! Storage location on a locally mounted filesystem

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use yard_fs::{ScanOptions, TreeEntry, tree};

use super::{ChangeSet, Direction, StorageBackend};
use crate::{Error, Result};

/// Backend for a store directory reachable through the local filesystem.
///
/// The store root must exist; a missing root (an unmounted drive, say) is
/// reported as unreachable rather than silently treated as empty.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(name: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if !self.root.is_dir() {
            return Err(Error::unreachable(
                &self.name,
                format!("store directory {} does not exist", self.root.display()),
            ));
        }
        Ok(self.root.join(path.trim_start_matches('/')))
    }

    fn unreachable(&self, e: impl std::fmt::Display) -> Error {
        Error::unreachable(&self.name, e.to_string())
    }
}

impl StorageBackend for LocalBackend {
    fn location(&self) -> &str {
        &self.name
    }

    fn list(&self, path: &str, options: &ScanOptions) -> Result<Vec<TreeEntry>> {
        let dir = self.resolve(path)?;
        tree::scan(&dir, options).map_err(|e| self.unreachable(e))
    }

    fn list_dirs(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.resolve(path)?;
        let dirs = crate::index::subdirectories(&dir).map_err(|e| self.unreachable(e))?;
        Ok(dirs
            .iter()
            .filter_map(|d| d.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.exists())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        yard_fs::io::remove_dir_if_exists(&target).map_err(|e| self.unreachable(e))?;
        Ok(())
    }

    fn mirror(
        &self,
        direction: Direction,
        local: &Path,
        remote: &str,
        options: &ScanOptions,
        dry_run: bool,
    ) -> Result<ChangeSet> {
        let remote_dir = self.resolve(remote)?;
        let (source, destination) = match direction {
            Direction::Push => (local.to_path_buf(), remote_dir),
            Direction::Pull => (remote_dir, local.to_path_buf()),
        };

        let src_entries = tree::scan(&source, options).map_err(|e| self.unreachable(e))?;
        let dst_entries = tree::scan(&destination, options).map_err(|e| self.unreachable(e))?;
        let changes = ChangeSet::between(&src_entries, &dst_entries);
        if dry_run {
            return Ok(changes);
        }

        copy_changes(&source, &destination, &changes).map_err(|e| self.unreachable(e))?;
        tracing::debug!(
            location = %self.name,
            %direction,
            changes = %changes,
            "mirror complete"
        );
        Ok(changes)
    }
}

fn copy_changes(source: &Path, destination: &Path, changes: &ChangeSet) -> yard_fs::Result<()> {
    yard_fs::io::ensure_dir(destination)?;

    for rel in changes.deleted.iter() {
        let path = destination.join(rel.to_native());
        yard_fs::io::remove_file_if_exists(&path)?;
        prune_empty_parents(&path, destination);
    }
    for rel in changes.added.iter().chain(changes.modified.iter()) {
        let from = source.join(rel.to_native());
        let to = destination.join(rel.to_native());
        if let Some(parent) = to.parent() {
            yard_fs::io::ensure_dir(parent)?;
        }
        copy_preserving_mtime(&from, &to)?;
    }
    Ok(())
}

/// Copy a file and carry its mtime over, so structural fingerprints of
/// source and destination agree.
fn copy_preserving_mtime(from: &Path, to: &Path) -> yard_fs::Result<()> {
    let modified = fs::metadata(from)
        .and_then(|m| m.modified())
        .map_err(|e| yard_fs::Error::io(from, e))?;
    fs::copy(from, to).map_err(|e| yard_fs::Error::io(to, e))?;
    // Sub-second precision is not compared; whole seconds keep both sides stable
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    File::options()
        .write(true)
        .open(to)
        .and_then(|f| f.set_modified(UNIX_EPOCH + Duration::from_secs(secs)))
        .map_err(|e| yard_fs::Error::io(to, e))
}

pub(super) fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yard_fs::{Fingerprint, FingerprintMode};
    use tempfile::tempdir;

    fn backend(dir: &Path) -> LocalBackend {
        let root = dir.join("store");
        fs::create_dir_all(&root).unwrap();
        LocalBackend::new("local", root)
    }

    #[test]
    fn push_then_fingerprints_match() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let local = dir.path().join("work");
        fs::create_dir_all(local.join("sub")).unwrap();
        fs::write(local.join("a.txt"), "a").unwrap();
        fs::write(local.join("sub/b.txt"), "bb").unwrap();

        let opts = ScanOptions::default();
        let changes = backend
            .mirror(Direction::Push, &local, "r/data", &opts, false)
            .unwrap();
        assert_eq!(changes.added.len(), 2);

        let remote = backend.list("r/data", &opts).unwrap();
        let here = tree::scan(&local, &opts).unwrap();
        assert_eq!(
            Fingerprint::compute(&remote, FingerprintMode::Structural),
            Fingerprint::compute(&here, FingerprintMode::Structural)
        );
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let local = dir.path().join("work");
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("a.txt"), "a").unwrap();

        let changes = backend
            .mirror(Direction::Push, &local, "r/data", &ScanOptions::default(), true)
            .unwrap();
        assert_eq!(changes.added.len(), 1);
        assert!(!backend.exists("r/data/a.txt").unwrap());
    }

    #[test]
    fn pull_removes_files_gone_from_remote() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let remote = backend.root().join("r/data");
        fs::create_dir_all(&remote).unwrap();
        fs::write(remote.join("keep.txt"), "k").unwrap();

        let local = dir.path().join("work");
        fs::create_dir_all(local.join("old")).unwrap();
        fs::write(local.join("old/stale.txt"), "s").unwrap();

        let changes = backend
            .mirror(Direction::Pull, &local, "r/data", &ScanOptions::default(), false)
            .unwrap();
        assert_eq!(changes.deleted.len(), 1);
        assert!(local.join("keep.txt").exists());
        assert!(!local.join("old").exists());
    }

    #[test]
    fn missing_root_is_unreachable() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new("usb", dir.path().join("not-mounted"));
        let err = backend.list("x", &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, Error::StorageUnreachable { ref location, .. } if location == "usb"));
    }

    #[test]
    fn list_dirs_and_delete() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        fs::create_dir_all(backend.root().join("one/meta")).unwrap();
        fs::create_dir_all(backend.root().join("two")).unwrap();

        assert_eq!(backend.list_dirs("").unwrap(), vec!["one", "two"]);
        backend.delete("one").unwrap();
        backend.delete("one").unwrap();
        assert_eq!(backend.list_dirs("").unwrap(), vec!["two"]);
    }
}
