//! Per-repo cross-process locks
//!
//! Each repo id maps to one marker file under the locks directory. The lock is
//! an OS advisory lock on an open handle of that file, so it disappears when
//! the handle is closed, including when the holding process dies. The marker
//! file itself is never deleted: unlinking it while another process holds or
//! waits on it would let two processes lock two different inodes.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;

use crate::io::retry_while_busy;
use crate::{Error, Result};

/// How to behave when a lock is already held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockPolicy {
    /// Fail immediately with [`Error::LockBusy`]
    #[default]
    FailFast,
    /// Retry with exponential backoff for at most `max_wait`
    Retry { max_wait: Duration },
}

/// Hands out [`RepoLock`]s for keys under one directory.
#[derive(Debug, Clone)]
pub struct LockManager {
    dir: PathBuf,
}

impl LockManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the lock markers.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the marker for `key`.
    pub fn marker_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.lock"))
    }

    /// Acquire the exclusive lock for `key` according to `policy`.
    pub fn acquire(&self, key: &str, policy: LockPolicy) -> Result<RepoLock> {
        match policy {
            LockPolicy::FailFast => self.try_acquire(key),
            LockPolicy::Retry { max_wait } => retry_while_busy(max_wait, || self.try_acquire(key)),
        }
    }

    /// Whether some handle currently holds the lock for `key`.
    pub fn is_locked(&self, key: &str) -> Result<bool> {
        match self.try_acquire(key) {
            Ok(_lock) => Ok(false),
            Err(e) if e.is_lock_busy() => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn try_acquire(&self, key: &str) -> Result<RepoLock> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let path = self.marker_path(key);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                tracing::debug!(key, path = %path.display(), "lock busy");
                return Err(Error::LockBusy { path });
            }
            return Err(Error::io(&path, e));
        }

        // Holder pid is informational only
        let _ = file
            .set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| writeln!(file, "{}", std::process::id()));

        tracing::debug!(key, "lock acquired");
        Ok(RepoLock {
            file,
            path,
            key: key.to_string(),
        })
    }
}

/// A held lock. Released on drop.
#[derive(Debug)]
pub struct RepoLock {
    file: File,
    path: PathBuf,
    key: String,
}

impl RepoLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        tracing::debug!(key = %self.key, "lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_is_busy() {
        let dir = tempdir().unwrap();
        let locks = LockManager::new(dir.path().join("locks"));

        let held = locks.acquire("01ABC", LockPolicy::FailFast).unwrap();
        let err = locks.acquire("01ABC", LockPolicy::FailFast).unwrap_err();
        assert!(err.is_lock_busy());
        assert_eq!(held.key(), "01ABC");
    }

    #[test]
    fn drop_releases() {
        let dir = tempdir().unwrap();
        let locks = LockManager::new(dir.path());

        drop(locks.acquire("k", LockPolicy::FailFast).unwrap());
        assert!(!locks.is_locked("k").unwrap());
        locks.acquire("k", LockPolicy::FailFast).unwrap();
    }

    #[test]
    fn different_keys_do_not_contend() {
        let dir = tempdir().unwrap();
        let locks = LockManager::new(dir.path());

        let _a = locks.acquire("a", LockPolicy::FailFast).unwrap();
        let _b = locks.acquire("b", LockPolicy::FailFast).unwrap();
        assert!(locks.is_locked("a").unwrap());
    }
}
