//! Directory aliases for user-facing views
//!
//! The view reconciler only speaks [`LinkStore`]; [`SymlinkStore`] is the
//! platform implementation on top of filesystem symlinks.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Create, inspect and remove directory aliases.
pub trait LinkStore: Send + Sync {
    /// Target of the alias at `link`, or `None` if `link` is not an alias.
    fn read_link(&self, link: &Path) -> Result<Option<PathBuf>>;

    /// Create an alias at `link` pointing to the directory `target`.
    ///
    /// Fails if something already exists at `link`.
    fn create_link(&self, target: &Path, link: &Path) -> Result<()>;

    /// Remove the alias at `link`. Never removes a real file or directory.
    fn remove_link(&self, link: &Path) -> Result<()>;

    /// Aliases directly inside `dir`. A missing `dir` has none.
    fn list_links(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Real (non-alias) subdirectories directly inside `dir`.
    fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Create `dir` and its parents.
    fn ensure_dir(&self, dir: &Path) -> Result<()>;

    /// Remove `dir` if it has no entries. Returns whether it was removed.
    fn remove_dir_if_empty(&self, dir: &Path) -> Result<bool>;

    /// Whether anything (alias or not) exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Whether the alias at `link` resolves to `target`.
    fn points_to(&self, link: &Path, target: &Path) -> Result<bool> {
        let Some(current) = self.read_link(link)? else {
            return Ok(false);
        };
        if current == target {
            return Ok(true);
        }
        match (dunce::canonicalize(&current), dunce::canonicalize(target)) {
            (Ok(a), Ok(b)) => Ok(a == b),
            _ => Ok(false),
        }
    }
}

/// [`LinkStore`] backed by filesystem symlinks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymlinkStore;

impl SymlinkStore {
    pub fn new() -> Self {
        Self
    }

    fn entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
        match fs::read_dir(dir) {
            Ok(read) => read
                .map(|entry| entry.map_err(|e| Error::io(dir, e)))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::io(dir, e)),
        }
    }
}

impl LinkStore for SymlinkStore {
    fn read_link(&self, link: &Path) -> Result<Option<PathBuf>> {
        match fs::symlink_metadata(link) {
            Ok(meta) if meta.file_type().is_symlink() => {
                fs::read_link(link).map(Some).map_err(|e| Error::io(link, e))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(link, e)),
        }
    }

    fn create_link(&self, target: &Path, link: &Path) -> Result<()> {
        #[cfg(unix)]
        let result = std::os::unix::fs::symlink(target, link);
        #[cfg(windows)]
        let result = std::os::windows::fs::symlink_dir(target, link);
        result.map_err(|e| Error::io(link, e))
    }

    fn remove_link(&self, link: &Path) -> Result<()> {
        if self.read_link(link)?.is_none() {
            return Err(Error::NotALink {
                path: link.to_path_buf(),
            });
        }
        // Directory symlinks on Windows are removed like directories
        #[cfg(windows)]
        let result = fs::remove_dir(link).or_else(|_| fs::remove_file(link));
        #[cfg(not(windows))]
        let result = fs::remove_file(link);
        result.map_err(|e| Error::io(link, e))
    }

    fn list_links(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut links = Vec::new();
        for entry in Self::entries(dir)? {
            let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
            if file_type.is_symlink() {
                links.push(entry.path());
            }
        }
        links.sort();
        Ok(links)
    }

    fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in Self::entries(dir)? {
            let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
            if file_type.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn ensure_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
    }

    fn remove_dir_if_empty(&self, dir: &Path) -> Result<bool> {
        if !Self::entries(dir)?.is_empty() {
            return Ok(false);
        }
        match fs::remove_dir(dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(dir, e)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }
}
