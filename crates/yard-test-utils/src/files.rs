//! File helpers for content trees.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Write `content` to `path`, creating parent directories.
pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Move a file's mtime `secs` seconds into the future.
///
/// Structural fingerprints compare whole-second mtimes, so tests that rewrite
/// a file with same-sized content within one second use this to make the
/// change visible.
pub fn bump_mtime(path: &Path, secs: u64) {
    let current = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or_else(|_| SystemTime::now());
    fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(current + Duration::from_secs(secs)))
        .unwrap();
}

/// Assert that `link` is a symlink whose target is `target`.
///
/// # Panics
/// Panics with a descriptive message if it is not.
pub fn assert_link_points_to(link: &Path, target: &Path) {
    let actual = fs::read_link(link)
        .unwrap_or_else(|_| panic!("Expected a symlink at {}", link.display()));
    assert_eq!(
        actual,
        target,
        "Link {} points to {} instead of {}",
        link.display(),
        actual.display(),
        target.display()
    );
}

/// Assert that nothing exists at `path`, not even a dangling link.
pub fn assert_absent(path: &Path) {
    assert!(
        fs::symlink_metadata(path).is_err(),
        "Expected nothing at {}",
        path.display()
    );
}
