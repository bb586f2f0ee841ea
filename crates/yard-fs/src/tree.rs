//! Directory tree scanning
//!
//! Produces the same entry shape a storage backend listing does, so local and
//! remote sides of a part can be fingerprinted identically.

use std::path::Path;

use chrono::{DateTime, Utc};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{Error, NormalizedPath, Result, checksum};

/// One regular file inside a scanned tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Path relative to the scanned root, forward slashes
    pub path: NormalizedPath,
    /// Size in bytes
    pub size: u64,
    /// Modification time, whole seconds since the Unix epoch
    pub modified: i64,
    /// `sha256:<hex>` content hash when requested and available
    pub hash: Option<String>,
}

#[derive(Debug, Clone)]
enum Rule {
    /// `name/`: a directory with a matching name at any depth
    Dir(Pattern),
    /// anything else, matched against the relative path and the file name
    Path(Pattern),
}

/// Compiled ignore patterns.
///
/// A pattern ending in `/` excludes every directory with that name at any
/// depth; other patterns are globs matched against both the relative path and
/// the bare file name.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    raw: Vec<String>,
    rules: Vec<Rule>,
}

impl IgnoreRules {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut raw = Vec::with_capacity(patterns.len());
        let mut rules = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let compile = |p: &str| {
                Pattern::new(p).map_err(|e| Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            };
            let rule = match pattern.strip_suffix('/') {
                Some(dir) => Rule::Dir(compile(dir)?),
                None => Rule::Path(compile(pattern)?),
            };
            raw.push(pattern.to_string());
            rules.push(rule);
        }
        Ok(Self { raw, rules })
    }

    /// The patterns as written, for handing to external tools.
    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn ignores_dir(&self, rel: &NormalizedPath) -> bool {
        let name = rel.file_name().unwrap_or_default();
        self.rules.iter().any(|rule| match rule {
            Rule::Dir(p) => p.matches(name),
            Rule::Path(p) => p.matches(rel.as_str()),
        })
    }

    pub fn ignores_file(&self, rel: &NormalizedPath) -> bool {
        let name = rel.file_name().unwrap_or_default();
        self.rules.iter().any(|rule| match rule {
            Rule::Dir(_) => false,
            Rule::Path(p) => p.matches(rel.as_str()) || p.matches(name),
        })
    }

    /// Whether any directory component of `rel` (excluding the file name) is
    /// ignored. Used to filter flat listings produced by external tools.
    pub fn ignores_ancestor(&self, rel: &NormalizedPath) -> bool {
        let components: Vec<&str> = rel.components().collect();
        let mut prefix = NormalizedPath::new("");
        for component in components.iter().take(components.len().saturating_sub(1)) {
            prefix = prefix.join(component);
            if self.ignores_dir(&prefix) {
                return true;
            }
        }
        false
    }
}

/// Options for [`scan`].
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Hash every file's content (slow, needed for content fingerprints)
    pub hash_contents: bool,
    /// Paths to skip
    pub ignore: IgnoreRules,
}

/// Scan all regular files under `root`, sorted by relative path.
///
/// A missing root is an empty tree. Symlinks are not followed and not listed.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<Vec<TreeEntry>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let relative = |path: &Path| -> NormalizedPath {
        NormalizedPath::new(path.strip_prefix(root).unwrap_or(path))
    };

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !options.ignore.ignores_dir(&relative(entry.path()))
        });

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            Error::io(path, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = relative(entry.path());
        if options.ignore.ignores_file(&rel) {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("metadata unavailable"));
            Error::io(entry.path(), source)
        })?;
        let modified = metadata
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp())
            .map_err(|e| Error::io(entry.path(), e))?;
        let hash = if options.hash_contents {
            Some(checksum::compute_file_checksum(entry.path()).map_err(|e| Error::io(entry.path(), e))?)
        } else {
            None
        };

        entries.push(TreeEntry {
            path: rel,
            size: metadata.len(),
            modified,
            hash,
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
