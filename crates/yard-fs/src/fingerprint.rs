//! Tree fingerprints
//!
//! A fingerprint is a SHA-256 digest over the sorted `(path, size, stamp)`
//! triples of a tree, where the stamp is the mtime in seconds (structural
//! mode) or the content hash (content mode). Two trees with equal
//! fingerprints are treated as identical by the sync engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::checksum::PREFIX;
use crate::tree::TreeEntry;

/// What each entry contributes to a fingerprint besides path and size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// Modification time in whole seconds
    #[default]
    Structural,
    /// Content hash, when every entry on both sides carries one
    Content,
}

impl FingerprintMode {
    /// Whether listings must carry content hashes for this mode.
    pub fn needs_hashes(self) -> bool {
        matches!(self, Self::Content)
    }

    /// The mode in which `local` and `remote` can be compared.
    ///
    /// Many remotes list no content hashes. Content mode then degrades to
    /// structural for both sides, so equal trees still fingerprint equal.
    pub fn comparable(self, local: &[TreeEntry], remote: &[TreeEntry]) -> Self {
        match self {
            Self::Content if local.iter().chain(remote).any(|e| e.hash.is_none()) => Self::Structural,
            mode => mode,
        }
    }
}

/// Digest summarizing one side of a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// `sha256:<hex>` over the canonical entry lines
    pub digest: String,
    /// Number of files covered
    pub files: u64,
    /// Total bytes covered
    pub bytes: u64,
}

impl Fingerprint {
    /// Fingerprint a listing. Entry order does not matter.
    pub fn compute(entries: &[TreeEntry], mode: FingerprintMode) -> Self {
        let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let mut hasher = Sha256::new();
        let mut bytes = 0u64;
        for entry in &sorted {
            let stamp = match (mode, &entry.hash) {
                (FingerprintMode::Content, Some(hash)) => hash.clone(),
                _ => entry.modified.to_string(),
            };
            hasher.update(entry.path.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(entry.size.to_string().as_bytes());
            hasher.update([0u8]);
            hasher.update(stamp.as_bytes());
            hasher.update([b'\n']);
            bytes += entry.size;
        }

        Self {
            digest: format!("{}{:x}", PREFIX, hasher.finalize()),
            files: sorted.len() as u64,
            bytes,
        }
    }

    /// Fingerprint of a tree with no files.
    pub fn empty() -> Self {
        Self::compute(&[], FingerprintMode::Structural)
    }

    /// Whether the fingerprinted tree had no files at all.
    pub fn is_empty(&self) -> bool {
        self.files == 0
    }

    /// First 12 hex characters, for logs and status output.
    pub fn short(&self) -> &str {
        let hex = self.digest.strip_prefix(PREFIX).unwrap_or(&self.digest);
        &hex[..hex.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} files, {} bytes)", self.short(), self.files, self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NormalizedPath;

    fn entry(path: &str, size: u64, modified: i64, hash: Option<&str>) -> TreeEntry {
        TreeEntry {
            path: NormalizedPath::new(path),
            size,
            modified,
            hash: hash.map(str::to_string),
        }
    }

    #[test]
    fn content_mode_degrades_when_a_side_lacks_hashes() {
        let hashed = vec![entry("a", 1, 10, Some("sha256:aa"))];
        let bare = vec![entry("a", 1, 10, None)];

        let mode = FingerprintMode::Content.comparable(&hashed, &bare);
        assert_eq!(mode, FingerprintMode::Structural);
        assert_eq!(Fingerprint::compute(&hashed, mode), Fingerprint::compute(&bare, mode));

        assert_eq!(FingerprintMode::Content.comparable(&hashed, &hashed), FingerprintMode::Content);
        assert_eq!(FingerprintMode::Structural.comparable(&hashed, &hashed), FingerprintMode::Structural);
    }

    #[test]
    fn order_does_not_matter() {
        let a = vec![entry("a", 1, 10, None), entry("b", 2, 20, None)];
        let b = vec![entry("b", 2, 20, None), entry("a", 1, 10, None)];
        assert_eq!(
            Fingerprint::compute(&a, FingerprintMode::Structural),
            Fingerprint::compute(&b, FingerprintMode::Structural)
        );
    }

    #[test]
    fn structural_mode_sees_mtime_changes() {
        let a = vec![entry("a", 1, 10, Some("sha256:x"))];
        let b = vec![entry("a", 1, 11, Some("sha256:x"))];
        assert_ne!(
            Fingerprint::compute(&a, FingerprintMode::Structural),
            Fingerprint::compute(&b, FingerprintMode::Structural)
        );
        assert_eq!(
            Fingerprint::compute(&a, FingerprintMode::Content),
            Fingerprint::compute(&b, FingerprintMode::Content)
        );
    }

    #[test]
    fn empty_fingerprint_is_empty() {
        let empty = Fingerprint::empty();
        assert!(empty.is_empty());
        assert_eq!(empty, Fingerprint::compute(&[], FingerprintMode::Content));
        assert_eq!(empty.short().len(), 12);
    }

    #[test]
    fn totals_are_counted() {
        let fp = Fingerprint::compute(
            &[entry("a", 3, 0, None), entry("b/c", 4, 0, None)],
            FingerprintMode::Structural,
        );
        assert_eq!(fp.files, 2);
        assert_eq!(fp.bytes, 7);
    }
}
