//! The per-part synchronization decision
//!
//! A pure function of three fingerprints: the local side, the remote side
//! and the last agreed baseline.

use std::fmt;

use serde::{Deserialize, Serialize};
use yard_fs::Fingerprint;

use crate::storage::Direction;

/// Why a part could not be synchronized automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides moved away from the baseline in different ways
    BothChanged,
    /// No baseline, and both sides have different content
    FirstContact,
    /// A side changed between the decision and a destructive transfer
    ChangedDuringSync,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BothChanged => "both local and remote changed since the last sync",
            Self::FirstContact => "never synced and both sides have different content",
            Self::ChangedDuringSync => "content changed while the sync was in progress",
        })
    }
}

/// What to do with one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Nothing to do
    Noop,
    /// Both sides agree but the baseline does not record it yet
    AdoptBaseline,
    Push,
    Pull,
    Conflict(ConflictKind),
}

impl Decision {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<Direction> for Decision {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Push => Self::Push,
            Direction::Pull => Self::Pull,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => f.write_str("up to date"),
            Self::AdoptBaseline => f.write_str("in agreement, baseline pending"),
            Self::Push => f.write_str("push"),
            Self::Pull => f.write_str("pull"),
            Self::Conflict(kind) => write!(f, "conflict: {kind}"),
        }
    }
}

/// Decide a part's action.
///
/// With a baseline, whichever side still equals it is the one that did not
/// change, so the other side wins; if neither does and they differ, it is a
/// conflict. Without a baseline, a side with no files never wins over one
/// with content.
pub fn decide(local: &Fingerprint, remote: &Fingerprint, baseline: Option<&Fingerprint>) -> Decision {
    let same = |a: &Fingerprint, b: &Fingerprint| a.digest == b.digest;

    match baseline {
        Some(base) => match (same(local, base), same(remote, base)) {
            (true, true) => Decision::Noop,
            (true, false) => Decision::Pull,
            (false, true) => Decision::Push,
            (false, false) if same(local, remote) => Decision::AdoptBaseline,
            (false, false) => Decision::Conflict(ConflictKind::BothChanged),
        },
        None => {
            if same(local, remote) {
                if local.is_empty() {
                    Decision::Noop
                } else {
                    Decision::AdoptBaseline
                }
            } else if local.is_empty() {
                Decision::Pull
            } else if remote.is_empty() {
                Decision::Push
            } else {
                Decision::Conflict(ConflictKind::FirstContact)
            }
        }
    }
}
