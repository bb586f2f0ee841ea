//! Outcomes of a sync

use serde::{Deserialize, Serialize};
use yard_fs::Fingerprint;

use super::decision::{ConflictKind, Decision};
use crate::model::RepoPart;
use crate::storage::ChangeSet;
use crate::{Error, Result};

/// Result of synchronizing one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PartOutcome {
    Noop,
    Pushed { changes: ChangeSet },
    Pulled { changes: ChangeSet },
    /// Nothing was changed on either side
    Conflict {
        kind: ConflictKind,
        local: Fingerprint,
        remote: Fingerprint,
        baseline: Option<Fingerprint>,
    },
    /// The transfer failed; the baseline is untouched and a retry is safe
    Failed { reason: String },
}

impl PartOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Noop | Self::Pushed { .. } | Self::Pulled { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Pushed { .. } => "pushed",
            Self::Pulled { .. } => "pulled",
            Self::Conflict { .. } => "conflict",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Per-part outcomes for one repo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub repo: String,
    pub storage_location: String,
    pub parts: Vec<(RepoPart, PartOutcome)>,
}

impl SyncReport {
    pub fn new(repo: impl Into<String>, storage_location: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            storage_location: storage_location.into(),
            parts: Vec::new(),
        }
    }

    pub fn push(&mut self, part: RepoPart, outcome: PartOutcome) {
        self.parts.push((part, outcome));
    }

    pub fn outcome(&self, part: RepoPart) -> Option<&PartOutcome> {
        self.parts.iter().find(|(p, _)| *p == part).map(|(_, o)| o)
    }

    pub fn is_success(&self) -> bool {
        self.parts.iter().all(|(_, o)| o.is_success())
    }

    /// The first conflict or failure as an error, conflicts first.
    pub fn into_result(self) -> Result<Self> {
        for (part, outcome) in &self.parts {
            if let PartOutcome::Conflict { kind, .. } = outcome {
                return Err(Error::SyncConflict {
                    repo: self.repo.clone(),
                    part: *part,
                    kind: *kind,
                });
            }
        }
        for (_, outcome) in &self.parts {
            if let PartOutcome::Failed { reason } = outcome {
                return Err(Error::StorageUnreachable {
                    location: self.storage_location.clone(),
                    message: reason.clone(),
                });
            }
        }
        Ok(self)
    }
}

/// The decision for one part without acting on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartStatus {
    pub part: RepoPart,
    pub decision: Decision,
    pub local: Fingerprint,
    pub remote: Fingerprint,
    pub baseline: Option<Fingerprint>,
}
