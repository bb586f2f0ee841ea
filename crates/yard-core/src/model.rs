//! Repo identity, records and sync baselines

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use yard_fs::constants::INDEX_NAME_SEPARATOR;
use yard_fs::{Fingerprint, FingerprintMode, validate_identifier};

use crate::storage::Direction;
use crate::{Error, Result};

/// Immutable, time-ordered repo identifier.
///
/// Ordering follows creation time, so the oldest repo sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(Ulid);

impl RepoId {
    /// A fresh id stamped with the current time.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creation time encoded in the id.
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.0.datetime())
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RepoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| Error::InvalidIndexName {
                value: s.to_string(),
            })
    }
}

impl From<Ulid> for RepoId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

/// The two independently synchronized aspects of a repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoPart {
    /// The record file
    Meta,
    /// The content tree
    Data,
}

impl RepoPart {
    pub const ALL: [RepoPart; 2] = [RepoPart::Meta, RepoPart::Data];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for RepoPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoPart {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "meta" => Ok(Self::Meta),
            "data" => Ok(Self::Data),
            other => Err(format!("unknown part '{other}' (expected meta or data)")),
        }
    }
}

/// Split an index name into its id and name.
pub fn parse_index_name(value: &str) -> Result<(RepoId, String)> {
    let invalid = || Error::InvalidIndexName {
        value: value.to_string(),
    };
    let (id, name) = value.split_once(INDEX_NAME_SEPARATOR).ok_or_else(invalid)?;
    if name.is_empty() {
        return Err(invalid());
    }
    let id = id.parse::<RepoId>().map_err(|_| invalid())?;
    Ok((id, name.to_string()))
}

/// Everything known about one repo.
///
/// Only `groups` and `creator_host` are stored in the record file; `id`,
/// `name` and `storage_location` are encoded in the file's path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub id: RepoId,
    pub name: String,
    /// Home storage location
    pub storage_location: String,
    pub creator_host: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl RepoRecord {
    /// The primary user-facing handle: `<id>__<name>`.
    pub fn index_name(&self) -> String {
        format!("{}{}{}", self.id, INDEX_NAME_SEPARATOR, self.name)
    }

    /// A record known only by its location and index name, before its
    /// record file has been read.
    pub fn placeholder(storage_location: &str, index_name: &str) -> Result<Self> {
        let (id, name) = parse_index_name(index_name)?;
        Ok(Self {
            id,
            name,
            storage_location: storage_location.to_string(),
            creator_host: String::new(),
            groups: BTreeSet::new(),
        })
    }

    pub fn body(&self) -> RecordBody {
        RecordBody {
            creator_host: self.creator_host.clone(),
            groups: self.groups.clone(),
        }
    }
}

/// Serialized content of a record file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordBody {
    #[serde(default)]
    pub creator_host: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl RecordBody {
    /// Combine with the path-encoded fields into a full record.
    pub fn into_record(self, storage_location: &str, index_name: &str) -> Result<RepoRecord> {
        let (id, name) = parse_index_name(index_name)?;
        for group in &self.groups {
            validate_identifier(group, true)?;
        }
        Ok(RepoRecord {
            id,
            name,
            storage_location: storage_location.to_string(),
            creator_host: self.creator_host,
            groups: self.groups,
        })
    }
}

/// Last fingerprint both sides of a part were confirmed to agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub fingerprint: Fingerprint,
    pub mode: FingerprintMode,
    pub synced_at: DateTime<Utc>,
}

impl SyncRecord {
    pub fn new(fingerprint: Fingerprint, mode: FingerprintMode) -> Self {
        Self {
            fingerprint,
            mode,
            synced_at: Utc::now(),
        }
    }
}

/// A transfer that was started but not confirmed by a baseline.
///
/// Written before a mirror runs and removed once the new baseline is saved.
/// A leftover marker means the destination may hold a partial copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub direction: Direction,
    /// Fingerprint of the side being copied from
    pub source: Fingerprint,
    pub mode: FingerprintMode,
    pub started_at: DateTime<Utc>,
}

impl PendingTransfer {
    pub fn new(direction: Direction, source: Fingerprint, mode: FingerprintMode) -> Self {
        Self {
            direction,
            source,
            mode,
            started_at: Utc::now(),
        }
    }
}
