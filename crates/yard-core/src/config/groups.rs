//! Repo group configuration
//!
//! Static groups get their members from each record's `groups` set. Virtual
//! groups compute membership from a [`GroupFilter`] over the record.

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::model::RepoRecord;
use crate::{Error, Result};

/// How a repo is titled inside a grouped view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleMode {
    /// `<id>__<name>`
    IndexName,
    /// `YYYYmmdd_HHMMSS__<name>` from the id's timestamp
    #[default]
    Datetime,
    /// The bare name
    Name,
}

impl TitleMode {
    pub fn title(&self, record: &RepoRecord) -> String {
        match self {
            Self::IndexName => record.index_name(),
            Self::Datetime => format!(
                "{}__{}",
                record.id.created_at().format("%Y%m%d_%H%M%S"),
                record.name
            ),
            Self::Name => record.name.clone(),
        }
    }
}

/// Predicate deciding membership of a virtual group.
///
/// Every set criterion must hold. Group criteria look at the record's
/// explicit groups only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupFilter {
    /// Record must be in every one of these groups
    #[serde(default)]
    pub all_groups: Vec<String>,
    /// Record must be in at least one of these groups
    #[serde(default)]
    pub any_groups: Vec<String>,
    /// Record must be in none of these groups
    #[serde(default)]
    pub none_groups: Vec<String>,
    /// Glob over the repo name
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub storage_location: Option<String>,
    #[serde(default)]
    pub creator_host: Option<String>,
}

impl GroupFilter {
    pub fn validate(&self) -> Result<()> {
        if let Some(pattern) = &self.name_pattern {
            Pattern::new(pattern).map_err(|e| Error::ConfigInvalid {
                message: format!("invalid name_pattern '{pattern}': {e}"),
            })?;
        }
        Ok(())
    }

    pub fn matches(&self, record: &RepoRecord) -> bool {
        let groups = &record.groups;
        if !self.all_groups.iter().all(|g| groups.contains(g)) {
            return false;
        }
        if !self.any_groups.is_empty() && !self.any_groups.iter().any(|g| groups.contains(g)) {
            return false;
        }
        if self.none_groups.iter().any(|g| groups.contains(g)) {
            return false;
        }
        if let Some(pattern) = &self.name_pattern {
            match Pattern::new(pattern) {
                Ok(p) if p.matches(&record.name) => {}
                _ => return false,
            }
        }
        if let Some(location) = &self.storage_location
            && location != &record.storage_location
        {
            return false;
        }
        if let Some(host) = &self.creator_host
            && host != &record.creator_host
        {
            return false;
        }
        true
    }
}

/// Settings for one named group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub is_virtual: bool,
    /// Required when `is_virtual` is set
    #[serde(default)]
    pub filter: Option<GroupFilter>,
    #[serde(default)]
    pub title_mode: TitleMode,
    /// Titles must not collide; a second repo with a taken name is refused
    #[serde(default)]
    pub unique_repo_names: bool,
}

impl GroupConfig {
    /// Settings for a group that appears on records but not in the config.
    pub fn implicit(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_virtual: false,
            filter: None,
            title_mode: TitleMode::default(),
            unique_repo_names: false,
        }
    }

    /// Whether `record` belongs to this group.
    pub fn contains(&self, record: &RepoRecord) -> bool {
        if record.groups.contains(&self.name) {
            return true;
        }
        match (&self.filter, self.is_virtual) {
            (Some(filter), true) => filter.matches(record),
            _ => false,
        }
    }
}
