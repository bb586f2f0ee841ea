//! Instance configuration
//!
//! One TOML file per machine describes where this instance keeps its data,
//! where the user-facing views live and which storage locations exist.
//! The file is found at `$YARD_CONFIG_PATH`, falling back to
//! `~/.config/yard/config.toml`.
//!
//! ```toml
//! default_storage_location = "nas"
//! data_path = "~/.yard"
//! user_repos_path = "~/repos"
//! user_repo_groups_path = "~/repo-groups"
//! default_repo_groups = ["inbox"]
//!
//! [storage_locations.nas]
//! storage_type = "rclone"
//! remote = "nas"
//! store_path = "yard"
//!
//! [[repo_groups]]
//! name = "papers"
//! title_mode = "name"
//! unique_repo_names = true
//! ```

mod groups;

pub use groups::{GroupConfig, GroupFilter, TitleMode};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use yard_fs::constants::DEFAULT_IGNORE;
use yard_fs::{
    ConfigStore, FingerprintMode, IgnoreRules, LockPolicy, NormalizedPath, YardPath,
    validate_identifier,
};

use crate::model::{RepoPart, RepoRecord};
use crate::{Error, Result};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "YARD_CONFIG_PATH";

/// Kind of storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// A directory reachable through the local filesystem
    Local,
    /// A remote addressed through `rclone`
    Rclone,
}

/// One storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageLocationConfig {
    pub storage_type: StorageType,
    /// Root of the store: a local directory, or a path on the rclone remote
    pub store_path: PathBuf,
    /// rclone remote name (rclone only)
    #[serde(default)]
    pub remote: Option<String>,
    /// rclone config file (rclone only); rclone's own default when unset
    #[serde(default)]
    pub rclone_config: Option<PathBuf>,
}

/// Synchronization tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    /// Repos synchronized in parallel by batch commands
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub fingerprint_mode: FingerprintMode,
    /// How long to wait for a busy repo lock; 0 fails immediately
    #[serde(default)]
    pub lock_wait_ms: u64,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|p| p.to_string()).collect()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            fingerprint_mode: FingerprintMode::default(),
            lock_wait_ms: 0,
        }
    }
}

impl SyncSettings {
    pub fn lock_policy(&self) -> LockPolicy {
        match self.lock_wait_ms {
            0 => LockPolicy::FailFast,
            ms => LockPolicy::Retry {
                max_wait: Duration::from_millis(ms),
            },
        }
    }
}

/// Parsed and validated instance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Where this config was loaded from. Not stored in the file.
    #[serde(skip)]
    pub config_path: PathBuf,

    pub default_storage_location: String,
    pub data_path: PathBuf,
    pub user_repos_path: PathBuf,
    pub user_repo_groups_path: PathBuf,
    pub storage_locations: BTreeMap<String, StorageLocationConfig>,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub repo_groups: Vec<GroupConfig>,

    /// Groups every new repo joins
    #[serde(default)]
    pub default_repo_groups: Vec<String>,

    /// Paths skipped when scanning and mirroring DATA
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Config {
    /// `$YARD_CONFIG_PATH`, or `~/.config/yard/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        home_dir().join(".config").join("yard").join("config.toml")
    }

    /// `~/.yard`
    pub fn default_data_path() -> PathBuf {
        home_dir().join(".yard")
    }

    /// Load, expand `~` and validate the config at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let mut config: Config = ConfigStore::new().load(&NormalizedPath::new(path))?;
        config.config_path = path.to_path_buf();
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Write this config to its `config_path`.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            yard_fs::io::ensure_dir(parent)?;
        }
        ConfigStore::new().save(&NormalizedPath::new(&self.config_path), self)?;
        Ok(())
    }

    /// The configuration `yard init` writes: one local storage location
    /// inside the data directory.
    pub fn default_for(config_path: &Path, data_path: &Path) -> Self {
        let home = home_dir();
        let mut storage_locations = BTreeMap::new();
        storage_locations.insert(
            "local".to_string(),
            StorageLocationConfig {
                storage_type: StorageType::Local,
                store_path: data_path.join("local_storage"),
                remote: None,
                rclone_config: None,
            },
        );
        Self {
            config_path: config_path.to_path_buf(),
            default_storage_location: "local".to_string(),
            data_path: data_path.to_path_buf(),
            user_repos_path: home.join("repos"),
            user_repo_groups_path: home.join("repo-groups"),
            storage_locations,
            sync: SyncSettings::default(),
            repo_groups: Vec::new(),
            default_repo_groups: Vec::new(),
            ignore: default_ignore(),
        }
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::ConfigInvalid { message });
        let name_re = Regex::new(r"^[A-Za-z0-9_-]+$").map_err(|e| Error::ConfigInvalid {
            message: e.to_string(),
        })?;

        if self.storage_locations.is_empty() {
            return invalid("no storage locations defined".into());
        }
        for (name, location) in &self.storage_locations {
            if !name_re.is_match(name) {
                return invalid(format!(
                    "storage location name '{name}' may only contain alphanumerics, '_' or '-'"
                ));
            }
            if location.storage_type == StorageType::Rclone && location.remote.is_none() {
                return invalid(format!("rclone storage location '{name}' needs a `remote`"));
            }
        }
        if !self
            .storage_locations
            .contains_key(&self.default_storage_location)
        {
            return invalid(format!(
                "default_storage_location '{}' not found in storage_locations",
                self.default_storage_location
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        for group in &self.repo_groups {
            validate_identifier(&group.name, true)?;
            if !seen.insert(group.name.as_str()) {
                return invalid(format!("group '{}' is defined twice", group.name));
            }
            match (&group.filter, group.is_virtual) {
                (None, true) => {
                    return invalid(format!("virtual group '{}' needs a filter", group.name));
                }
                (Some(filter), _) => filter.validate()?,
                (None, false) => {}
            }
        }
        for group in &self.default_repo_groups {
            validate_identifier(group, true)?;
        }
        if self.sync.max_concurrency == 0 {
            return invalid("sync.max_concurrency must be at least 1".into());
        }
        IgnoreRules::new(&self.ignore)?;
        Ok(())
    }

    fn expand_paths(&mut self) {
        self.data_path = expand_tilde(&self.data_path);
        self.user_repos_path = expand_tilde(&self.user_repos_path);
        self.user_repo_groups_path = expand_tilde(&self.user_repo_groups_path);
        for location in self.storage_locations.values_mut() {
            if location.storage_type == StorageType::Local {
                location.store_path = expand_tilde(&location.store_path);
            }
            if let Some(conf) = &location.rclone_config {
                location.rclone_config = Some(expand_tilde(conf));
            }
        }
    }

    pub fn storage_location(&self, name: &str) -> Result<&StorageLocationConfig> {
        self.storage_locations
            .get(name)
            .ok_or_else(|| Error::UnknownStorageLocation {
                name: name.to_string(),
            })
    }

    /// Settings for `name`, falling back to an implicit static group.
    pub fn group(&self, name: &str) -> GroupConfig {
        self.repo_groups
            .iter()
            .find(|g| g.name == name)
            .cloned()
            .unwrap_or_else(|| GroupConfig::implicit(name))
    }

    pub fn ignore_rules(&self) -> Result<IgnoreRules> {
        Ok(IgnoreRules::new(&self.ignore)?)
    }

    // Paths under the data directory

    pub fn local_store_path(&self) -> PathBuf {
        self.data_path.join(YardPath::LocalStore)
    }

    pub fn locks_path(&self) -> PathBuf {
        self.data_path.join(YardPath::Locks)
    }

    pub fn sync_records_path(&self) -> PathBuf {
        self.data_path.join(YardPath::SyncRecords)
    }

    pub fn index_cache_path(&self) -> PathBuf {
        self.data_path.join(YardPath::IndexCache)
    }

    /// `<data>/yard.log`
    pub fn log_path(&self) -> PathBuf {
        self.data_path.join(YardPath::LogFile)
    }

    /// `<data>/local_store/<location>`
    pub fn local_location_path(&self, location: &str) -> PathBuf {
        self.local_store_path().join(location)
    }

    /// `<data>/local_store/<location>/<index_name>`
    pub fn local_repo_path(&self, record: &RepoRecord) -> PathBuf {
        self.local_location_path(&record.storage_location)
            .join(record.index_name())
    }

    /// Local directory holding one part of a repo.
    pub fn local_part_path(&self, record: &RepoRecord, part: RepoPart) -> PathBuf {
        self.local_repo_path(record).join(part_dir(part))
    }

    /// The local record file.
    pub fn record_file_path(&self, record: &RepoRecord) -> PathBuf {
        self.local_part_path(record, RepoPart::Meta)
            .join(YardPath::RecordFile)
    }

    /// Where an include materializes DATA before renaming it into place.
    pub fn staging_path(&self, record: &RepoRecord) -> PathBuf {
        self.local_repo_path(record).join(YardPath::StagingDir)
    }

    /// `<data>/sync_records/<index_name>/<part>.toml`
    pub fn sync_record_path(&self, record: &RepoRecord, part: RepoPart) -> PathBuf {
        self.sync_records_path()
            .join(record.index_name())
            .join(format!("{part}.toml"))
    }

    /// `<data>/sync_records/<index_name>/<part>.pending.toml`
    pub fn pending_transfer_path(&self, record: &RepoRecord, part: RepoPart) -> PathBuf {
        self.sync_records_path()
            .join(record.index_name())
            .join(format!("{part}.pending.toml"))
    }

    /// Path of a part relative to its storage location's root.
    pub fn remote_part_path(&self, record: &RepoRecord, part: RepoPart) -> String {
        format!("{}/{}", record.index_name(), part_dir(part))
    }

    /// Flat-view alias for a repo.
    pub fn user_repo_link(&self, record: &RepoRecord) -> PathBuf {
        self.user_repos_path.join(record.index_name())
    }
}

fn part_dir(part: RepoPart) -> YardPath {
    match part {
        RepoPart::Meta => YardPath::MetaDir,
        RepoPart::Data => YardPath::DataDir,
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Replace a leading `~` with the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}
