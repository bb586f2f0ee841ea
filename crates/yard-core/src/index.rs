//! Record files and the repo index
//!
//! Each repo's record lives at
//! `<data>/local_store/<location>/<index_name>/meta/repometa.toml`. The
//! [`RepoIndex`] is built by scanning every location directory and is cached
//! as JSON in `<data>/repo_index.json`. Every write path deletes the cache
//! after the record is on disk. Rebuilding the cache and deleting it both
//! hold the index lock, so a rebuild that read the old record can never land
//! its snapshot after the deletion.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use yard_fs::{LockManager, LockPolicy, NormalizedPath, RepoLock, YardPath, io};

use crate::config::Config;
use crate::model::{RecordBody, RepoId, RepoRecord};
use crate::{Error, Result};

/// Lookup tables over all known records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoIndex {
    pub by_index_name: BTreeMap<String, RepoRecord>,
    pub by_id: BTreeMap<String, RepoRecord>,
}

impl RepoIndex {
    pub fn insert(&mut self, record: RepoRecord) {
        self.by_id.insert(record.id.to_string(), record.clone());
        self.by_index_name.insert(record.index_name(), record);
    }

    pub fn get(&self, index_name: &str) -> Option<&RepoRecord> {
        self.by_index_name.get(index_name)
    }

    pub fn get_by_id(&self, id: &RepoId) -> Option<&RepoRecord> {
        self.by_id.get(&id.to_string())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Records in id order (oldest first).
    pub fn records(&self) -> impl Iterator<Item = &RepoRecord> {
        self.by_id.values()
    }
}

/// A record file that could not be read during an index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Lock key guarding the index cache file.
const INDEX_LOCK: &str = "repo_index";

const INDEX_LOCK_WAIT: Duration = Duration::from_secs(30);

/// Reads and writes record files and maintains the index cache.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    config: Arc<Config>,
    locks: LockManager,
}

impl MetadataStore {
    pub fn new(config: Arc<Config>) -> Self {
        let locks = LockManager::new(config.locks_path());
        Self { config, locks }
    }

    /// Read the record of `index_name` stored under `location`.
    pub fn load_record(&self, location: &str, index_name: &str) -> Result<RepoRecord> {
        let placeholder = RepoRecord::placeholder(location, index_name)?;
        let path = self.config.record_file_path(&placeholder);
        read_record(&path, location, index_name)
    }

    /// Write a record file. Only `groups` and `creator_host` go into the body.
    pub fn save_record(&self, record: &RepoRecord) -> Result<()> {
        let path = self.config.record_file_path(record);
        let content = toml::to_string_pretty(&record.body()).map_err(|e| Error::RecordCorrupt {
            path: path.clone(),
            message: e.to_string(),
        })?;
        io::write_text(&NormalizedPath::new(&path), &content)?;
        self.invalidate()?;
        tracing::debug!(repo = %record.index_name(), "record saved");
        Ok(())
    }

    /// Drop the index cache so the next read rebuilds it.
    ///
    /// Call after the record files are written.
    pub fn invalidate(&self) -> Result<()> {
        let _lock = self.lock_cache()?;
        io::remove_file_if_exists(&self.config.index_cache_path())?;
        Ok(())
    }

    fn lock_cache(&self) -> Result<RepoLock> {
        let policy = LockPolicy::Retry {
            max_wait: INDEX_LOCK_WAIT,
        };
        Ok(self.locks.acquire(INDEX_LOCK, policy)?)
    }

    /// Scan every location directory and parse every record file.
    ///
    /// Unreadable records are skipped and reported alongside the index.
    pub fn build_index(&self) -> Result<(RepoIndex, Vec<RecordFailure>)> {
        let mut index = RepoIndex::default();
        let mut failures = Vec::new();

        for location in self.config.storage_locations.keys() {
            let location_dir = self.config.local_location_path(location);
            for repo_dir in subdirectories(&location_dir)? {
                let Some(index_name) = repo_dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let record_path = repo_dir.join(YardPath::MetaDir).join(YardPath::RecordFile);
                match read_record(&record_path, location, index_name) {
                    Ok(record) => index.insert(record),
                    Err(e) => {
                        tracing::warn!(path = %record_path.display(), error = %e, "skipping unreadable record");
                        failures.push(RecordFailure {
                            path: record_path,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        tracing::debug!(repos = index.len(), failures = failures.len(), "index built");
        Ok((index, failures))
    }

    /// The cached index, rebuilt when missing, unreadable or `force_rebuild`.
    pub fn get_index(&self, force_rebuild: bool) -> Result<RepoIndex> {
        let cache_path = NormalizedPath::new(self.config.index_cache_path());
        if !force_rebuild && cache_path.exists() {
            match io::read_text(&cache_path)
                .map_err(Error::from)
                .and_then(|text| serde_json::from_str::<RepoIndex>(&text).map_err(Error::from))
            {
                Ok(index) => return Ok(index),
                Err(e) => tracing::warn!(error = %e, "index cache unreadable, rebuilding"),
            }
        }

        let _lock = self.lock_cache()?;
        let (index, _failures) = self.build_index()?;
        let json = serde_json::to_string_pretty(&index)?;
        io::write_text(&cache_path, &json)?;
        Ok(index)
    }
}

fn read_record(path: &Path, location: &str, index_name: &str) -> Result<RepoRecord> {
    let corrupt = |message: String| Error::RecordCorrupt {
        path: path.to_path_buf(),
        message,
    };
    if !path.is_file() {
        return Err(corrupt("record file is missing".into()));
    }
    let text = io::read_text(&NormalizedPath::new(path))?;
    let body: RecordBody = toml::from_str(&text).map_err(|e| corrupt(e.to_string()))?;
    body.into_record(location, index_name)
        .map_err(|e| corrupt(e.to_string()))
}

/// Real subdirectories of `dir`, sorted. A missing `dir` has none.
pub(crate) fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(yard_fs::Error::io(dir, e).into()),
    };
    let mut dirs = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| yard_fs::Error::io(dir, e))?;
        if entry
            .file_type()
            .map_err(|e| yard_fs::Error::io(entry.path(), e))?
            .is_dir()
        {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
