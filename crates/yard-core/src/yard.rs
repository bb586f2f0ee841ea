//! Repo lifecycle operations
//!
//! [`Yard`] bundles the engine, the metadata store and the projector for
//! one configuration and exposes the operations the command line offers.
//! Every operation that changes what is visible ends with a view reconcile.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use yard_fs::{LinkStore, SymlinkStore, io, validate_identifier};

use crate::batch::{self, BatchReport};
use crate::config::Config;
use crate::inclusion::{InclusionManager, InclusionOutcome};
use crate::index::{MetadataStore, RepoIndex};
use crate::model::{RepoId, RepoPart, RepoRecord};
use crate::projection::{ReconcileReport, SymlinkProjector};
use crate::sync::{PartOutcome, PartStatus, SyncEngine, SyncReport};
use crate::{Error, Result};

/// Options for [`Yard::create_repo`].
#[derive(Debug, Clone, Default)]
pub struct NewRepo {
    /// Home location; the configured default when unset
    pub storage_location: Option<String>,
    /// Groups on top of the configured default groups
    pub groups: Vec<String>,
    /// Existing directory to move in as DATA
    pub from_path: Option<PathBuf>,
    /// Recorded instead of this machine's hostname
    pub creator_host: Option<String>,
}

/// Outcome of discovering repos created on other machines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Index names whose metadata was pulled
    pub pulled: Vec<String>,
    /// Locations or repos that could not be handled, with the reason
    pub failures: Vec<(String, String)>,
}

/// Everything one instance needs to operate on its repos.
#[derive(Debug, Clone)]
pub struct Yard<L: LinkStore = SymlinkStore> {
    config: Arc<Config>,
    engine: SyncEngine,
    projector: SymlinkProjector<L>,
}

impl Yard<SymlinkStore> {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        Self {
            engine: SyncEngine::new(Arc::clone(&config)),
            projector: SymlinkProjector::with_symlinks(Arc::clone(&config)),
            config,
        }
    }

    /// Load the config at `path` and open it.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Config::load(path)?))
    }
}

impl<L: LinkStore> Yard<L> {
    /// Assemble from parts, e.g. an engine with substituted backends.
    pub fn from_parts(engine: SyncEngine, links: L) -> Self {
        let config = Arc::clone(engine.config());
        Self {
            projector: SymlinkProjector::new(Arc::clone(&config), links),
            engine,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn projector(&self) -> &SymlinkProjector<L> {
        &self.projector
    }

    pub fn metadata(&self) -> &MetadataStore {
        self.engine.metadata()
    }

    pub fn index(&self) -> Result<RepoIndex> {
        self.metadata().get_index(false)
    }

    fn inclusion(&self) -> InclusionManager<'_, L> {
        InclusionManager::new(&self.engine, &self.projector)
    }

    /// Recompute the user views from the current index.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        self.projector.reconcile(&self.index()?)
    }

    fn reconcile_quietly(&self) {
        if let Err(e) = self.reconcile() {
            tracing::warn!(error = %e, "view reconcile failed");
        }
    }

    /// Find a repo by index name, id, or a path inside one of its views or
    /// its local store directory.
    pub fn resolve(&self, query: &str) -> Result<RepoRecord> {
        let index = self.index()?;
        if let Some(record) = index.get(query) {
            return Ok(record.clone());
        }
        if let Ok(id) = query.parse::<RepoId>()
            && let Some(record) = index.get_by_id(&id)
        {
            return Ok(record.clone());
        }
        if let Some(index_name) = self.index_name_from_path(Path::new(query))
            && let Some(record) = index.get(&index_name)
        {
            return Ok(record.clone());
        }
        Err(Error::RepoNotFound {
            query: query.to_string(),
        })
    }

    fn index_name_from_path(&self, path: &Path) -> Option<String> {
        let absolute = std::path::absolute(path).ok()?;
        let first = |base: &Path, p: &Path| -> Option<Vec<String>> {
            let rest = p.strip_prefix(base).ok()?;
            let parts: Vec<String> = rest
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => s.to_str().map(str::to_string),
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then_some(parts)
        };

        if let Some(parts) = first(&self.config.user_repos_path, &absolute) {
            return Some(parts[0].clone());
        }
        if let Some(parts) = first(&self.config.user_repo_groups_path, &absolute)
            && parts.len() >= 2
        {
            let link = self.config.user_repo_groups_path.join(&parts[0]).join(&parts[1]);
            if let Ok(Some(target)) = self.projector.links().read_link(&link) {
                return target
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
                    .map(str::to_string);
            }
        }
        let store = dunce::canonicalize(self.config.local_store_path()).ok()?;
        let real = dunce::canonicalize(&absolute).ok()?;
        let parts = first(&store, &real)?;
        parts.get(1).cloned()
    }

    /// A directory can seed a repo if it exists and lies outside the data
    /// directory.
    fn check_source(&self, source: &Path) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidSource {
            path: source.to_path_buf(),
            reason: reason.to_string(),
        };
        if !source.is_dir() {
            return Err(invalid("not a directory"));
        }
        let real = dunce::canonicalize(source)?;
        let data = dunce::canonicalize(&self.config.data_path).unwrap_or_else(|_| self.config.data_path.clone());
        if real.starts_with(&data) || data.starts_with(&real) {
            return Err(invalid("overlaps the yard's data directory"));
        }
        Ok(())
    }

    /// Refuse `record` if it takes a name already used in one of its groups
    /// that requires unique names.
    fn check_unique_name(&self, index: &RepoIndex, record: &RepoRecord) -> Result<()> {
        for group in self.projector.groups_of(record) {
            if !self.config.group(&group).unique_repo_names {
                continue;
            }
            let taken = index.records().find(|other| {
                other.id != record.id
                    && other.name == record.name
                    && self.projector.groups_of(other).contains(&group)
            });
            if let Some(other) = taken {
                return Err(Error::NameTaken {
                    name: record.name.clone(),
                    group,
                    existing: other.index_name(),
                });
            }
        }
        Ok(())
    }

    /// Create a repo on this machine. New repos are included, with an empty
    /// DATA directory; the next sync pushes them.
    pub fn new_repo(
        &self,
        name: &str,
        storage_location: Option<&str>,
        groups: &[String],
    ) -> Result<RepoRecord> {
        let options = NewRepo {
            storage_location: storage_location.map(str::to_string),
            groups: groups.to_vec(),
            ..NewRepo::default()
        };
        self.create_repo(name, &options)
    }

    /// Create a repo with full control over where its DATA comes from and
    /// which host it is attributed to.
    ///
    /// With `from_path`, that directory is moved in as the repo's DATA.
    pub fn create_repo(&self, name: &str, options: &NewRepo) -> Result<RepoRecord> {
        validate_identifier(name, true)?;
        let location = options
            .storage_location
            .as_deref()
            .unwrap_or(&self.config.default_storage_location);
        self.config.storage_location(location)?;

        let mut all_groups: BTreeSet<String> = self.config.default_repo_groups.iter().cloned().collect();
        for group in &options.groups {
            validate_identifier(group, true)?;
            all_groups.insert(group.clone());
        }
        let creator_host = match &options.creator_host {
            Some(host) => {
                validate_identifier(host, true)?;
                host.clone()
            }
            None => hostname::get()?.to_string_lossy().into_owned(),
        };
        if let Some(source) = &options.from_path {
            self.check_source(source)?;
        }

        let record = RepoRecord {
            id: RepoId::generate(),
            name: name.to_string(),
            storage_location: location.to_string(),
            creator_host,
            groups: all_groups,
        };
        self.check_unique_name(&self.index()?, &record)?;

        let data = self.config.local_part_path(&record, RepoPart::Data);
        match &options.from_path {
            Some(source) => {
                io::ensure_dir(&self.config.local_repo_path(&record))?;
                io::move_dir(source, &data)?;
            }
            None => io::ensure_dir(&data)?,
        }
        if let Err(e) = self.metadata().save_record(&record) {
            if let Some(source) = &options.from_path {
                io::move_dir(&data, source)?;
            }
            return Err(e);
        }
        tracing::info!(repo = %record.index_name(), location, from = ?options.from_path, "repo created");

        self.reconcile_quietly();
        Ok(record)
    }

    /// Sync one repo, then reconcile.
    pub fn sync(&self, record: &RepoRecord, parts: &[RepoPart]) -> Result<SyncReport> {
        let report = self.engine.sync(record, parts)?;
        self.reconcile_quietly();
        Ok(report)
    }

    /// Sync many repos in parallel, then reconcile once.
    pub async fn sync_many(
        &self,
        records: Vec<RepoRecord>,
        parts: Vec<RepoPart>,
    ) -> BatchReport<SyncReport> {
        let report = batch::sync_all(self.engine.clone(), records, parts).await;
        self.reconcile_quietly();
        report
    }

    /// Report what syncing each part would do.
    pub fn status(&self, record: &RepoRecord) -> Result<Vec<PartStatus>> {
        let mut statuses = vec![self.engine.status(record, RepoPart::Meta)?];
        if self.engine.is_included(record) {
            statuses.push(self.engine.status(record, RepoPart::Data)?);
        }
        Ok(statuses)
    }

    pub fn include(&self, record: &RepoRecord) -> Result<InclusionOutcome> {
        self.inclusion().include(record)
    }

    pub fn exclude(&self, record: &RepoRecord) -> Result<InclusionOutcome> {
        self.inclusion().exclude(record)
    }

    /// Pull the metadata of every repo present in a storage location but
    /// unknown here.
    pub fn sync_missing_metas(&self) -> Result<DiscoveryReport> {
        let index = self.metadata().get_index(true)?;
        let mut report = DiscoveryReport::default();

        for location in self.config.storage_locations.keys() {
            let backend = self.engine.backend(location)?;
            let names = match backend.list_dirs("") {
                Ok(names) => names,
                Err(e) => {
                    tracing::warn!(%location, error = %e, "cannot list storage location");
                    report.failures.push((location.clone(), e.to_string()));
                    continue;
                }
            };

            for index_name in names {
                let Ok(record) = RepoRecord::placeholder(location, &index_name) else {
                    tracing::debug!(%location, entry = %index_name, "not a repo, skipping");
                    continue;
                };
                if index.get_by_id(&record.id).is_some() {
                    continue;
                }
                let outcome = self
                    .engine
                    .lock(&record)
                    .and_then(|lock| self.engine.sync_part_locked(&lock, &record, RepoPart::Meta));
                match outcome {
                    Ok(PartOutcome::Pulled { .. }) => report.pulled.push(index_name),
                    Ok(PartOutcome::Failed { reason }) => report.failures.push((index_name, reason)),
                    Ok(other) => {
                        tracing::debug!(repo = %index_name, outcome = other.label(), "nothing pulled");
                    }
                    Err(e) => report.failures.push((index_name, e.to_string())),
                }
            }
        }

        self.metadata().invalidate()?;
        self.reconcile_quietly();
        Ok(report)
    }

    /// Add and remove explicit groups, then save the record. The change is
    /// pushed by the next META sync.
    pub fn modify_groups(
        &self,
        record: &RepoRecord,
        add: &[String],
        remove: &[String],
    ) -> Result<RepoRecord> {
        for group in add {
            validate_identifier(group, true)?;
        }
        let updated = {
            let _lock = self.engine.lock(record)?;
            let mut updated = self
                .metadata()
                .load_record(&record.storage_location, &record.index_name())?;
            updated.groups.extend(add.iter().cloned());
            for group in remove {
                updated.groups.remove(group);
            }
            self.check_unique_name(&self.index()?, &updated)?;
            self.metadata().save_record(&updated)?;
            updated
        };
        self.reconcile_quietly();
        Ok(updated)
    }

    /// Remove a repo everywhere: its home location, the local store and its
    /// baselines. Fails without local changes if the home is unreachable.
    pub fn delete_repo(&self, record: &RepoRecord) -> Result<()> {
        {
            let _lock = self.engine.lock(record)?;
            let backend = self.engine.backend(&record.storage_location)?;
            backend.delete(&record.index_name())?;
            io::remove_dir_if_exists(&self.config.local_repo_path(record))?;
            self.engine.baselines().remove_all(record)?;
            self.metadata().invalidate()?;
            tracing::info!(repo = %record.index_name(), "repo deleted");
        }
        self.reconcile_quietly();
        Ok(())
    }
}
