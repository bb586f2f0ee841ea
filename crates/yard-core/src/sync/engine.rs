//! SyncEngine implementation
//!
//! For each `(repo, part)` the engine measures both sides, compares them to
//! the stored baseline and pushes, pulls, does nothing or reports a
//! conflict. Every step recomputes from ground truth, so a failed or
//! interrupted sync is safe to rerun. A transfer leaves a marker until its
//! baseline is saved, and a rerun finishes an interrupted transfer in the
//! same direction instead of mistaking the partial copy for a local edit.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use yard_fs::{Fingerprint, FingerprintMode, LockManager, LockPolicy, RepoLock, ScanOptions, tree};

use super::baseline::BaselineStore;
use super::decision::{ConflictKind, Decision, decide};
use super::report::{PartOutcome, PartStatus, SyncReport};
use crate::config::Config;
use crate::index::MetadataStore;
use crate::model::{PendingTransfer, RepoPart, RepoRecord, SyncRecord};
use crate::storage::{self, Direction, StorageBackend};
use crate::{Error, Result};

/// Fingerprints a decision was based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Measured {
    pub local: Fingerprint,
    pub remote: Fingerprint,
    /// Mode both sides were fingerprinted in
    pub mode: FingerprintMode,
}

/// Engine for synchronizing repo parts with their home storage location.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    config: Arc<Config>,
    backends: BTreeMap<String, Arc<dyn StorageBackend>>,
    locks: LockManager,
    baselines: BaselineStore,
    metadata: MetadataStore,
    lock_policy: LockPolicy,
}

impl SyncEngine {
    /// Create an engine with one backend per configured storage location.
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            backends: storage::open_all(&config),
            locks: LockManager::new(config.locks_path()),
            baselines: BaselineStore::new(Arc::clone(&config)),
            metadata: MetadataStore::new(Arc::clone(&config)),
            lock_policy: config.sync.lock_policy(),
            config,
        }
    }

    /// Replace the backend for the location `backend` is bound to.
    pub fn with_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backends.insert(backend.location().to_string(), backend);
        self
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn backend(&self, location: &str) -> Result<&Arc<dyn StorageBackend>> {
        self.backends
            .get(location)
            .ok_or_else(|| Error::UnknownStorageLocation {
                name: location.to_string(),
            })
    }

    fn mode(&self) -> FingerprintMode {
        self.config.sync.fingerprint_mode
    }

    /// Take the repo's lock under the engine's lock policy.
    pub fn lock(&self, record: &RepoRecord) -> Result<RepoLock> {
        self.locks
            .acquire(&record.id.to_string(), self.lock_policy)
            .map_err(|e| {
                if e.is_lock_busy() {
                    Error::LockContention {
                        repo: record.index_name(),
                    }
                } else {
                    e.into()
                }
            })
    }

    /// Whether the repo's DATA is materialized on this machine.
    pub fn is_included(&self, record: &RepoRecord) -> bool {
        self.config.local_part_path(record, RepoPart::Data).is_dir()
    }

    /// Scan options for a part. Ignore patterns only apply to DATA.
    pub fn scan_options(&self, part: RepoPart) -> Result<ScanOptions> {
        Ok(ScanOptions {
            hash_contents: self.mode().needs_hashes(),
            ignore: match part {
                RepoPart::Meta => Default::default(),
                RepoPart::Data => self.config.ignore_rules()?,
            },
        })
    }

    /// Fingerprint of a local directory holding `part`, taken in `mode`.
    pub fn measure_dir(&self, dir: &Path, part: RepoPart, mode: FingerprintMode) -> Result<Fingerprint> {
        let options = ScanOptions {
            hash_contents: mode.needs_hashes(),
            ..self.scan_options(part)?
        };
        let entries = tree::scan(dir, &options)?;
        Ok(Fingerprint::compute(&entries, mode))
    }

    pub fn measure_local(&self, record: &RepoRecord, part: RepoPart, mode: FingerprintMode) -> Result<Fingerprint> {
        self.measure_dir(&self.config.local_part_path(record, part), part, mode)
    }

    /// Fingerprint both sides of `part` in a mode they can be compared in.
    pub(crate) fn measure(&self, record: &RepoRecord, part: RepoPart) -> Result<Measured> {
        let options = self.scan_options(part)?;
        let local = tree::scan(&self.config.local_part_path(record, part), &options)?;
        let remote = self
            .backend(&record.storage_location)?
            .list(&self.config.remote_part_path(record, part), &options)?;

        let mode = self.mode().comparable(&local, &remote);
        if mode != self.mode() {
            tracing::debug!(repo = %record.index_name(), %part, "listing without content hashes, comparing structurally");
        }
        Ok(Measured {
            local: Fingerprint::compute(&local, mode),
            remote: Fingerprint::compute(&remote, mode),
            mode,
        })
    }

    fn baseline(&self, record: &RepoRecord, part: RepoPart, mode: FingerprintMode) -> Result<Option<Fingerprint>> {
        Ok(self.baselines.load(record, part, mode)?.map(|b| b.fingerprint))
    }

    /// What a sync of `part` would do, without taking the lock or
    /// transferring anything.
    pub fn status(&self, record: &RepoRecord, part: RepoPart) -> Result<PartStatus> {
        let Measured { local, remote, mode } = self.measure(record, part)?;
        let baseline = self.baseline(record, part, mode)?;
        let decision = match self.baselines.pending(record, part)? {
            Some(pending) if resumes(&pending, &local, &remote, mode) => pending.direction.into(),
            _ => decide(&local, &remote, baseline.as_ref()),
        };
        Ok(PartStatus {
            part,
            decision,
            local,
            remote,
            baseline,
        })
    }

    /// Lock the repo and synchronize `parts` in order.
    ///
    /// DATA is skipped for repos that are not included here. A busy lock is
    /// [`Error::LockContention`]; conflicts and transfer failures are
    /// reported per part.
    pub fn sync(&self, record: &RepoRecord, parts: &[RepoPart]) -> Result<SyncReport> {
        let lock = self.lock(record)?;
        let mut report = SyncReport::new(record.index_name(), &record.storage_location);
        for &part in parts {
            if part == RepoPart::Data && !self.is_included(record) {
                tracing::debug!(repo = %record.index_name(), "not included, skipping data");
                continue;
            }
            let outcome = self.sync_part_locked(&lock, record, part)?;
            report.push(part, outcome);
        }
        Ok(report)
    }

    /// Synchronize one part while the caller holds the repo's lock.
    pub fn sync_part_locked(
        &self,
        lock: &RepoLock,
        record: &RepoRecord,
        part: RepoPart,
    ) -> Result<PartOutcome> {
        debug_assert_eq!(lock.key(), record.id.to_string());
        match self.sync_part_inner(record, part) {
            Err(Error::StorageUnreachable { location, message }) => {
                tracing::warn!(repo = %record.index_name(), %part, %location, %message, "sync failed");
                Ok(PartOutcome::Failed { reason: message })
            }
            other => other,
        }
    }

    fn sync_part_inner(&self, record: &RepoRecord, part: RepoPart) -> Result<PartOutcome> {
        let repo = record.index_name();
        let measured = self.measure(record, part)?;
        let baseline = self.baseline(record, part, measured.mode)?;
        let decision = match self.resumable(record, part, &measured)? {
            Some(direction) => direction.into(),
            None => decide(&measured.local, &measured.remote, baseline.as_ref()),
        };
        tracing::debug!(
            repo = %repo,
            %part,
            local = %measured.local.short(),
            remote = %measured.remote.short(),
            baseline = baseline.as_ref().map(|b| b.short()).unwrap_or("none"),
            %decision,
            "decided"
        );

        match decision {
            Decision::Noop => Ok(PartOutcome::Noop),
            Decision::AdoptBaseline => {
                self.baselines
                    .save(record, part, &SyncRecord::new(measured.local, measured.mode))?;
                Ok(PartOutcome::Noop)
            }
            Decision::Conflict(kind) => {
                tracing::warn!(repo = %repo, %part, %kind, "conflict");
                Ok(PartOutcome::Conflict {
                    kind,
                    local: measured.local,
                    remote: measured.remote,
                    baseline,
                })
            }
            Decision::Push => self.transfer(record, part, Direction::Push, measured, baseline),
            Decision::Pull => self.transfer(record, part, Direction::Pull, measured, baseline),
        }
    }

    /// Direction of an interrupted transfer that should be finished.
    ///
    /// A marker whose source side has changed since is dropped, and the
    /// regular decision applies.
    fn resumable(&self, record: &RepoRecord, part: RepoPart, measured: &Measured) -> Result<Option<Direction>> {
        let Some(pending) = self.baselines.pending(record, part)? else {
            return Ok(None);
        };
        if resumes(&pending, &measured.local, &measured.remote, measured.mode) {
            tracing::info!(repo = %record.index_name(), %part, direction = %pending.direction, "resuming interrupted transfer");
            return Ok(Some(pending.direction));
        }
        self.baselines.clear_pending(record, part)?;
        Ok(None)
    }

    fn transfer(
        &self,
        record: &RepoRecord,
        part: RepoPart,
        direction: Direction,
        measured: Measured,
        baseline: Option<Fingerprint>,
    ) -> Result<PartOutcome> {
        let backend = self.backend(&record.storage_location)?;
        let local_dir = self.config.local_part_path(record, part);
        let remote_dir = self.config.remote_part_path(record, part);
        let options = self.scan_options(part)?;

        let preview = backend.mirror(direction, &local_dir, &remote_dir, &options, true)?;
        if part == RepoPart::Data && preview.is_destructive() {
            let now = self.measure(record, part)?;
            if now.local != measured.local || now.remote != measured.remote {
                tracing::warn!(repo = %record.index_name(), %part, "changed during sync, aborting");
                return Ok(PartOutcome::Conflict {
                    kind: ConflictKind::ChangedDuringSync,
                    local: now.local,
                    remote: now.remote,
                    baseline,
                });
            }
        }

        let source = match direction {
            Direction::Push => measured.local,
            Direction::Pull => measured.remote,
        };
        self.baselines
            .mark_pending(record, part, &PendingTransfer::new(direction, source, measured.mode))?;

        let changes = backend.mirror(direction, &local_dir, &remote_dir, &options, false)?;

        let fresh = self.measure(record, part)?;
        let agreed = match direction {
            Direction::Push => fresh.remote,
            Direction::Pull => fresh.local,
        };
        self.baselines
            .save(record, part, &SyncRecord::new(agreed, fresh.mode))?;
        self.baselines.clear_pending(record, part)?;
        if part == RepoPart::Meta && direction == Direction::Pull {
            self.metadata.invalidate()?;
        }

        tracing::info!(repo = %record.index_name(), %part, %direction, %changes, "synced");
        Ok(match direction {
            Direction::Push => PartOutcome::Pushed { changes },
            Direction::Pull => PartOutcome::Pulled { changes },
        })
    }
}

/// Whether an interrupted transfer can be finished: the sides still differ
/// and the side it copies from is what it was when the transfer started.
fn resumes(pending: &PendingTransfer, local: &Fingerprint, remote: &Fingerprint, mode: FingerprintMode) -> bool {
    let source = match pending.direction {
        Direction::Push => local,
        Direction::Pull => remote,
    };
    local != remote && pending.mode == mode && pending.source == *source
}
