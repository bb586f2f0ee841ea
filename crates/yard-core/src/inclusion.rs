//! Materializing and evicting a repo's DATA on this machine
//!
//! A repo is included exactly when its local `data/` directory exists.
//! Include pulls into `.data.staging` and renames it into place, so an
//! interrupted include never leaves a half-filled `data/` behind.

use std::fs;

use serde::Serialize;
use yard_fs::{LinkStore, SymlinkStore, io};

use crate::model::{RepoPart, RepoRecord, SyncRecord};
use crate::projection::SymlinkProjector;
use crate::storage::{ChangeSet, Direction};
use crate::sync::{PartOutcome, SyncEngine};
use crate::{Error, Result};

/// What an include or exclude did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InclusionOutcome {
    AlreadyIncluded,
    Included { changes: ChangeSet },
    NotIncluded,
    Excluded,
}

/// Include/exclude built on the sync engine.
pub struct InclusionManager<'a, L: LinkStore = SymlinkStore> {
    engine: &'a SyncEngine,
    projector: &'a SymlinkProjector<L>,
}

impl<'a, L: LinkStore> InclusionManager<'a, L> {
    pub fn new(engine: &'a SyncEngine, projector: &'a SymlinkProjector<L>) -> Self {
        Self { engine, projector }
    }

    /// Materialize the repo's DATA locally.
    ///
    /// Syncs META first, then pulls DATA in full. If the home location is
    /// unreachable or the metadata is in conflict, nothing is left behind
    /// locally.
    pub fn include(&self, record: &RepoRecord) -> Result<InclusionOutcome> {
        if self.engine.is_included(record) {
            return Ok(InclusionOutcome::AlreadyIncluded);
        }
        let repo = record.index_name();
        let refuse = |reason: String| Error::InclusionState {
            repo: repo.clone(),
            reason,
        };

        let changes = {
            let lock = self.engine.lock(record)?;
            if self.engine.is_included(record) {
                return Ok(InclusionOutcome::AlreadyIncluded);
            }

            match self.engine.sync_part_locked(&lock, record, RepoPart::Meta)? {
                PartOutcome::Failed { reason } => {
                    return Err(refuse(format!("home location unreachable: {reason}")));
                }
                PartOutcome::Conflict { kind, .. } => {
                    return Err(refuse(format!("metadata conflict ({kind}); resolve it with a meta sync first")));
                }
                _ => {}
            }

            let config = self.engine.config();
            let staging = config.staging_path(record);
            let data_dir = config.local_part_path(record, RepoPart::Data);
            io::remove_dir_if_exists(&staging)?;

            let backend = self.engine.backend(&record.storage_location)?;
            let pulled = backend.mirror(
                Direction::Pull,
                &staging,
                &config.remote_part_path(record, RepoPart::Data),
                &self.engine.scan_options(RepoPart::Data)?,
                false,
            );
            let changes = match pulled {
                Ok(changes) => changes,
                Err(e) => {
                    io::remove_dir_if_exists(&staging)?;
                    return Err(refuse(e.to_string()));
                }
            };

            io::ensure_dir(&staging)?;
            fs::rename(&staging, &data_dir).map_err(|e| yard_fs::Error::io(&data_dir, e))?;

            let fresh = self.engine.measure(record, RepoPart::Data)?;
            self.engine.baselines().save(
                record,
                RepoPart::Data,
                &SyncRecord::new(fresh.local, fresh.mode),
            )?;
            tracing::info!(repo = %repo, %changes, "included");
            changes
        };

        self.reconcile();
        Ok(InclusionOutcome::Included { changes })
    }

    /// Remove the repo's local DATA.
    ///
    /// Refused when the local content differs from the last synced
    /// baseline; nothing is deleted in that case.
    pub fn exclude(&self, record: &RepoRecord) -> Result<InclusionOutcome> {
        if !self.engine.is_included(record) {
            return Ok(InclusionOutcome::NotIncluded);
        }
        {
            let _lock = self.engine.lock(record)?;
            if !self.engine.is_included(record) {
                return Ok(InclusionOutcome::NotIncluded);
            }

            // Compare in whatever mode the baseline was taken in
            let clean = match self.engine.baselines().load_any(record, RepoPart::Data)? {
                Some(b) => self.engine.measure_local(record, RepoPart::Data, b.mode)? == b.fingerprint,
                None => self
                    .engine
                    .measure_local(record, RepoPart::Data, self.engine.config().sync.fingerprint_mode)?
                    .is_empty(),
            };
            if !clean {
                return Err(Error::InclusionState {
                    repo: record.index_name(),
                    reason: "local data has unsynced changes; sync it first".into(),
                });
            }

            let data_dir = self.engine.config().local_part_path(record, RepoPart::Data);
            io::remove_dir_if_exists(&data_dir)?;
            self.engine.baselines().remove(record, RepoPart::Data)?;
            tracing::info!(repo = %record.index_name(), "excluded");
        }

        self.reconcile();
        Ok(InclusionOutcome::Excluded)
    }

    fn reconcile(&self) {
        let result = self
            .engine
            .metadata()
            .get_index(false)
            .and_then(|index| self.projector.reconcile(&index));
        if let Err(e) = result {
            tracing::warn!(error = %e, "view reconcile failed");
        }
    }
}
