//! Persistent per-part baselines and in-flight transfer markers

use std::sync::Arc;

use yard_fs::{FingerprintMode, NormalizedPath, io};

use crate::Result;
use crate::config::Config;
use crate::model::{PendingTransfer, RepoPart, RepoRecord, SyncRecord};

/// Reads and writes `<data>/sync_records/<index_name>/<part>.toml`.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    config: Arc<Config>,
}

impl BaselineStore {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// The baseline for `part`, if one exists and was taken in `mode`.
    ///
    /// A baseline that cannot be read, or that was measured in another
    /// fingerprint mode, is treated as absent.
    pub fn load(
        &self,
        record: &RepoRecord,
        part: RepoPart,
        mode: FingerprintMode,
    ) -> Result<Option<SyncRecord>> {
        match self.load_any(record, part)? {
            Some(baseline) if baseline.mode != mode => {
                tracing::info!(repo = %record.index_name(), %part, "baseline taken in another fingerprint mode, ignoring");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// The baseline for `part` in whichever mode it was taken.
    pub fn load_any(&self, record: &RepoRecord, part: RepoPart) -> Result<Option<SyncRecord>> {
        let path = NormalizedPath::new(self.config.sync_record_path(record, part));
        if !path.exists() {
            return Ok(None);
        }
        let text = io::read_text(&path)?;
        match toml::from_str::<SyncRecord>(&text) {
            Ok(baseline) => Ok(Some(baseline)),
            Err(e) => {
                tracing::warn!(repo = %record.index_name(), %part, error = %e, "unreadable baseline, ignoring");
                Ok(None)
            }
        }
    }

    pub fn save(&self, record: &RepoRecord, part: RepoPart, baseline: &SyncRecord) -> Result<()> {
        let path = NormalizedPath::new(self.config.sync_record_path(record, part));
        let content = toml::to_string_pretty(baseline).map_err(|e| crate::Error::RecordCorrupt {
            path: path.to_native(),
            message: e.to_string(),
        })?;
        io::write_text(&path, &content)?;
        tracing::debug!(repo = %record.index_name(), %part, fingerprint = %baseline.fingerprint.short(), "baseline written");
        Ok(())
    }

    pub fn remove(&self, record: &RepoRecord, part: RepoPart) -> Result<()> {
        io::remove_file_if_exists(&self.config.sync_record_path(record, part))?;
        Ok(())
    }

    /// Record that a transfer of `part` is about to start.
    pub fn mark_pending(&self, record: &RepoRecord, part: RepoPart, pending: &PendingTransfer) -> Result<()> {
        let path = NormalizedPath::new(self.config.pending_transfer_path(record, part));
        let content = toml::to_string_pretty(pending).map_err(|e| crate::Error::RecordCorrupt {
            path: path.to_native(),
            message: e.to_string(),
        })?;
        io::write_text(&path, &content)?;
        Ok(())
    }

    /// The interrupted transfer of `part`, if any. Unreadable markers are
    /// dropped.
    pub fn pending(&self, record: &RepoRecord, part: RepoPart) -> Result<Option<PendingTransfer>> {
        let path = NormalizedPath::new(self.config.pending_transfer_path(record, part));
        if !path.exists() {
            return Ok(None);
        }
        match toml::from_str::<PendingTransfer>(&io::read_text(&path)?) {
            Ok(pending) => Ok(Some(pending)),
            Err(e) => {
                tracing::warn!(repo = %record.index_name(), %part, error = %e, "unreadable transfer marker, ignoring");
                self.clear_pending(record, part)?;
                Ok(None)
            }
        }
    }

    pub fn clear_pending(&self, record: &RepoRecord, part: RepoPart) -> Result<()> {
        io::remove_file_if_exists(&self.config.pending_transfer_path(record, part))?;
        Ok(())
    }

    /// Remove every baseline and marker of a repo.
    pub fn remove_all(&self, record: &RepoRecord) -> Result<()> {
        let dir = self.config.sync_records_path().join(record.index_name());
        io::remove_dir_if_exists(&dir)?;
        Ok(())
    }
}
