//! User-facing views derived from the index
//!
//! Two views are maintained, both as directory aliases pointing at a repo's
//! local DATA directory:
//!
//! - flat: `<user_repos_path>/<index_name>` for every included repo
//! - grouped: `<user_repo_groups_path>/<group>/<title>` for every
//!   `(group, included repo)` pair
//!
//! Nothing about the views is stored. Each reconcile recomputes the desired
//! set and applies the difference, so it converges after partial failures.

mod writer;

pub use writer::{LinkFailure, ReconcileReport};

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use yard_fs::{LinkStore, SymlinkStore};

use crate::Result;
use crate::config::Config;
use crate::index::RepoIndex;
use crate::model::{RepoPart, RepoRecord};

/// Repos that wanted the same title in a group with unique names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleCollision {
    pub group: String,
    pub title: String,
    /// The repo whose link already held the title, if any
    pub kept: Option<String>,
    /// Repos left out of the group view
    pub rejected: Vec<String>,
}

/// The desired set of links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Link path to target directory
    pub links: BTreeMap<PathBuf, PathBuf>,
    pub collisions: Vec<TitleCollision>,
}

/// Reconciles the flat and grouped views through a [`LinkStore`].
#[derive(Debug, Clone)]
pub struct SymlinkProjector<L: LinkStore = SymlinkStore> {
    config: Arc<Config>,
    links: L,
}

impl SymlinkProjector<SymlinkStore> {
    pub fn with_symlinks(config: Arc<Config>) -> Self {
        Self::new(config, SymlinkStore::new())
    }
}

impl<L: LinkStore> SymlinkProjector<L> {
    pub fn new(config: Arc<Config>, links: L) -> Self {
        Self { config, links }
    }

    pub fn links(&self) -> &L {
        &self.links
    }

    /// Explicit groups plus every virtual group whose filter matches.
    pub fn groups_of(&self, record: &RepoRecord) -> BTreeSet<String> {
        let mut groups = record.groups.clone();
        for group in &self.config.repo_groups {
            if group.is_virtual && group.contains(record) {
                groups.insert(group.name.clone());
            }
        }
        groups
    }

    /// Compute the links that should exist for `index`.
    pub fn desired(&self, index: &RepoIndex) -> Projection {
        let mut projection = Projection::default();
        let mut members: BTreeMap<String, Vec<&RepoRecord>> = BTreeMap::new();

        // records() yields oldest first, which keeps report order stable
        for record in index.records() {
            let target = self.config.local_part_path(record, RepoPart::Data);
            if !target.is_dir() {
                continue;
            }
            projection
                .links
                .insert(self.config.user_repo_link(record), target);
            for group in self.groups_of(record) {
                members.entry(group).or_default().push(record);
            }
        }

        for (group, records) in members {
            let settings = self.config.group(&group);
            let group_dir = self.config.user_repo_groups_path.join(&group);

            let mut by_title: BTreeMap<String, Vec<&RepoRecord>> = BTreeMap::new();
            for record in records {
                by_title
                    .entry(settings.title_mode.title(record))
                    .or_default()
                    .push(record);
            }

            for (title, claimants) in by_title {
                let target = |r: &RepoRecord| self.config.local_part_path(r, RepoPart::Data);
                match claimants.as_slice() {
                    [only] => {
                        projection.links.insert(group_dir.join(&title), target(*only));
                    }
                    contested if settings.unique_repo_names => {
                        // An existing link keeps its holder; a new one is never created
                        let link = group_dir.join(&title);
                        let holder = contested.iter().copied().find(|r| {
                            self.links.points_to(&link, &target(*r)).unwrap_or(false)
                        });
                        if let Some(holder) = holder {
                            projection.links.insert(link, target(holder));
                        }
                        projection.collisions.push(TitleCollision {
                            group: group.clone(),
                            title,
                            kept: holder.map(RepoRecord::index_name),
                            rejected: contested
                                .iter()
                                .filter(|r| holder.is_none_or(|h| h.id != r.id))
                                .map(|r| r.index_name())
                                .collect(),
                        });
                    }
                    all => {
                        for record in all {
                            projection
                                .links
                                .insert(group_dir.join(record.index_name()), target(*record));
                        }
                    }
                }
            }
        }

        projection
    }

    /// Bring the views in line with `index`.
    ///
    /// Individual link failures are collected in the report rather than
    /// aborting; running again retries exactly what is still wrong.
    pub fn reconcile(&self, index: &RepoIndex) -> Result<ReconcileReport> {
        let projection = self.desired(index);
        for collision in &projection.collisions {
            tracing::warn!(
                group = %collision.group,
                title = %collision.title,
                kept = ?collision.kept,
                rejected = ?collision.rejected,
                "title collision in group with unique names"
            );
        }
        let report = writer::apply(
            &self.links,
            &self.config.user_repos_path,
            &self.config.user_repo_groups_path,
            projection,
        )?;
        if report.changes() > 0 {
            tracing::info!(
                created = report.created.len(),
                replaced = report.replaced.len(),
                removed = report.removed.len(),
                "views reconciled"
            );
        }
        Ok(report)
    }
}
