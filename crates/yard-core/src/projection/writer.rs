//! Applies a desired link set to the view directories

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use yard_fs::LinkStore;

use super::{Projection, TitleCollision};
use crate::Result;

/// A link operation that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkFailure {
    pub path: PathBuf,
    pub message: String,
}

/// What a reconcile changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: Vec<PathBuf>,
    pub replaced: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
    pub collisions: Vec<TitleCollision>,
    pub failures: Vec<LinkFailure>,
}

impl ReconcileReport {
    /// Number of filesystem mutations performed.
    pub fn changes(&self) -> usize {
        self.created.len() + self.replaced.len() + self.removed.len() + self.removed_dirs.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, path: &Path, error: impl std::fmt::Display) {
        tracing::warn!(path = %path.display(), %error, "link operation failed");
        self.failures.push(LinkFailure {
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }
}

/// Make the links under `flat_root` and the group directories under
/// `groups_root` match `projection`.
pub(super) fn apply<L: LinkStore>(
    links: &L,
    flat_root: &Path,
    groups_root: &Path,
    projection: Projection,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport {
        collisions: projection.collisions,
        ..ReconcileReport::default()
    };
    let desired = projection.links;

    let group_dirs = links.list_dirs(groups_root)?;
    let mut existing = links.list_links(flat_root)?;
    for dir in &group_dirs {
        existing.extend(links.list_links(dir)?);
    }
    let existing_set: BTreeSet<&PathBuf> = existing.iter().collect();

    for link in &existing {
        match desired.get(link) {
            None => match links.remove_link(link) {
                Ok(()) => report.removed.push(link.clone()),
                Err(e) => report.fail(link, e),
            },
            Some(target) => match links.points_to(link, target) {
                Ok(true) => {}
                Ok(false) => {
                    let result = links
                        .remove_link(link)
                        .and_then(|_| links.create_link(target, link));
                    match result {
                        Ok(()) => report.replaced.push(link.clone()),
                        Err(e) => report.fail(link, e),
                    }
                }
                Err(e) => report.fail(link, e),
            },
        }
    }

    for (link, target) in &desired {
        if existing_set.contains(link) {
            continue;
        }
        if links.exists(link) {
            report.fail(link, "path is occupied by something that is not a link");
            continue;
        }
        let result = match link.parent() {
            Some(parent) => links.ensure_dir(parent),
            None => Ok(()),
        }
        .and_then(|_| links.create_link(target, link));
        match result {
            Ok(()) => report.created.push(link.clone()),
            Err(e) => report.fail(link, e),
        }
    }

    for dir in group_dirs {
        if desired.keys().any(|link| link.starts_with(&dir)) {
            continue;
        }
        match links.remove_dir_if_empty(&dir) {
            Ok(true) => report.removed_dirs.push(dir),
            Ok(false) => {}
            Err(e) => report.fail(&dir, e),
        }
    }

    Ok(report)
}
