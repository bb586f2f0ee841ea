//! Command implementations for yard-cli

pub mod group;
pub mod inclusion;
pub mod init;
pub mod list;
pub mod repo;
pub mod status;
pub mod sync;

pub use group::run_group;
pub use inclusion::{run_exclude, run_include};
pub use init::run_init;
pub use list::run_list;
pub use repo::{run_delete, run_new, run_reconcile};
pub use status::run_status;
pub use sync::{run_sync, run_sync_missing};

use std::path::Path;

use serde::Serialize;
use yard_core::{RepoRecord, Yard};

use crate::cli::RepoSelection;
use crate::context;
use crate::error::Result;

/// Records a `--repo`/`--all` selection refers to.
pub(crate) fn select(yard: &Yard, selection: &RepoSelection, cwd: &Path) -> Result<Vec<RepoRecord>> {
    if selection.all {
        return Ok(yard.index()?.records().cloned().collect());
    }
    Ok(vec![context::resolve(yard, selection.repo.as_deref(), cwd)?])
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
