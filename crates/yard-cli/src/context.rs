//! Command context
//!
//! Opens the configured [`Yard`] and resolves which repo a command is about,
//! so commands work from anywhere inside a repo the way git does.

use std::path::{Path, PathBuf};

use yard_core::{Config, Error, RepoRecord, Yard};

use crate::error::{CliError, Result};

/// The config path from `--config`/`$YARD_CONFIG_PATH`, or the default.
pub fn config_path(flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(Config::default_config_path)
}

/// Open the yard for `config_path`, pointing at `yard init` when missing.
pub fn open(config_path: &Path) -> Result<Yard> {
    match Yard::open(config_path) {
        Ok(yard) => Ok(yard),
        Err(Error::ConfigNotFound { path }) => Err(CliError::user(format!(
            "no config at {}; run `yard init` first",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// The repo named by `query`, or the one containing `cwd`.
pub fn resolve(yard: &Yard, query: Option<&str>, cwd: &Path) -> Result<RepoRecord> {
    match query {
        Some(query) => Ok(yard.resolve(query)?),
        None => {
            let cwd = cwd.to_string_lossy();
            yard.resolve(&cwd).map_err(|e| match e {
                Error::RepoNotFound { .. } => CliError::user(format!(
                    "{cwd} is not inside a repo; name one explicitly"
                )),
                other => other.into(),
            })
        }
    }
}
