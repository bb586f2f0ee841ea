//! Init command implementation

use std::path::Path;

use colored::Colorize;
use yard_core::{Config, StorageType};
use yard_fs::io;

use crate::error::{CliError, Result};

/// Write the default config to `config_path` and create the directories it
/// names.
pub fn run_init(config_path: &Path, data_path: Option<&Path>, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(CliError::user(format!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        )));
    }

    let data_path = data_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_data_path);
    let config = Config::default_for(config_path, &data_path);
    config.validate()?;

    io::ensure_dir(&config.data_path)?;
    for location in config.storage_locations.values() {
        if location.storage_type == StorageType::Local {
            io::ensure_dir(&location.store_path)?;
        }
    }
    config.save()?;
    tracing::info!(config = %config_path.display(), data = %data_path.display(), "initialized");

    println!("{} Wrote {}", "OK".green().bold(), config_path.display());
    println!("{}:   {}", "Data".dimmed(), config.data_path.display());
    println!("{}:  {}", "Repos".dimmed(), config.user_repos_path.display());
    println!("{}: {}", "Groups".dimmed(), config.user_repo_groups_path.display());
    Ok(())
}
