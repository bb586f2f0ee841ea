//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use yard_core::RepoPart;
use yard_core::config::CONFIG_PATH_ENV;

/// Yard - keep many small repos in sync across machines
#[derive(Parser, Debug)]
#[command(name = "yard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Which repos a command applies to
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RepoSelection {
    /// Repo index name, id, or a path inside it (defaults to the current directory)
    #[arg(short, long, conflicts_with = "all")]
    pub repo: Option<String>,

    /// Every repo in the index
    #[arg(long)]
    pub all: bool,
}

/// A single part of a repo
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartArg {
    Meta,
    Data,
}

impl From<PartArg> for RepoPart {
    fn from(part: PartArg) -> Self {
        match part {
            PartArg::Meta => RepoPart::Meta,
            PartArg::Data => RepoPart::Data,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Write a default configuration
    ///
    /// Examples:
    ///   yard init                         # ~/.config/yard/config.toml, data in ~/.yard
    ///   yard init --data-path /srv/yard   # Custom data directory
    Init {
        /// Where repos, sync records and locks are kept
        #[arg(long)]
        data_path: Option<PathBuf>,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Create a repo on this machine
    ///
    /// Examples:
    ///   yard new notes                    # Empty repo
    ///   yard new --from ~/src/old-tool    # Move a directory in, named old-tool
    New {
        /// Repo name (defaults to the name of the --from directory)
        name: Option<String>,

        /// Storage location (defaults to default_storage_location)
        #[arg(short, long)]
        location: Option<String>,

        /// Groups to put the repo in
        #[arg(short, long = "group")]
        groups: Vec<String>,

        /// Existing directory to move in as the repo's content
        #[arg(short, long = "from")]
        from: Option<PathBuf>,

        /// Record this host as the creator instead of the local hostname
        #[arg(short, long = "creator-hostname")]
        creator_hostname: Option<String>,
    },

    /// Synchronize repos with their storage location
    Sync {
        #[command(flatten)]
        selection: RepoSelection,

        /// Only this part (both by default)
        #[arg(long, value_enum)]
        part: Option<PartArg>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pull the metadata of repos created on other machines
    SyncMissing,

    /// Materialize a repo's content on this machine
    Include {
        /// Repo index name, id, or path
        repo: Option<String>,
    },

    /// Remove a repo's content from this machine
    Exclude {
        /// Repo index name, id, or path
        repo: Option<String>,
    },

    /// Delete a repo everywhere
    Delete {
        /// Repo index name, id, or path
        repo: Option<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show what a sync would do
    Status {
        #[command(flatten)]
        selection: RepoSelection,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known repos
    List {
        /// Only repos in this group
        #[arg(short, long)]
        group: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage a repo's groups
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },

    /// Rebuild the repo views
    Reconcile,
}

/// Group subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum GroupAction {
    /// Add a repo to groups
    Add {
        /// Repo index name, id, or path
        repo: String,
        /// Groups to add
        #[arg(required = true)]
        groups: Vec<String>,
    },
    /// Remove a repo from groups
    Remove {
        /// Repo index name, id, or path
        repo: String,
        /// Groups to remove
        #[arg(required = true)]
        groups: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_sync_all_data() {
        let cli = Cli::parse_from(["yard", "sync", "--all", "--part", "data"]);
        match cli.command {
            Some(Commands::Sync {
                selection, part, ..
            }) => {
                assert!(selection.all);
                assert_eq!(part, Some(PartArg::Data));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn repo_and_all_conflict() {
        let result = Cli::try_parse_from(["yard", "sync", "--all", "--repo", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::parse_from(["yard", "list", "--config", "/tmp/c.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn group_add_needs_groups() {
        assert!(Cli::try_parse_from(["yard", "group", "add", "repo"]).is_err());
    }
}
