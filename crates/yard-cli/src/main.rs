//! Yard CLI
//!
//! The command-line interface for syncing repos across machines.

mod cli;
mod commands;
mod context;
mod error;
mod interactive;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use yard_core::Config;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Log to stderr, and to `log_file` when one is given.
///
/// Stderr shows warnings unless `-v` or `RUST_LOG` say otherwise; the file
/// keeps info and above. The returned guard flushes the file on drop.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let stderr_layer = fmt::layer()
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let (file_layer, guard) = match log_file.and_then(file_appender) {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(if verbose { "debug" } else { "info" }));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    guard
}

/// Appending writer for `path`, or `None` if its directory does not exist yet.
fn file_appender(path: &Path) -> Option<RollingFileAppender> {
    let dir = path.parent().filter(|d| d.is_dir())?;
    let name = path.file_name()?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .ok()
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = context::config_path(cli.config.as_deref());
    let log_file = Config::load(&config_path).ok().map(|config| config.log_path());
    let _log_guard = init_tracing(cli.verbose, log_file.as_deref());
    tracing::debug!("Verbose mode enabled");

    match cli.command {
        Some(cmd) => execute_command(cmd, &config_path),
        None => {
            // No command provided - show help hint
            println!("{} keeps your repos in sync", "yard".green().bold());
            println!();
            println!("Run {} for available commands.", "yard --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(cmd: Commands, config_path: &Path) -> Result<()> {
    if let Commands::Init { data_path, force } = &cmd {
        return commands::run_init(config_path, data_path.as_deref(), *force);
    }

    let yard = context::open(config_path)?;
    let cwd = std::env::current_dir()?;
    match cmd {
        // handled before the yard is opened
        Commands::Init { .. } => Ok(()),
        Commands::New {
            name,
            location,
            groups,
            from,
            creator_hostname,
        } => {
            let options = yard_core::NewRepo {
                storage_location: location,
                groups,
                from_path: from,
                creator_host: creator_hostname,
            };
            commands::run_new(&yard, name.as_deref(), options)
        }
        Commands::Sync {
            selection,
            part,
            json,
        } => commands::run_sync(&yard, &selection, part, json, &cwd),
        Commands::SyncMissing => commands::run_sync_missing(&yard),
        Commands::Include { repo } => commands::run_include(&yard, repo.as_deref(), &cwd),
        Commands::Exclude { repo } => commands::run_exclude(&yard, repo.as_deref(), &cwd),
        Commands::Delete { repo, yes } => commands::run_delete(&yard, repo.as_deref(), yes, &cwd),
        Commands::Status { selection, json } => commands::run_status(&yard, &selection, json, &cwd),
        Commands::List { group, json } => commands::run_list(&yard, group.as_deref(), json),
        Commands::Group { action } => commands::run_group(&yard, &action, &cwd),
        Commands::Reconcile => commands::run_reconcile(&yard),
    }
}
