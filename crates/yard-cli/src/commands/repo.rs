//! Repo lifecycle commands: new, delete, reconcile

use std::path::Path;

use colored::Colorize;
use yard_core::{NewRepo, Yard};

use crate::context;
use crate::error::{CliError, Result};
use crate::interactive;

/// Run the new command
pub fn run_new(yard: &Yard, name: Option<&str>, options: NewRepo) -> Result<()> {
    let name = match (name, &options.from_path) {
        (Some(name), _) => name.to_string(),
        (None, Some(from)) => from
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::user(format!("cannot name a repo after {}", from.display())))?,
        (None, None) => return Err(CliError::user("give a repo name or --from <dir>")),
    };
    let record = yard.create_repo(&name, &options)?;
    println!("{} {}", "Created".green().bold(), record.index_name());
    println!(
        "{}: {}",
        "Path".dimmed(),
        yard.config().user_repo_link(&record).display()
    );
    println!("Run {} to push it.", "yard sync".cyan());
    Ok(())
}

/// Run the delete command
pub fn run_delete(yard: &Yard, repo: Option<&str>, yes: bool, cwd: &Path) -> Result<()> {
    let record = context::resolve(yard, repo, cwd)?;
    if !yes {
        let prompt = format!(
            "Delete {} from '{}' and this machine? This cannot be undone",
            record.index_name(),
            record.storage_location
        );
        if !interactive::confirm(&prompt)? {
            return Err(CliError::user("aborted"));
        }
    }
    yard.delete_repo(&record)?;
    println!("{} {}", "Deleted".green().bold(), record.index_name());
    Ok(())
}

/// Run the reconcile command
pub fn run_reconcile(yard: &Yard) -> Result<()> {
    let report = yard.reconcile()?;
    println!(
        "{} created {}, replaced {}, removed {}",
        "Views:".bold(),
        report.created.len(),
        report.replaced.len(),
        report.removed.len()
    );
    for collision in &report.collisions {
        println!(
            "{} '{}' in group {}: kept {}, left out {}",
            "COLLISION".yellow().bold(),
            collision.title,
            collision.group,
            collision.kept.as_deref().unwrap_or("none"),
            collision.rejected.join(", ")
        );
    }
    for failure in &report.failures {
        eprintln!(
            "{} {}: {}",
            "ERROR".red().bold(),
            failure.path.display(),
            failure.message
        );
    }
    if !report.is_clean() {
        return Err(CliError::user(format!(
            "{} link(s) could not be updated",
            report.failures.len()
        )));
    }
    Ok(())
}
