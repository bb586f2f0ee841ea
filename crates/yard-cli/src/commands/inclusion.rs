//! Include and exclude command implementations

use std::path::Path;

use colored::Colorize;
use yard_core::{InclusionOutcome, Yard};

use crate::context;
use crate::error::Result;

/// Run the include command
pub fn run_include(yard: &Yard, repo: Option<&str>, cwd: &Path) -> Result<()> {
    let record = context::resolve(yard, repo, cwd)?;
    match yard.include(&record)? {
        InclusionOutcome::Included { changes } => {
            println!(
                "{} {} ({} files)",
                "Included".green().bold(),
                record.index_name(),
                changes.added.len()
            );
            println!(
                "{}: {}",
                "Path".dimmed(),
                yard.config().user_repo_link(&record).display()
            );
        }
        _ => println!("{} is already included", record.index_name()),
    }
    Ok(())
}

/// Run the exclude command
pub fn run_exclude(yard: &Yard, repo: Option<&str>, cwd: &Path) -> Result<()> {
    let record = context::resolve(yard, repo, cwd)?;
    match yard.exclude(&record)? {
        InclusionOutcome::Excluded => {
            println!("{} {}", "Excluded".green().bold(), record.index_name());
        }
        _ => println!("{} is not included", record.index_name()),
    }
    Ok(())
}
