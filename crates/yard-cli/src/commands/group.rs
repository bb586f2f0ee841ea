//! Group command implementation

use std::path::Path;

use colored::Colorize;
use yard_core::Yard;

use crate::cli::GroupAction;
use crate::context;
use crate::error::Result;

/// Run a group subcommand
pub fn run_group(yard: &Yard, action: &GroupAction, cwd: &Path) -> Result<()> {
    let (repo, add, remove) = match action {
        GroupAction::Add { repo, groups } => (repo, groups.as_slice(), &[][..]),
        GroupAction::Remove { repo, groups } => (repo, &[][..], groups.as_slice()),
    };
    let record = context::resolve(yard, Some(repo.as_str()), cwd)?;
    let updated = yard.modify_groups(&record, add, remove)?;

    let groups: Vec<&str> = updated.groups.iter().map(String::as_str).collect();
    println!(
        "{} {} groups: {}",
        "OK".green().bold(),
        updated.index_name(),
        if groups.is_empty() {
            "(none)".dimmed().to_string()
        } else {
            groups.join(", ")
        }
    );
    println!("Run {} to share the change.", "yard sync --part meta".cyan());
    Ok(())
}
