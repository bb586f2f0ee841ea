//! Status command implementation

use std::path::Path;

use colored::Colorize;
use yard_core::{Decision, PartStatus, Yard};

use super::{print_json, select};
use crate::cli::RepoSelection;
use crate::error::Result;

/// Run the status command
///
/// Measures each part and prints the decision a sync would take, without
/// locking or transferring anything.
pub fn run_status(yard: &Yard, selection: &RepoSelection, json: bool, cwd: &Path) -> Result<()> {
    let records = select(yard, selection, cwd)?;

    let mut all = Vec::new();
    for record in &records {
        let statuses = yard.status(record)?;
        if !json {
            print_statuses(&record.index_name(), yard.engine().is_included(record), &statuses);
        }
        all.push((record.index_name(), statuses));
    }
    if json {
        let mut map = serde_json::Map::new();
        for (name, statuses) in all {
            map.insert(name, serde_json::to_value(statuses)?);
        }
        print_json(&map)?;
    }
    Ok(())
}

fn print_statuses(index_name: &str, included: bool, statuses: &[PartStatus]) {
    let marker = if included {
        "included".green()
    } else {
        "not included".dimmed()
    };
    println!("{} ({})", index_name.bold(), marker);
    for status in statuses {
        let decision = match status.decision {
            Decision::Noop | Decision::AdoptBaseline => "in sync".green(),
            Decision::Push => "would push".cyan(),
            Decision::Pull => "would pull".cyan(),
            Decision::Conflict(_) => "conflict".yellow().bold(),
        };
        println!(
            "  {:<4} {} {}",
            status.part,
            decision,
            format!(
                "(local {}, remote {})",
                status.local.short(),
                status.remote.short()
            )
            .dimmed()
        );
    }
}
