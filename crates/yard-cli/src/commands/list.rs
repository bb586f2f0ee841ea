//! List command implementation

use colored::Colorize;
use serde::Serialize;
use yard_core::{RepoRecord, Yard};

use super::print_json;
use crate::error::Result;

/// One row of `yard list`.
#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    index_name: String,
    id: String,
    name: &'a str,
    storage_location: &'a str,
    creator_host: &'a str,
    groups: Vec<String>,
    included: bool,
}

impl<'a> ListEntry<'a> {
    fn new(yard: &Yard, record: &'a RepoRecord) -> Self {
        Self {
            index_name: record.index_name(),
            id: record.id.to_string(),
            name: &record.name,
            storage_location: &record.storage_location,
            creator_host: &record.creator_host,
            groups: yard.projector().groups_of(record).into_iter().collect(),
            included: yard.engine().is_included(record),
        }
    }
}

/// Run the list command
pub fn run_list(yard: &Yard, group: Option<&str>, json: bool) -> Result<()> {
    let index = yard.index()?;
    let entries: Vec<ListEntry> = index
        .records()
        .map(|record| ListEntry::new(yard, record))
        .filter(|entry| group.is_none_or(|g| entry.groups.iter().any(|e| e == g)))
        .collect();

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("{} (use {} to create one)", "No repos".dimmed(), "yard new".cyan());
        return Ok(());
    }
    for entry in &entries {
        let marker = if entry.included {
            "+".green()
        } else {
            "-".dimmed()
        };
        println!(
            "{} {:<40} {:<10} {}",
            marker,
            entry.index_name,
            entry.storage_location.dimmed(),
            entry.groups.join(",").cyan()
        );
    }
    Ok(())
}
