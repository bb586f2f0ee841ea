//! Sync command implementations

use std::path::Path;

use colored::Colorize;
use yard_core::{PartOutcome, RepoPart, SyncReport, Yard};

use super::{print_json, select};
use crate::cli::{PartArg, RepoSelection};
use crate::error::{CliError, Result};

/// Run the sync command
///
/// A single repo is synced directly; `--all` runs the batch runner.
pub fn run_sync(
    yard: &Yard,
    selection: &RepoSelection,
    part: Option<PartArg>,
    json: bool,
    cwd: &Path,
) -> Result<()> {
    let parts: Vec<RepoPart> = match part {
        Some(part) => vec![part.into()],
        None => RepoPart::ALL.to_vec(),
    };
    let records = select(yard, selection, cwd)?;

    let mut reports = Vec::new();
    let mut errors = Vec::new();
    if selection.all {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let batch = runtime.block_on(yard.sync_many(records, parts));
        for result in batch.results {
            match result.result {
                Ok(report) => reports.push(report),
                Err(e) => errors.push((result.repo, e.to_string())),
            }
        }
    } else {
        for record in &records {
            reports.push(yard.sync(record, &parts)?);
        }
    }

    if json {
        print_json(&reports)?;
    } else {
        for report in &reports {
            print_report(report);
        }
    }
    for (repo, error) in &errors {
        eprintln!("{} {}: {}", "ERROR".red().bold(), repo, error);
    }

    let unsuccessful = reports.iter().filter(|r| !r.is_success()).count() + errors.len();
    if unsuccessful > 0 {
        return Err(CliError::user(format!(
            "{unsuccessful} repo(s) did not sync cleanly"
        )));
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    for (part, outcome) in &report.parts {
        let label = match outcome {
            PartOutcome::Noop => "noop".dimmed(),
            PartOutcome::Pushed { .. } => "pushed".green().bold(),
            PartOutcome::Pulled { .. } => "pulled".cyan().bold(),
            PartOutcome::Conflict { .. } => "CONFLICT".yellow().bold(),
            PartOutcome::Failed { .. } => "FAILED".red().bold(),
        };
        let detail = match outcome {
            PartOutcome::Pushed { changes } | PartOutcome::Pulled { changes } => changes.to_string(),
            PartOutcome::Conflict { kind, .. } => kind.to_string(),
            PartOutcome::Failed { reason } => reason.clone(),
            PartOutcome::Noop => String::new(),
        };
        println!("{:<10} {} {:<4} {}", label, report.repo, part, detail.dimmed());
    }
}

/// Run the sync-missing command
pub fn run_sync_missing(yard: &Yard) -> Result<()> {
    let report = yard.sync_missing_metas()?;
    for index_name in &report.pulled {
        println!("{} {}", "+".green(), index_name);
    }
    if report.pulled.is_empty() {
        println!("{}", "No new repos.".dimmed());
    }
    for (what, reason) in &report.failures {
        eprintln!("{} {}: {}", "ERROR".red().bold(), what, reason);
    }
    if !report.failures.is_empty() {
        return Err(CliError::user(format!(
            "{} location(s) or repo(s) could not be read",
            report.failures.len()
        )));
    }
    Ok(())
}
