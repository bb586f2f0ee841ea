//! Include and exclude

use std::fs;

use yard_core::{Error, InclusionOutcome, RepoPart, RepoRecord, Yard};
use yard_test_utils::TestYard;
use yard_test_utils::files::{assert_absent, write};

fn open(yard: &TestYard, machine: usize) -> Yard {
    Yard::open(&yard.machine(machine).config_path()).unwrap()
}

/// A synced repo with one file, created on machine 0.
fn pushed_repo(y: &Yard) -> RepoRecord {
    let record = y.new_repo("notes", None, &[]).unwrap();
    let data = y.config().local_part_path(&record, RepoPart::Data);
    write(&data.join("a.txt"), "hello");
    y.sync(&record, &RepoPart::ALL).unwrap().into_result().unwrap();
    record
}

#[test]
fn discovered_repo_is_not_included_until_asked() {
    let yard = TestYard::builder().machines(2).build();
    let first = open(&yard, 0);
    let record = pushed_repo(&first);

    let second = open(&yard, 1);
    let discovery = second.sync_missing_metas().unwrap();
    assert_eq!(discovery.pulled, vec![record.index_name()]);
    assert!(!second.engine().is_included(&record));

    // A plain sync never materializes DATA
    let report = second.sync(&record, &RepoPart::ALL).unwrap();
    assert!(report.outcome(RepoPart::Data).is_none());
    assert!(!second.engine().is_included(&record));
}

#[test]
fn include_materializes_data_and_links_it() {
    let yard = TestYard::builder().machines(2).build();
    let record = pushed_repo(&open(&yard, 0));
    let second = open(&yard, 1);
    second.sync_missing_metas().unwrap();

    let outcome = second.include(&record).unwrap();
    assert!(matches!(outcome, InclusionOutcome::Included { .. }));
    let link = second.config().user_repo_link(&record);
    assert_eq!(fs::read_to_string(link.join("a.txt")).unwrap(), "hello");

    assert_eq!(second.include(&record).unwrap(), InclusionOutcome::AlreadyIncluded);
}

#[test]
fn include_from_unreachable_location_leaves_nothing_behind() {
    let yard = TestYard::builder().machines(2).build();
    let record = pushed_repo(&open(&yard, 0));
    let second = open(&yard, 1);
    second.sync_missing_metas().unwrap();

    yard.take_store_offline();
    let result = second.include(&record);
    assert!(matches!(result, Err(Error::InclusionState { .. })));
    assert_absent(&second.config().staging_path(&record));
    assert_absent(&second.config().local_part_path(&record, RepoPart::Data));
    assert_absent(&second.config().user_repo_link(&record));
}

#[test]
fn exclude_of_clean_repo_removes_data_and_link() {
    let yard = TestYard::new();
    let y = open(&yard, 0);
    let record = pushed_repo(&y);

    assert_eq!(y.exclude(&record).unwrap(), InclusionOutcome::Excluded);
    assert_absent(&y.config().local_part_path(&record, RepoPart::Data));
    assert_absent(&y.config().user_repo_link(&record));
    assert!(y.config().record_file_path(&record).exists());

    assert_eq!(y.exclude(&record).unwrap(), InclusionOutcome::NotIncluded);
}

#[test]
fn exclude_refuses_unsynced_changes() {
    let yard = TestYard::new();
    let y = open(&yard, 0);
    let record = pushed_repo(&y);
    let unsynced = y.config().local_part_path(&record, RepoPart::Data).join("draft.txt");
    write(&unsynced, "not pushed yet");

    let result = y.exclude(&record);
    assert!(matches!(result, Err(Error::InclusionState { .. })));
    assert!(unsynced.exists());
}

#[test]
fn excluded_repo_can_be_included_again() {
    let yard = TestYard::new();
    let y = open(&yard, 0);
    let record = pushed_repo(&y);
    y.exclude(&record).unwrap();

    y.include(&record).unwrap();
    let data = y.config().local_part_path(&record, RepoPart::Data);
    assert_eq!(fs::read_to_string(data.join("a.txt")).unwrap(), "hello");
}

#[test]
fn include_refuses_while_metadata_is_in_conflict() {
    let yard = TestYard::builder().machines(2).build();
    let first = open(&yard, 0);
    let record = pushed_repo(&first);
    let second = open(&yard, 1);
    second.sync_missing_metas().unwrap();

    first.modify_groups(&record, &["alpha".into()], &[]).unwrap();
    first.sync(&record, &[RepoPart::Meta]).unwrap().into_result().unwrap();
    second.modify_groups(&record, &["b".into()], &[]).unwrap();

    let result = second.include(&record);
    assert!(
        matches!(&result, Err(Error::InclusionState { reason, .. }) if reason.contains("conflict")),
        "{result:?}"
    );
    assert_absent(&second.config().staging_path(&record));
    assert_absent(&second.config().local_part_path(&record, RepoPart::Data));
}
