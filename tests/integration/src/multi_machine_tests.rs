//! Multi-machine scenarios
//!
//! Several machines share one storage location and take turns editing the
//! same repos. Every machine must converge on the same content, and no
//! combination of interleavings may lose an edit silently.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use yard_core::{Config, Error, PartOutcome, RepoPart, RepoRecord, SyncEngine, Yard};
use yard_fs::{LockPolicy, SymlinkStore};
use yard_test_utils::TestYard;
use yard_test_utils::files::write;

fn open(yard: &TestYard, machine: usize) -> Yard {
    Yard::open(&yard.machine(machine).config_path()).unwrap()
}

fn data(y: &Yard, record: &RepoRecord) -> PathBuf {
    y.config().local_part_path(record, RepoPart::Data)
}

fn sync_ok(y: &Yard, record: &RepoRecord) {
    y.sync(record, &RepoPart::ALL).unwrap().into_result().unwrap();
}

#[test]
fn three_machines_take_turns() {
    let yard = TestYard::builder().machines(3).build();
    let machines: Vec<Yard> = (0..3).map(|i| open(&yard, i)).collect();

    let record = machines[0].new_repo("journal", None, &[]).unwrap();
    write(&data(&machines[0], &record).join("log.txt"), "0");
    sync_ok(&machines[0], &record);
    for y in &machines[1..] {
        y.sync_missing_metas().unwrap();
        y.include(&record).unwrap();
    }

    // Each turn appends one character, so sizes always change
    let mut expected = String::from("0");
    for round in 1..=6 {
        let y = &machines[round % 3];
        sync_ok(y, &record);
        expected.push_str(&round.to_string());
        write(&data(y, &record).join("log.txt"), &expected);
        sync_ok(y, &record);
    }

    for y in &machines {
        sync_ok(y, &record);
        assert_eq!(fs::read_to_string(data(y, &record).join("log.txt")).unwrap(), expected);
    }
}

#[test]
fn conflict_clears_once_local_edits_are_reverted() {
    let yard = TestYard::builder().machines(2).content_fingerprints().build();
    let first = open(&yard, 0);
    let second = open(&yard, 1);

    let record = first.new_repo("notes", None, &[]).unwrap();
    write(&data(&first, &record).join("a.txt"), "base");
    sync_ok(&first, &record);
    second.sync_missing_metas().unwrap();
    second.include(&record).unwrap();

    write(&data(&first, &record).join("a.txt"), "from first");
    sync_ok(&first, &record);
    write(&data(&second, &record).join("a.txt"), "from second");
    let conflicted = second.sync(&record, &RepoPart::ALL).unwrap();
    assert!(matches!(
        conflicted.outcome(RepoPart::Data),
        Some(PartOutcome::Conflict { .. })
    ));

    // Content fingerprints see the restored file as the baseline again
    write(&data(&second, &record).join("a.txt"), "base");
    sync_ok(&second, &record);
    assert_eq!(
        fs::read_to_string(data(&second, &record).join("a.txt")).unwrap(),
        "from first"
    );
}

#[test]
fn concurrent_syncs_of_one_repo_are_serialized() {
    let yard = TestYard::new();
    let setup = open(&yard, 0);
    let record = setup.new_repo("shared", None, &[]).unwrap();
    write(&data(&setup, &record).join("a.txt"), "hello");

    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let record = record.clone();
            let config = Config::load(&yard.machine(0).config_path()).unwrap();
            thread::spawn(move || {
                let engine = SyncEngine::new(Arc::new(config)).with_lock_policy(LockPolicy::Retry {
                    max_wait: Duration::from_secs(10),
                });
                let y = Yard::from_parts(engine, SymlinkStore::new());
                barrier.wait();
                y.sync(&record, &RepoPart::ALL)
            })
        })
        .collect();

    let mut pushes = 0;
    for handle in handles {
        let report = handle.join().unwrap().unwrap();
        assert!(report.is_success(), "{report:?}");
        if matches!(report.outcome(RepoPart::Data), Some(PartOutcome::Pushed { .. })) {
            pushes += 1;
        }
    }
    assert_eq!(pushes, 1);
    let remote = yard.store_path().join(record.index_name()).join("data/a.txt");
    assert_eq!(fs::read_to_string(remote).unwrap(), "hello");
}

#[test]
fn fail_fast_contention_is_reported_not_waited_on() {
    let yard = TestYard::new();
    let y = open(&yard, 0);
    let record = y.new_repo("shared", None, &[]).unwrap();

    let held = y
        .engine()
        .locks()
        .acquire(&record.id.to_string(), LockPolicy::FailFast)
        .unwrap();
    assert!(matches!(
        y.sync(&record, &RepoPart::ALL),
        Err(Error::LockContention { .. })
    ));
    drop(held);
    sync_ok(&y, &record);
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_with_offline_store_reports_every_repo() {
    let yard = TestYard::new();
    let y = open(&yard, 0);
    let records: Vec<RepoRecord> = (0..6)
        .map(|i| {
            let record = y.new_repo(&format!("repo{i}"), None, &[]).unwrap();
            write(&data(&y, &record).join("f.txt"), "x");
            record
        })
        .collect();

    yard.take_store_offline();
    let report = y.sync_many(records.clone(), RepoPart::ALL.to_vec()).await;
    assert_eq!(report.results.len(), 6);
    assert!(!report.all_synced());
    for result in &report.results {
        let sync = result.result.as_ref().unwrap();
        assert!(matches!(
            sync.outcome(RepoPart::Meta),
            Some(PartOutcome::Failed { .. })
        ));
    }

    yard.bring_store_online();
    let retried = y.sync_many(records, RepoPart::ALL.to_vec()).await;
    assert!(retried.all_synced());
}

#[test]
fn excluded_machine_still_syncs_metadata() {
    let yard = TestYard::builder().machines(2).build();
    let first = open(&yard, 0);
    let second = open(&yard, 1);
    let record = first.new_repo("notes", None, &[]).unwrap();
    sync_ok(&first, &record);
    second.sync_missing_metas().unwrap();

    second
        .modify_groups(&record, &["archive".to_string()], &[])
        .unwrap();
    sync_ok(&second, &record);
    sync_ok(&first, &record);

    assert!(first.resolve(&record.index_name()).unwrap().groups.contains("archive"));
    assert!(!second.engine().is_included(&record));
}
