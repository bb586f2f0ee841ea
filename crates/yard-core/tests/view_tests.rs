//! Flat and grouped views

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use yard_core::{Config, Error, RepoPart, RepoRecord, SyncEngine, TitleMode, Yard};
use yard_fs::{LinkStore, SymlinkStore};
use yard_test_utils::TestYard;
use yard_test_utils::files::{assert_absent, assert_link_points_to};

const GROUPS: &str = r#"
[[repo_groups]]
name = "work"
title_mode = "name"
unique_repo_names = true

[[repo_groups]]
name = "scratch"
title_mode = "name"

[[repo_groups]]
name = "projects"
is_virtual = true
title_mode = "name"

[repo_groups.filter]
name_pattern = "proj-*"
"#;

fn open(yard: &TestYard, machine: usize) -> Yard {
    Yard::open(&yard.machine(machine).config_path()).unwrap()
}

fn grouped() -> TestYard {
    TestYard::builder().extra_toml(GROUPS).build()
}

#[test]
fn new_repo_appears_in_both_views() {
    let yard = TestYard::new();
    let y = open(&yard, 0);
    let record = y.new_repo("notes", None, &["inbox".to_string()]).unwrap();
    let data = y.config().local_part_path(&record, RepoPart::Data);

    assert_link_points_to(&y.config().user_repo_link(&record), &data);
    let title = TitleMode::Datetime.title(&record);
    assert_link_points_to(&yard.machine(0).groups_path().join("inbox").join(title), &data);
}

#[test]
fn default_groups_are_applied() {
    let yard = TestYard::builder().default_group("inbox").build();
    let y = open(&yard, 0);
    let record = y.new_repo("notes", None, &[]).unwrap();
    assert!(record.groups.contains("inbox"));
}

#[test]
fn virtual_group_collects_matching_repos() {
    let yard = grouped();
    let y = open(&yard, 0);
    let matching = y.new_repo("proj-alpha", None, &[]).unwrap();
    let other = y.new_repo("misc", None, &[]).unwrap();

    let projects = yard.machine(0).groups_path().join("projects");
    assert_link_points_to(
        &projects.join("proj-alpha"),
        &y.config().local_part_path(&matching, RepoPart::Data),
    );
    assert_absent(&projects.join(&other.name));
}

#[test]
fn unique_group_refuses_a_taken_name() {
    let yard = grouped();
    let y = open(&yard, 0);
    y.new_repo("api", None, &["work".to_string()]).unwrap();

    let result = y.new_repo("api", None, &["work".to_string()]);
    assert!(matches!(result, Err(Error::NameTaken { ref group, .. }) if group == "work"));
}

#[test]
fn shared_titles_fall_back_to_index_names() {
    let yard = grouped();
    let y = open(&yard, 0);
    let first = y.new_repo("tmp", None, &["scratch".to_string()]).unwrap();
    let second = y.new_repo("tmp", None, &["scratch".to_string()]).unwrap();

    let scratch = yard.machine(0).groups_path().join("scratch");
    assert_absent(&scratch.join("tmp"));
    for record in [&first, &second] {
        assert_link_points_to(
            &scratch.join(record.index_name()),
            &y.config().local_part_path(record, RepoPart::Data),
        );
    }
}

/// Two machines each create `api` in the unique `work` group, then machine 1
/// includes machine 0's repo as well.
fn colliding_titles(yard: &TestYard) -> (Yard, RepoRecord, RepoRecord) {
    let first = open(yard, 0);
    let second = open(yard, 1);

    let older = first.new_repo("api", None, &["work".to_string()]).unwrap();
    first.sync(&older, &RepoPart::ALL).unwrap().into_result().unwrap();
    // ids order by creation millisecond
    std::thread::sleep(Duration::from_millis(5));
    let newer = second.new_repo("api", None, &["work".to_string()]).unwrap();
    second.sync(&newer, &RepoPart::ALL).unwrap().into_result().unwrap();

    second.sync_missing_metas().unwrap();
    second.include(&older).unwrap();
    (second, older, newer)
}

#[test]
fn existing_link_keeps_a_colliding_title() {
    let yard = TestYard::builder().machines(2).extra_toml(GROUPS).build();
    let (second, older, newer) = colliding_titles(&yard);

    let projection = second.projector().desired(&second.index().unwrap());
    assert_eq!(projection.collisions.len(), 1);
    assert_eq!(projection.collisions[0].kept, Some(newer.index_name()));
    assert_eq!(projection.collisions[0].rejected, vec![older.index_name()]);
    assert_link_points_to(
        &yard.machine(1).groups_path().join("work/api"),
        &second.config().local_part_path(&newer, RepoPart::Data),
    );
}

#[test]
fn colliding_title_without_a_link_stays_unlinked() {
    let yard = TestYard::builder().machines(2).extra_toml(GROUPS).build();
    let (second, older, newer) = colliding_titles(&yard);
    let link = yard.machine(1).groups_path().join("work/api");
    fs::remove_file(&link).unwrap();

    let report = second.reconcile().unwrap();
    assert_absent(&link);
    assert_eq!(report.collisions.len(), 1);
    assert_eq!(report.collisions[0].kept, None);
    assert_eq!(
        report.collisions[0].rejected,
        vec![older.index_name(), newer.index_name()]
    );
}

#[test]
fn group_changes_move_links() {
    let yard = TestYard::new();
    let y = open(&yard, 0);
    let record = y.new_repo("notes", None, &[]).unwrap();
    let groups = yard.machine(0).groups_path();

    let updated = y.modify_groups(&record, &["work".to_string()], &[]).unwrap();
    assert!(updated.groups.contains("work"));
    assert!(groups.join("work").join(TitleMode::Datetime.title(&record)).exists());

    y.modify_groups(&updated, &[], &["work".to_string()]).unwrap();
    assert_absent(&groups.join("work"));
}

#[test]
fn stray_links_are_removed_and_real_directories_kept() {
    let yard = TestYard::new();
    let y = open(&yard, 0);
    y.new_repo("notes", None, &[]).unwrap();
    let repos = yard.machine(0).repos_path();

    symlink(yard.root(), repos.join("stray")).unwrap();
    fs::create_dir_all(repos.join("mine")).unwrap();

    let report = y.reconcile().unwrap();
    assert_eq!(report.removed, vec![repos.join("stray")]);
    assert_absent(&repos.join("stray"));
    assert!(repos.join("mine").is_dir());
}

#[test]
fn occupied_link_path_is_reported_not_overwritten() {
    let yard = TestYard::new();
    let y = open(&yard, 0);
    let record = y.new_repo("notes", None, &[]).unwrap();
    let link = y.config().user_repo_link(&record);
    fs::remove_file(&link).unwrap();
    fs::create_dir_all(&link).unwrap();

    let report = y.reconcile().unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(link.is_dir());
    assert!(fs::read_link(&link).is_err());
}

/// Counts every mutating call made through it.
#[derive(Debug, Clone, Default)]
struct CountingLinks {
    inner: SymlinkStore,
    mutations: Arc<AtomicUsize>,
}

impl CountingLinks {
    fn bump(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

impl LinkStore for CountingLinks {
    fn read_link(&self, link: &Path) -> yard_fs::Result<Option<PathBuf>> {
        self.inner.read_link(link)
    }

    fn create_link(&self, target: &Path, link: &Path) -> yard_fs::Result<()> {
        self.bump();
        self.inner.create_link(target, link)
    }

    fn remove_link(&self, link: &Path) -> yard_fs::Result<()> {
        self.bump();
        self.inner.remove_link(link)
    }

    fn list_links(&self, dir: &Path) -> yard_fs::Result<Vec<PathBuf>> {
        self.inner.list_links(dir)
    }

    fn list_dirs(&self, dir: &Path) -> yard_fs::Result<Vec<PathBuf>> {
        self.inner.list_dirs(dir)
    }

    fn ensure_dir(&self, dir: &Path) -> yard_fs::Result<()> {
        self.inner.ensure_dir(dir)
    }

    fn remove_dir_if_empty(&self, dir: &Path) -> yard_fs::Result<bool> {
        let removed = self.inner.remove_dir_if_empty(dir)?;
        if removed {
            self.bump();
        }
        Ok(removed)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }
}

#[test]
fn reconcile_twice_changes_nothing_the_second_time() {
    let yard = grouped();
    let config = Config::load(&yard.machine(0).config_path()).unwrap();
    let links = CountingLinks::default();
    let mutations = Arc::clone(&links.mutations);
    let y = Yard::from_parts(SyncEngine::new(Arc::new(config)), links);

    y.new_repo("proj-alpha", None, &["work".to_string()]).unwrap();
    y.new_repo("notes", None, &["scratch".to_string()]).unwrap();
    let first = y.reconcile().unwrap();
    assert!(first.is_clean());

    let before = mutations.load(Ordering::SeqCst);
    assert!(before > 0);
    let second = y.reconcile().unwrap();
    assert_eq!(second.changes(), 0);
    assert_eq!(mutations.load(Ordering::SeqCst), before);
}
