//! Multi-machine fixtures.
//!
//! A [`TestYard`] lays out, inside one temporary directory, a shared storage
//! location plus several "machines", each with its own data directory,
//! views and `config.toml`. Tests load a machine's config with the regular
//! config loader, so the fixture stays independent of the crates under test.
//!
//! # Example
//!
//! ```rust,no_run
//! use yard_test_utils::TestYard;
//!
//! let yard = TestYard::builder().machines(2).build();
//! let laptop = yard.machine(0);
//! assert!(laptop.config_path().exists());
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Name of the shared storage location in every generated config.
pub const LOCATION: &str = "local";

/// One simulated machine.
#[derive(Debug, Clone)]
pub struct Instance {
    root: PathBuf,
}

impl Instance {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn data_path(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Flat view directory.
    pub fn repos_path(&self) -> PathBuf {
        self.root.join("repos")
    }

    /// Grouped view directory.
    pub fn groups_path(&self) -> PathBuf {
        self.root.join("groups")
    }
}

/// Builder for [`TestYard`].
#[derive(Debug, Clone)]
pub struct TestYardBuilder {
    machines: usize,
    fingerprint_mode: &'static str,
    default_groups: Vec<String>,
    ignore: Option<Vec<String>>,
    extra: String,
}

impl Default for TestYardBuilder {
    fn default() -> Self {
        Self {
            machines: 1,
            fingerprint_mode: "structural",
            default_groups: Vec::new(),
            ignore: None,
            extra: String::new(),
        }
    }
}

impl TestYardBuilder {
    pub fn machines(mut self, n: usize) -> Self {
        self.machines = n.max(1);
        self
    }

    /// Use content hashes instead of mtimes.
    pub fn content_fingerprints(mut self) -> Self {
        self.fingerprint_mode = "content";
        self
    }

    pub fn default_group(mut self, group: &str) -> Self {
        self.default_groups.push(group.to_string());
        self
    }

    pub fn ignore(mut self, patterns: &[&str]) -> Self {
        self.ignore = Some(patterns.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Append raw TOML, e.g. `[[repo_groups]]` tables, to every config.
    pub fn extra_toml(mut self, toml: &str) -> Self {
        self.extra.push_str(toml);
        self.extra.push('\n');
        self
    }

    pub fn build(self) -> TestYard {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = temp_dir.path().join("store");
        fs::create_dir_all(&store).expect("Failed to create store directory");

        let machines = (0..self.machines)
            .map(|i| {
                let instance = Instance {
                    root: temp_dir.path().join(format!("machine{i}")),
                };
                fs::create_dir_all(instance.data_path()).expect("Failed to create data directory");
                fs::write(instance.config_path(), self.render(&instance, &store))
                    .expect("Failed to write config");
                instance
            })
            .collect();

        TestYard {
            temp_dir,
            store,
            machines,
        }
    }

    fn render(&self, instance: &Instance, store: &Path) -> String {
        let quote = |p: &Path| format!("{:?}", p.display().to_string());
        let list = |items: &[String]| {
            let quoted: Vec<String> = items.iter().map(|s| format!("{s:?}")).collect();
            format!("[{}]", quoted.join(", "))
        };

        let mut out = String::new();
        let _ = writeln!(out, "default_storage_location = {LOCATION:?}");
        let _ = writeln!(out, "data_path = {}", quote(&instance.data_path()));
        let _ = writeln!(out, "user_repos_path = {}", quote(&instance.repos_path()));
        let _ = writeln!(out, "user_repo_groups_path = {}", quote(&instance.groups_path()));
        let _ = writeln!(out, "default_repo_groups = {}", list(&self.default_groups));
        if let Some(ignore) = &self.ignore {
            let _ = writeln!(out, "ignore = {}", list(ignore));
        }
        out.push('\n');
        let _ = writeln!(out, "[storage_locations.{LOCATION}]");
        let _ = writeln!(out, "storage_type = \"local\"");
        let _ = writeln!(out, "store_path = {}", quote(store));
        out.push('\n');
        let _ = writeln!(out, "[sync]");
        let _ = writeln!(out, "max_concurrency = 4");
        let _ = writeln!(out, "fingerprint_mode = {:?}", self.fingerprint_mode);
        out.push('\n');
        out.push_str(&self.extra);
        out
    }
}

/// A shared store and the machines syncing against it.
///
/// Everything is removed when the value is dropped.
pub struct TestYard {
    temp_dir: TempDir,
    store: PathBuf,
    machines: Vec<Instance>,
}

impl TestYard {
    /// One machine with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TestYardBuilder {
        TestYardBuilder::default()
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Root of the shared storage location.
    pub fn store_path(&self) -> &Path {
        &self.store
    }

    /// Machine `i`.
    ///
    /// # Panics
    /// Panics if there is no such machine.
    pub fn machine(&self, i: usize) -> &Instance {
        self.machines
            .get(i)
            .unwrap_or_else(|| panic!("TestYard has {} machines, not {}", self.machines.len(), i + 1))
    }

    pub fn machines(&self) -> &[Instance] {
        &self.machines
    }

    /// Make the storage location unreachable by moving it away.
    pub fn take_store_offline(&self) {
        fs::rename(&self.store, self.store.with_extension("offline"))
            .expect("Failed to move store away");
    }

    pub fn bring_store_online(&self) {
        fs::rename(self.store.with_extension("offline"), &self.store)
            .expect("Failed to move store back");
    }
}

impl Default for TestYard {
    fn default() -> Self {
        Self::new()
    }
}
