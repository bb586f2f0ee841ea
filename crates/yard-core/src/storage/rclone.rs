//! Storage location behind the `rclone` command-line tool

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use yard_fs::{IgnoreRules, NormalizedPath, ScanOptions, TreeEntry, tree};

use super::{ChangeSet, Direction, StorageBackend};
use crate::config::StorageLocationConfig;
use crate::{Error, Result};

/// rclone exit code for "directory not found"
const EXIT_DIR_NOT_FOUND: i32 = 3;
/// rclone exit code for "file not found"
const EXIT_FILE_NOT_FOUND: i32 = 4;

/// Backend that shells out to `rclone`.
#[derive(Debug, Clone)]
pub struct RcloneBackend {
    name: String,
    remote: String,
    store_path: String,
    config_file: Option<PathBuf>,
    program: PathBuf,
}

/// One object from `rclone lsjson`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsEntry {
    path: String,
    #[serde(default)]
    name: String,
    size: i64,
    mod_time: DateTime<FixedOffset>,
    #[serde(default)]
    is_dir: bool,
    #[serde(default)]
    hashes: BTreeMap<String, String>,
}

impl RcloneBackend {
    pub fn new(name: &str, location: &StorageLocationConfig) -> Self {
        Self {
            name: name.to_string(),
            remote: location.remote.clone().unwrap_or_else(|| name.to_string()),
            store_path: NormalizedPath::new(&location.store_path)
                .as_str()
                .trim_end_matches('/')
                .to_string(),
            config_file: location.rclone_config.clone(),
            program: PathBuf::from("rclone"),
        }
    }

    /// Use a different rclone executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// `remote:store_path/path`
    fn spec(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        match (self.store_path.is_empty(), path.is_empty()) {
            (true, _) => format!("{}:{}", self.remote, path),
            (false, true) => format!("{}:{}", self.remote, self.store_path),
            (false, false) => format!("{}:{}/{}", self.remote, self.store_path, path),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(conf) = &self.config_file {
            cmd.arg("--config").arg(conf);
        }
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<Output> {
        tracing::debug!(location = %self.name, command = ?cmd, "running rclone");
        cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::unreachable(&self.name, "rclone executable not found in PATH")
            } else {
                Error::unreachable(&self.name, format!("failed to start rclone: {e}"))
            }
        })
    }

    fn failure(&self, what: &str, output: &Output) -> Error {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("").trim();
        Error::unreachable(
            &self.name,
            format!("rclone {what} failed ({}): {detail}", output.status),
        )
    }
}

fn not_found(output: &Output) -> bool {
    matches!(
        output.status.code(),
        Some(EXIT_DIR_NOT_FOUND) | Some(EXIT_FILE_NOT_FOUND)
    )
}

/// Turn `rclone lsjson` output into tree entries, dropping ignored paths.
fn parse_lsjson(json: &[u8], ignore: &IgnoreRules) -> std::result::Result<Vec<TreeEntry>, String> {
    let raw: Vec<LsEntry> = serde_json::from_slice(json).map_err(|e| e.to_string())?;
    let mut entries: Vec<TreeEntry> = raw
        .into_iter()
        .filter(|e| !e.is_dir)
        .map(|e| TreeEntry {
            path: NormalizedPath::new(&e.path),
            size: e.size.max(0) as u64,
            modified: e.mod_time.timestamp(),
            hash: e
                .hashes
                .get("sha256")
                .map(|h| format!("{}{}", yard_fs::checksum::PREFIX, h.to_lowercase())),
        })
        .filter(|e| !ignore.ignores_ancestor(&e.path) && !ignore.ignores_file(&e.path))
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// rclone `--exclude` arguments equivalent to the ignore patterns.
fn exclude_args(ignore: &IgnoreRules) -> Vec<String> {
    ignore
        .patterns()
        .iter()
        .flat_map(|p| {
            let rule = match p.strip_suffix('/') {
                Some(dir) => format!("{dir}/**"),
                None => p.clone(),
            };
            ["--exclude".to_string(), rule]
        })
        .collect()
}

impl StorageBackend for RcloneBackend {
    fn location(&self) -> &str {
        &self.name
    }

    fn list(&self, path: &str, options: &ScanOptions) -> Result<Vec<TreeEntry>> {
        let mut cmd = self.command();
        cmd.args(["lsjson", "-R", "--files-only"]);
        if options.hash_contents {
            cmd.args(["--hash", "--hash-type", "sha256"]);
        }
        cmd.arg(self.spec(path));

        let output = self.run(cmd)?;
        if !output.status.success() {
            if not_found(&output) {
                return Ok(Vec::new());
            }
            return Err(self.failure("lsjson", &output));
        }
        parse_lsjson(&output.stdout, &options.ignore)
            .map_err(|e| Error::unreachable(&self.name, format!("unreadable lsjson output: {e}")))
    }

    fn list_dirs(&self, path: &str) -> Result<Vec<String>> {
        let mut cmd = self.command();
        cmd.args(["lsjson", "--dirs-only"]).arg(self.spec(path));
        let output = self.run(cmd)?;
        if !output.status.success() {
            if not_found(&output) {
                return Ok(Vec::new());
            }
            return Err(self.failure("lsjson", &output));
        }
        let raw: Vec<LsEntry> = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::unreachable(&self.name, format!("unreadable lsjson output: {e}")))?;
        let mut names: Vec<String> = raw
            .into_iter()
            .map(|e| if e.name.is_empty() { e.path } else { e.name })
            .collect();
        names.sort();
        Ok(names)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let mut cmd = self.command();
        cmd.args(["lsjson", "--stat"]).arg(self.spec(path));
        let output = self.run(cmd)?;
        if output.status.success() {
            return Ok(true);
        }
        if not_found(&output) {
            return Ok(false);
        }
        Err(self.failure("lsjson --stat", &output))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("purge").arg(self.spec(path));
        let output = self.run(cmd)?;
        if output.status.success() || not_found(&output) {
            return Ok(());
        }
        Err(self.failure("purge", &output))
    }

    fn mirror(
        &self,
        direction: Direction,
        local: &Path,
        remote: &str,
        options: &ScanOptions,
        dry_run: bool,
    ) -> Result<ChangeSet> {
        let remote_entries = self.list(remote, options)?;
        let local_entries = tree::scan(local, options)?;
        let changes = match direction {
            Direction::Push => ChangeSet::between(&local_entries, &remote_entries),
            Direction::Pull => ChangeSet::between(&remote_entries, &local_entries),
        };
        if dry_run || changes.is_empty() {
            return Ok(changes);
        }
        if direction == Direction::Pull && !self.exists(remote)? {
            // rclone refuses a missing source, and a pull never writes remotely
            for rel in &changes.deleted {
                let path = local.join(rel.to_native());
                yard_fs::io::remove_file_if_exists(&path)?;
                super::local::prune_empty_parents(&path, local);
            }
            tracing::debug!(location = %self.name, remote, changes = %changes, "remote absent, emptied local side");
            return Ok(changes);
        }

        let local_arg = local.as_os_str().to_owned();
        let remote_arg = self.spec(remote);
        let mut cmd = self.command();
        cmd.arg("sync");
        match direction {
            Direction::Push => {
                yard_fs::io::ensure_dir(local)?;
                cmd.arg(&local_arg).arg(&remote_arg);
            }
            Direction::Pull => {
                yard_fs::io::ensure_dir(local)?;
                cmd.arg(&remote_arg).arg(&local_arg);
            }
        }
        cmd.args(exclude_args(&options.ignore));

        let output = self.run(cmd)?;
        if !output.status.success() {
            return Err(self.failure("sync", &output));
        }
        tracing::debug!(location = %self.name, %direction, changes = %changes, "mirror complete");
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageType;

    fn backend(store_path: &str) -> RcloneBackend {
        RcloneBackend::new(
            "cloud",
            &StorageLocationConfig {
                storage_type: StorageType::Rclone,
                store_path: store_path.into(),
                remote: Some("gdrive".into()),
                rclone_config: None,
            },
        )
    }

    #[test]
    fn spec_joins_remote_store_and_path() {
        assert_eq!(backend("yard/").spec("r/data"), "gdrive:yard/r/data");
        assert_eq!(backend("yard").spec(""), "gdrive:yard");
        assert_eq!(backend("").spec("/r"), "gdrive:r");
    }

    #[test]
    fn lsjson_is_parsed_and_filtered() {
        let json = br#"[
            {"Path":"src/main.rs","Name":"main.rs","Size":12,"MimeType":"text/plain",
             "ModTime":"2024-03-01T10:00:00.734+01:00","IsDir":false,
             "Hashes":{"sha256":"ABCD"}},
            {"Path":"node_modules/x/index.js","Name":"index.js","Size":1,
             "ModTime":"2024-03-01T10:00:00Z","IsDir":false},
            {"Path":"src","Name":"src","Size":-1,"ModTime":"2024-03-01T10:00:00Z","IsDir":true}
        ]"#;
        let ignore = IgnoreRules::new(&["node_modules/"]).unwrap();
        let entries = parse_lsjson(json, &ignore).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path.as_str(), "src/main.rs");
        assert_eq!(entries[0].size, 12);
        assert_eq!(entries[0].modified, 1_709_283_600);
        assert_eq!(entries[0].hash.as_deref(), Some("sha256:abcd"));
    }

    #[test]
    fn directory_patterns_become_recursive_excludes() {
        let ignore = IgnoreRules::new(&[".venv/", "*.pyc"]).unwrap();
        assert_eq!(
            exclude_args(&ignore),
            vec!["--exclude", ".venv/**", "--exclude", "*.pyc"]
        );
    }

    /// A stand-in `rclone` that logs its arguments and reports every path as
    /// missing.
    #[cfg(unix)]
    fn fake_rclone(dir: &Path) -> (PathBuf, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("calls.log");
        let script = dir.join("rclone");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" >> '{}'\ncase \"$1\" in lsjson) exit 3;; esac\nexit 0\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    #[cfg(unix)]
    #[test]
    fn pull_from_absent_remote_never_writes_remotely() {
        let dir = tempfile::tempdir().unwrap();
        let (program, log) = fake_rclone(dir.path());
        let local = dir.path().join("data");
        std::fs::create_dir_all(local.join("sub")).unwrap();
        std::fs::write(local.join("sub/a.txt"), "a").unwrap();

        let changes = backend("yard")
            .with_program(program)
            .mirror(Direction::Pull, &local, "r/data", &ScanOptions::default(), false)
            .unwrap();

        assert_eq!(changes.deleted.len(), 1);
        assert!(!local.join("sub/a.txt").exists());
        assert!(local.is_dir());
        let calls = std::fs::read_to_string(log).unwrap();
        assert!(calls.lines().all(|line| line.starts_with("lsjson")), "{calls}");
    }

    #[test]
    fn missing_executable_is_unreachable() {
        let backend = backend("yard").with_program("/nonexistent/rclone-binary");
        let err = backend.exists("x").unwrap_err();
        assert!(matches!(err, Error::StorageUnreachable { .. }));
    }
}
