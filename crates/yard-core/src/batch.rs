//! Bounded parallel execution over many repos
//!
//! Each repo runs on the blocking pool, at most `max_concurrency` at a time.
//! A failing repo never cancels the others, and every task is joined before
//! the results are returned.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::model::{RepoPart, RepoRecord};
use crate::sync::{SyncEngine, SyncReport};
use crate::{Error, Result};

/// Result of one repo in a batch.
#[derive(Debug)]
pub struct RepoResult<T> {
    pub repo: String,
    pub result: Result<T>,
}

/// Results of a batch, sorted by repo.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub results: Vec<RepoResult<T>>,
}

impl<T> BatchReport<T> {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RepoResult<T>> {
        self.results.iter().filter(|r| r.result.is_err())
    }
}

impl BatchReport<SyncReport> {
    /// Whether every repo synced and no part conflicted or failed.
    pub fn all_synced(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(&r.result, Ok(report) if report.is_success()))
    }
}

/// Run `op` for every record with bounded parallelism.
pub async fn for_each_repo<T, F>(
    records: Vec<RepoRecord>,
    max_concurrency: usize,
    op: F,
) -> BatchReport<T>
where
    T: Send + 'static,
    F: Fn(&RepoRecord) -> Result<T> + Send + Sync + 'static,
{
    let op = Arc::new(op);
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for record in records {
        let op = Arc::clone(&op);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let repo = record.index_name();
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return RepoResult {
                        result: Err(Error::TaskFailed {
                            repo: repo.clone(),
                            message: e.to_string(),
                        }),
                        repo,
                    };
                }
            };
            let task_repo = repo.clone();
            let result = tokio::task::spawn_blocking(move || (*op)(&record))
                .await
                .unwrap_or_else(|e| {
                    Err(Error::TaskFailed {
                        repo: task_repo,
                        message: e.to_string(),
                    })
                });
            RepoResult { repo, result }
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!(error = %e, "batch task did not complete"),
        }
    }
    results.sort_by(|a, b| a.repo.cmp(&b.repo));
    BatchReport { results }
}

/// Sync `parts` of every record in parallel.
pub async fn sync_all(
    engine: SyncEngine,
    records: Vec<RepoRecord>,
    parts: Vec<RepoPart>,
) -> BatchReport<SyncReport> {
    let max = engine.config().sync.max_concurrency;
    for_each_repo(records, max, move |record| engine.sync(record, &parts)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepoId;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn records(n: usize) -> Vec<RepoRecord> {
        (0..n)
            .map(|i| RepoRecord {
                id: RepoId::generate(),
                name: format!("repo{i}"),
                storage_location: "local".into(),
                creator_host: "h".into(),
                groups: BTreeSet::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn one_failure_does_not_cancel_others() {
        let report = for_each_repo(records(5), 2, |record| {
            if record.name == "repo2" {
                Err(Error::RepoNotFound {
                    query: record.name.clone(),
                })
            } else {
                Ok(record.name.clone())
            }
        })
        .await;

        assert_eq!(report.results.len(), 5);
        assert_eq!(report.failures().count(), 1);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

        let report = for_each_repo(records(8), 3, move |_| {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            r.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(report.is_success());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn panicking_task_is_reported() {
        let report = for_each_repo(records(2), 2, |record| {
            if record.name == "repo0" {
                panic!("boom");
            }
            Ok(())
        })
        .await;
        assert_eq!(report.results.len(), 2);
        assert!(matches!(
            report.results.iter().find(|r| r.repo.ends_with("repo0")).unwrap().result,
            Err(Error::TaskFailed { .. })
        ));
    }
}
