//! Integration tests for the sync service against a scripted remote host.
//!
//! Key scenarios tested:
//! - Re-syncing the same commits is idempotent
//! - A failure mid-persistence leaves no trace of the sync
//! - Fetch failures are tagged with their stage and persist nothing
//! - Reset followed by a re-sync fetches from the reset point
//! - The watermark never moves backwards
//! - A worker keeps retrying a repository whose first sync failed
//! - Syncs and resets of one repository never interleave

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use repowatch::connect_and_migrate;
use repowatch::platform::{
    self, PlatformClient, PlatformError, PlatformErrorKind, RemoteCommit, RepoRef,
    RepositoryMetadata,
};
use repowatch::store::{self, CommitFilter};
use repowatch::sync::{PollWorker, RepositorySyncer, SyncService, SyncStage, WorkerState};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Maximum time any sync should take in tests; exceeding it means a hang.
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Script {
    commits: Vec<RemoteCommit>,
    fail_metadata: bool,
    fail_commits: bool,
    seen_since: Vec<Option<DateTime<Utc>>>,
}

/// Remote host double: serves a fixed commit list, filtered by `since`.
///
/// When gated, the next commit fetch signals `entered` and then blocks until
/// `release` is notified.
#[derive(Default)]
struct ScriptedPlatform {
    script: Mutex<Script>,
    gate: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl ScriptedPlatform {
    fn with_commits(commits: Vec<RemoteCommit>) -> Self {
        let platform = Self::default();
        platform.set_commits(commits);
        platform
    }

    fn set_commits(&self, commits: Vec<RemoteCommit>) {
        self.script.lock().unwrap().commits = commits;
    }

    fn fail_metadata(&self, fail: bool) {
        self.script.lock().unwrap().fail_metadata = fail;
    }

    fn fail_commits(&self, fail: bool) {
        self.script.lock().unwrap().fail_commits = fail;
    }

    fn seen_since(&self) -> Vec<Option<DateTime<Utc>>> {
        self.script.lock().unwrap().seen_since.clone()
    }

    fn gate_next_fetch(&self) {
        self.gate.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlatformClient for ScriptedPlatform {
    async fn get_repository_metadata(
        &self,
        owner: &str,
        name: &str,
    ) -> platform::Result<RepositoryMetadata> {
        if self.script.lock().unwrap().fail_metadata {
            return Err(PlatformError::not_found(format!("{owner}/{name}")));
        }
        Ok(RepositoryMetadata {
            full_name: format!("{owner}/{name}"),
            description: Some("scripted".to_string()),
            html_url: format!("https://github.com/{owner}/{name}"),
            language: Some("Rust".to_string()),
            forks: 1,
            stars: 2,
            open_issues: 3,
            watchers: 2,
            created_at: day(1),
            updated_at: day(2),
        })
    }

    async fn list_commits_since(
        &self,
        _owner: &str,
        _name: &str,
        since: Option<DateTime<Utc>>,
        _page: Option<u32>,
    ) -> platform::Result<Vec<RemoteCommit>> {
        if self.gate.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        let mut script = self.script.lock().unwrap();
        script.seen_since.push(since);
        if script.fail_commits {
            return Err(PlatformError::status(
                "https://api.github.com/repos/o/r/commits",
                502,
                "bad gateway",
            ));
        }
        Ok(script
            .commits
            .iter()
            .filter(|c| since.is_none_or(|s| c.authored_at >= s))
            .cloned()
            .collect())
    }
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
}

fn commit(sha: &str, author: &str, d: u32) -> RemoteCommit {
    RemoteCommit {
        sha: sha.to_string(),
        message: format!("commit {sha}"),
        author_name: author.to_string(),
        author_email: format!("{author}@example.com"),
        authored_at: day(d),
        html_url: format!("https://github.com/o/r/commit/{sha}"),
    }
}

fn five_commits() -> Vec<RemoteCommit> {
    (1..=5)
        .map(|i| commit(&format!("sha-{i}"), "alice", i + 2))
        .collect()
}

fn repo() -> RepoRef {
    RepoRef::new("o", "r").unwrap()
}

async fn setup_test_db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

async fn service(platform: Arc<ScriptedPlatform>) -> SyncService<ScriptedPlatform> {
    SyncService::new(platform, setup_test_db().await)
}

async fn commit_count(service: &SyncService<ScriptedPlatform>) -> usize {
    service
        .find_commits(&repo(), CommitFilter::default())
        .await
        .expect("commit query should succeed")
        .len()
}

#[tokio::test]
async fn first_sync_persists_metadata_commits_and_watermark() {
    let platform = Arc::new(ScriptedPlatform::with_commits(five_commits()));
    let service = service(Arc::clone(&platform)).await;

    let before = Utc::now();
    let report = tokio::time::timeout(SYNC_TIMEOUT, service.sync_repository("o", "r", None))
        .await
        .expect("sync timed out")
        .expect("sync should succeed");

    assert!(report.first_sync);
    assert_eq!(report.fetched, 5);
    assert_eq!(report.inserted, 5);
    assert!(report.watermark >= before);

    let stored = service.get_repository(&repo()).await.expect("repo stored");
    assert_eq!(stored.name, "o/r");
    assert_eq!(stored.language.as_deref(), Some("Rust"));
    assert_eq!(stored.watermark(), Some(report.watermark));
    assert_eq!(platform.seen_since(), vec![None]);
}

#[tokio::test]
async fn resync_of_same_commits_is_idempotent() {
    let platform = Arc::new(ScriptedPlatform::with_commits(five_commits()));
    let service = service(Arc::clone(&platform)).await;

    let first = service.sync_repository("o", "r", None).await.expect("first sync");
    let second = service.sync_repository("o", "r", None).await.expect("second sync");

    assert_eq!(second.repository_id, first.repository_id);
    assert!(!second.first_sync);
    assert_eq!(second.fetched, 5);
    assert_eq!(second.inserted, 0);
    assert_eq!(commit_count(&service).await, 5);
    assert_eq!(service.list_repositories().await.expect("list").len(), 1);
}

#[tokio::test]
async fn failure_mid_persistence_rolls_back_everything() {
    let platform = Arc::new(ScriptedPlatform::with_commits(Vec::new()));
    let service = service(Arc::clone(&platform)).await;

    let baseline = service
        .sync_repository("o", "r", None)
        .await
        .expect("empty sync should succeed");

    service
        .db()
        .execute_unprepared(
            "CREATE TRIGGER reject_third_commit BEFORE INSERT ON commits \
             WHEN NEW.sha = 'sha-3' BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
        )
        .await
        .expect("trigger should install");

    platform.set_commits(five_commits());
    let err = service
        .sync_repository("o", "r", None)
        .await
        .expect_err("third insert should abort the sync");

    assert_eq!(err.stage(), SyncStage::Persistence);
    assert_eq!(err.repo(), "o/r");
    assert_eq!(commit_count(&service).await, 0);
    let stored = service.get_repository(&repo()).await.expect("repo stored");
    assert_eq!(stored.watermark(), Some(baseline.watermark));
}

#[tokio::test]
async fn failed_first_sync_leaves_no_repository() {
    let platform = Arc::new(ScriptedPlatform::with_commits(five_commits()));
    let service = service(Arc::clone(&platform)).await;
    service
        .db()
        .execute_unprepared(
            "CREATE TRIGGER reject_third_commit BEFORE INSERT ON commits \
             WHEN NEW.sha = 'sha-3' BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
        )
        .await
        .expect("trigger should install");

    service
        .sync_repository("o", "r", None)
        .await
        .expect_err("sync should fail");

    let err = service
        .get_repository(&repo())
        .await
        .expect_err("repository should not exist");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn fetch_failures_are_tagged_and_persist_nothing() {
    let platform = Arc::new(ScriptedPlatform::with_commits(five_commits()));
    let service = service(Arc::clone(&platform)).await;

    platform.fail_metadata(true);
    let err = service
        .sync_repository("o", "r", None)
        .await
        .expect_err("metadata failure");
    assert_eq!(err.stage(), SyncStage::MetadataFetch);
    assert_eq!(
        err.upstream().map(PlatformError::kind),
        Some(PlatformErrorKind::NotFound)
    );
    // Commits are never requested once metadata fails.
    assert!(platform.seen_since().is_empty());

    platform.fail_metadata(false);
    platform.fail_commits(true);
    let err = service
        .sync_repository("o", "r", None)
        .await
        .expect_err("commit failure");
    assert_eq!(err.stage(), SyncStage::CommitFetch);
    assert_eq!(
        err.upstream().map(PlatformError::kind),
        Some(PlatformErrorKind::TransientUpstream)
    );

    assert!(service.list_repositories().await.expect("list").is_empty());
}

#[tokio::test]
async fn reset_then_resync_fetches_from_reset_point() {
    let platform = Arc::new(ScriptedPlatform::with_commits(vec![
        commit("old", "alice", 3),
        commit("mid", "bob", 6),
        commit("new", "carol", 9),
    ]));
    let service = service(Arc::clone(&platform)).await;
    service.sync_repository("o", "r", None).await.expect("initial sync");
    assert_eq!(commit_count(&service).await, 3);

    let reset_point = day(5);
    let outcome = service
        .reset_repository(&repo(), reset_point)
        .await
        .expect("reset should succeed");
    assert_eq!(outcome.deleted_commits, 3);
    assert_eq!(commit_count(&service).await, 0);
    assert_eq!(
        service.stored_watermark(&repo()).await.expect("watermark"),
        Some(reset_point)
    );

    let since = service.stored_watermark(&repo()).await.expect("watermark");
    let report = service
        .sync_repository("o", "r", since)
        .await
        .expect("resync should succeed");

    assert_eq!(platform.seen_since().last(), Some(&Some(reset_point)));
    assert_eq!(report.inserted, 2);
    let shas: Vec<_> = service
        .find_commits(&repo(), CommitFilter::default())
        .await
        .expect("query")
        .into_iter()
        .map(|c| c.sha)
        .collect();
    assert_eq!(shas, ["new", "mid"]);
}

#[tokio::test]
async fn watermark_never_moves_backwards() {
    let platform = Arc::new(ScriptedPlatform::with_commits(Vec::new()));
    let service = service(Arc::clone(&platform)).await;
    service.sync_repository("o", "r", None).await.expect("initial sync");

    let future = Utc::now() + chrono::Duration::days(1);
    let future = Utc.timestamp_opt(future.timestamp(), 0).unwrap();
    service
        .reset_repository(&repo(), future)
        .await
        .expect("reset should succeed");

    let report = service
        .sync_repository("o", "r", Some(future))
        .await
        .expect("sync should succeed");
    assert_eq!(report.watermark, future);
    assert_eq!(
        service.stored_watermark(&repo()).await.expect("watermark"),
        Some(future)
    );
}

#[tokio::test]
async fn top_authors_ranks_by_commit_count() {
    let mut commits = Vec::new();
    for (author, count) in [("alice", 5), ("bob", 3), ("carol", 1)] {
        for i in 0..count {
            commits.push(commit(&format!("{author}-{i}"), author, 3 + i));
        }
    }
    let platform = Arc::new(ScriptedPlatform::with_commits(commits));
    let service = service(Arc::clone(&platform)).await;
    service.sync_repository("o", "r", None).await.expect("sync");

    let top = service.top_authors(&repo(), 2).await.expect("top authors");
    let ranked: Vec<_> = top
        .iter()
        .map(|a| (a.author_name.as_str(), a.commit_count))
        .collect();
    assert_eq!(ranked, [("alice", 5), ("bob", 3)]);
}

#[tokio::test]
async fn queries_on_untracked_repository_are_not_found() {
    let platform = Arc::new(ScriptedPlatform::default());
    let service = service(platform).await;

    let missing = RepoRef::new("ghost", "repo").unwrap();
    assert!(service.get_repository(&missing).await.unwrap_err().is_not_found());
    assert!(service.stored_watermark(&missing).await.unwrap_err().is_not_found());
    assert!(
        service
            .top_authors(&missing, 10)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(store::get_by_name(service.db(), "ghost/repo").await.is_err());
}

#[tokio::test]
async fn worker_retries_repository_whose_first_sync_failed() {
    let platform = Arc::new(ScriptedPlatform::with_commits(five_commits()));
    let service = Arc::new(service(Arc::clone(&platform)).await);
    platform.fail_metadata(true);

    let shutdown = CancellationToken::new();
    let worker = PollWorker::new(repo(), Duration::from_millis(50));
    let mut state = worker.subscribe();
    let handle = tokio::spawn(worker.run(Arc::clone(&service), shutdown.clone()));

    tokio::time::timeout(SYNC_TIMEOUT, state.wait_for(|s| *s == WorkerState::Waiting))
        .await
        .expect("initial sync timed out")
        .expect("worker should reach waiting");
    assert!(service.get_repository(&repo()).await.unwrap_err().is_not_found());

    platform.fail_metadata(false);
    tokio::time::timeout(SYNC_TIMEOUT, async {
        while service.get_repository(&repo()).await.is_err() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("worker never synced the repository");

    shutdown.cancel();
    handle.await.expect("worker should not panic");

    assert_eq!(platform.seen_since().first(), Some(&None));
    assert_eq!(commit_count(&service).await, 5);
}

#[tokio::test]
async fn tick_for_untracked_repository_fetches_full_history() {
    let platform = Arc::new(ScriptedPlatform::with_commits(five_commits()));
    let service = service(Arc::clone(&platform)).await;

    assert_eq!(
        RepositorySyncer::stored_watermark(&service, &repo())
            .await
            .expect("missing row is not an error"),
        None
    );
    let report = RepositorySyncer::sync_from_watermark(&service, &repo())
        .await
        .expect("sync should succeed");

    assert!(report.first_sync);
    assert_eq!(report.inserted, 5);
    assert_eq!(platform.seen_since(), vec![None]);
}

#[tokio::test]
async fn reset_waits_for_in_flight_tick() {
    let platform = Arc::new(ScriptedPlatform::with_commits(vec![
        commit("old", "alice", 3),
        commit("mid", "bob", 6),
        commit("new", "carol", 9),
    ]));
    let service = Arc::new(service(Arc::clone(&platform)).await);
    service.sync_repository("o", "r", None).await.expect("seed sync");
    service
        .reset_repository(&repo(), day(1))
        .await
        .expect("rewind watermark");

    platform.gate_next_fetch();
    let tick = tokio::spawn({
        let service = Arc::clone(&service);
        async move { RepositorySyncer::sync_from_watermark(&*service, &repo()).await }
    });
    tokio::time::timeout(SYNC_TIMEOUT, platform.entered.notified())
        .await
        .expect("tick never reached the commit fetch");

    let reset_point = day(5);
    let reset = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.reset_repository(&repo(), reset_point).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!reset.is_finished(), "reset ran while a sync was in flight");

    platform.release.notify_one();
    let report = tokio::time::timeout(SYNC_TIMEOUT, tick)
        .await
        .expect("tick timed out")
        .expect("tick should not panic")
        .expect("tick should succeed");
    let outcome = tokio::time::timeout(SYNC_TIMEOUT, reset)
        .await
        .expect("reset timed out")
        .expect("reset should not panic")
        .expect("reset should succeed");

    assert_eq!(platform.seen_since().last(), Some(&Some(day(1))));
    assert_eq!(report.inserted, 3);
    assert_eq!(outcome.deleted_commits, 3);
    assert_eq!(commit_count(&service).await, 0);
    assert_eq!(
        service.stored_watermark(&repo()).await.expect("watermark"),
        Some(reset_point)
    );
}

#[tokio::test]
async fn reset_and_resync_keeps_only_commits_from_reset_point() {
    let platform = Arc::new(ScriptedPlatform::with_commits(vec![
        commit("old", "alice", 3),
        commit("mid", "bob", 6),
        commit("new", "carol", 9),
    ]));
    let service = service(Arc::clone(&platform)).await;
    service.sync_repository("o", "r", None).await.expect("seed sync");

    let (outcome, report) = service
        .reset_and_resync(&repo(), day(5))
        .await
        .expect("reset and resync");

    assert_eq!(outcome.deleted_commits, 3);
    assert_eq!(report.inserted, 2);
    assert!(report.watermark > day(5));
    assert_eq!(platform.seen_since(), vec![None, Some(day(5))]);

    let err = service
        .reset_and_resync(&RepoRef::new("ghost", "repo").unwrap(), day(5))
        .await
        .expect_err("unknown repository");
    assert_eq!(err.stage(), SyncStage::Persistence);
}

#[tokio::test]
async fn concurrent_adds_sync_once() {
    let platform = Arc::new(ScriptedPlatform::with_commits(five_commits()));
    let service = Arc::new(service(Arc::clone(&platform)).await);

    platform.gate_next_fetch();
    let first = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.sync_new_repository(&repo()).await }
    });
    tokio::time::timeout(SYNC_TIMEOUT, platform.entered.notified())
        .await
        .expect("first add never reached the commit fetch");
    let second = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.sync_new_repository(&repo()).await }
    });
    platform.release.notify_one();

    let first = first.await.expect("no panic").expect("first add");
    let second = second.await.expect("no panic").expect("second add");

    assert_eq!(first.map(|r| r.inserted), Some(5));
    assert!(second.is_none());
    assert_eq!(platform.seen_since(), vec![None]);
}
