//! Shared fixtures for the binary's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use repowatch::platform::{self, PlatformClient, PlatformError, RemoteCommit, RepositoryMetadata};
use repowatch::sync::SyncService;

pub(crate) fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()
}

pub(crate) fn commit(sha: &str, author: &str, day: u32) -> RemoteCommit {
    RemoteCommit {
        sha: sha.to_string(),
        message: format!("commit {sha}"),
        author_name: author.to_string(),
        author_email: format!("{author}@example.com"),
        authored_at: ts(day),
        html_url: format!("https://github.com/o/r/commit/{sha}"),
    }
}

/// In-process remote host serving the same commits for every repository.
#[derive(Default)]
pub(crate) struct FakePlatform {
    pub(crate) commits: Vec<RemoteCommit>,
    /// Repositories answered with 404.
    pub(crate) missing: Vec<String>,
    /// Answer every request with a 502.
    pub(crate) unavailable: bool,
    pub(crate) commit_requests: AtomicUsize,
    pub(crate) seen_since: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl FakePlatform {
    pub(crate) fn with_commits(commits: Vec<RemoteCommit>) -> Self {
        Self {
            commits,
            ..Self::default()
        }
    }

    pub(crate) fn seen_since(&self) -> Vec<Option<DateTime<Utc>>> {
        self.seen_since.lock().unwrap().clone()
    }

    fn check(&self, owner: &str, name: &str) -> platform::Result<()> {
        let full_name = format!("{owner}/{name}");
        if self.unavailable {
            return Err(PlatformError::status(
                format!("https://api.github.test/repos/{full_name}"),
                502,
                "bad gateway",
            ));
        }
        if self.missing.contains(&full_name) {
            return Err(PlatformError::not_found(full_name));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn get_repository_metadata(
        &self,
        owner: &str,
        name: &str,
    ) -> platform::Result<RepositoryMetadata> {
        self.check(owner, name)?;
        Ok(RepositoryMetadata {
            full_name: format!("{owner}/{name}"),
            description: Some("fake".to_string()),
            html_url: format!("https://github.com/{owner}/{name}"),
            language: Some("Rust".to_string()),
            forks: 3,
            stars: 42,
            open_issues: 1,
            watchers: 42,
            created_at: ts(1),
            updated_at: ts(2),
        })
    }

    async fn list_commits_since(
        &self,
        owner: &str,
        name: &str,
        since: Option<DateTime<Utc>>,
        _page: Option<u32>,
    ) -> platform::Result<Vec<RemoteCommit>> {
        self.check(owner, name)?;
        self.commit_requests.fetch_add(1, Ordering::SeqCst);
        self.seen_since.lock().unwrap().push(since);
        Ok(self
            .commits
            .iter()
            .filter(|c| since.is_none_or(|s| c.authored_at >= s))
            .cloned()
            .collect())
    }
}

/// A [`SyncService`] over `platform` and a fresh in-memory database.
pub(crate) async fn service_with(platform: FakePlatform) -> Arc<SyncService> {
    let platform: Arc<dyn PlatformClient> = Arc::new(platform);
    service_over(platform).await
}

pub(crate) async fn service_over(platform: Arc<dyn PlatformClient>) -> Arc<SyncService> {
    let db = repowatch::connect_and_migrate("sqlite::memory:")
        .await
        .expect("in-memory database should migrate");
    Arc::new(SyncService::new(platform, db))
}
