use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::DatabaseConnection;
use tokio::sync::OwnedMutexGuard;

use crate::entity::commit::Model as CommitModel;
use crate::entity::repository::Model as RepositoryModel;
use crate::platform::{PlatformClient, RepoRef};
use crate::store::{
    self, AuthorCommitCount, CommitFilter, NewCommit, NewRepository, PaginatedResult, Pagination,
    ResetOutcome, StoreError,
};

use super::types::{SyncError, SyncReport};

/// One async lock per repository full name.
#[derive(Default)]
struct RepositoryLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RepositoryLocks {
    async fn acquire(&self, full_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(full_name.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Fetches repositories from the remote host and persists them atomically.
///
/// Syncs and resets of the same repository are serialized across every clone
/// of a service; different repositories run concurrently. The serialization
/// is per process.
pub struct SyncService<C: ?Sized = dyn PlatformClient> {
    client: Arc<C>,
    db: DatabaseConnection,
    locks: Arc<RepositoryLocks>,
}

impl<C: ?Sized> Clone for SyncService<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            db: self.db.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<C: PlatformClient + ?Sized> SyncService<C> {
    pub fn new(client: Arc<C>, db: DatabaseConnection) -> Self {
        Self {
            client,
            db,
            locks: Arc::default(),
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Fetch metadata and commits for `owner/name`, then persist both in one
    /// transaction.
    ///
    /// `since` bounds the commit fetch; `None` fetches the full history. The
    /// stored watermark never moves backwards.
    pub async fn sync_repository(
        &self,
        owner: &str,
        name: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncReport, SyncError> {
        let full_name = format!("{owner}/{name}");
        let _guard = self.locks.acquire(&full_name).await;
        self.sync_locked(owner, name, full_name, since).await
    }

    /// Incremental sync from the stored watermark, read under the same lock
    /// as the sync itself. A repository with no stored row gets a
    /// full-history sync.
    pub async fn sync_from_watermark(&self, repo: &RepoRef) -> Result<SyncReport, SyncError> {
        let full_name = repo.full_name();
        let _guard = self.locks.acquire(&full_name).await;
        let since = match self.stored_watermark(repo).await {
            Ok(since) => since,
            Err(e) if e.is_not_found() => None,
            Err(source) => {
                return Err(SyncError::Persistence {
                    repo: full_name,
                    source,
                });
            }
        };
        self.sync_locked(&repo.owner, &repo.name, full_name, since).await
    }

    /// Full-history sync of a repository that is not stored yet.
    ///
    /// Returns `Ok(None)` without fetching when the repository already exists.
    /// The existence check and the sync hold the repository lock together, so
    /// of two concurrent calls exactly one syncs.
    pub async fn sync_new_repository(
        &self,
        repo: &RepoRef,
    ) -> Result<Option<SyncReport>, SyncError> {
        let full_name = repo.full_name();
        let _guard = self.locks.acquire(&full_name).await;
        let existing = store::find_by_name(&self.db, &full_name)
            .await
            .map_err(|source| SyncError::Persistence {
                repo: full_name.clone(),
                source,
            })?;
        if existing.is_some() {
            return Ok(None);
        }
        self.sync_locked(&repo.owner, &repo.name, full_name, None)
            .await
            .map(Some)
    }

    async fn sync_locked(
        &self,
        owner: &str,
        name: &str,
        full_name: String,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncReport, SyncError> {
        tracing::info!(repo = %full_name, since = ?since, "Syncing repository");

        let metadata = self
            .client
            .get_repository_metadata(owner, name)
            .await
            .map_err(|source| SyncError::Metadata {
                repo: full_name.clone(),
                source,
            })?;

        let commits = self
            .client
            .list_commits_since(owner, name, since, None)
            .await
            .map_err(|source| SyncError::Commits {
                repo: full_name.clone(),
                source,
            })?;
        let fetched = commits.len();

        let new_repo = NewRepository::from_metadata(&full_name, &metadata);
        // Microseconds are the finest precision every backend stores.
        let now = Utc::now().trunc_subsecs(6);
        let (upsert, inserted, watermark) = store::with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let upsert = store::upsert_repository(txn, new_repo).await?;

                let mut inserted = 0;
                for commit in &commits {
                    if store::insert_commit(txn, NewCommit::from_remote(upsert.id, commit)).await? {
                        inserted += 1;
                    }
                }

                let watermark = upsert.previous_watermark.map_or(now, |prev| prev.max(now));
                store::update_watermark(txn, upsert.id, watermark).await?;
                Ok((upsert, inserted, watermark))
            })
        })
        .await
        .map_err(|source| SyncError::Persistence {
            repo: full_name.clone(),
            source,
        })?;

        tracing::info!(
            repo = %full_name,
            fetched,
            inserted,
            first_sync = upsert.is_first_sync(),
            "Repository synced"
        );

        Ok(SyncReport {
            repository_id: upsert.id,
            full_name,
            fetched,
            inserted,
            first_sync: upsert.is_first_sync(),
            watermark,
        })
    }

    /// Watermark stored for `owner/name`; `Ok(None)` before the first
    /// successful sync completed, `NotFound` when no row exists.
    pub async fn stored_watermark(&self, repo: &RepoRef) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(store::get_by_name(&self.db, &repo.full_name())
            .await?
            .watermark())
    }

    /// Delete all commits of `owner/name` and move its watermark to `since`.
    ///
    /// Does not fetch; see [`reset_and_resync`](Self::reset_and_resync).
    pub async fn reset_repository(
        &self,
        repo: &RepoRef,
        since: DateTime<Utc>,
    ) -> Result<ResetOutcome, StoreError> {
        let full_name = repo.full_name();
        let _guard = self.locks.acquire(&full_name).await;
        store::reset_repository(&self.db, &full_name, since).await
    }

    /// Reset to `since`, then sync from `since`, with no other sync of the
    /// repository in between.
    pub async fn reset_and_resync(
        &self,
        repo: &RepoRef,
        since: DateTime<Utc>,
    ) -> Result<(ResetOutcome, SyncReport), SyncError> {
        let full_name = repo.full_name();
        let _guard = self.locks.acquire(&full_name).await;
        let outcome = store::reset_repository(&self.db, &full_name, since)
            .await
            .map_err(|source| SyncError::Persistence {
                repo: full_name.clone(),
                source,
            })?;
        let report = self
            .sync_locked(&repo.owner, &repo.name, full_name, Some(since))
            .await?;
        Ok((outcome, report))
    }

    pub async fn get_repository(&self, repo: &RepoRef) -> Result<RepositoryModel, StoreError> {
        store::get_by_name(&self.db, &repo.full_name()).await
    }

    pub async fn list_repositories(&self) -> Result<Vec<RepositoryModel>, StoreError> {
        store::list_repositories(&self.db).await
    }

    pub async fn find_commits(
        &self,
        repo: &RepoRef,
        filter: CommitFilter,
    ) -> Result<Vec<CommitModel>, StoreError> {
        store::find_commits(&self.db, &repo.full_name(), filter).await
    }

    pub async fn paginate_commits(
        &self,
        repo: &RepoRef,
        filter: CommitFilter,
        pagination: Pagination,
    ) -> Result<PaginatedResult<CommitModel>, StoreError> {
        store::paginate_commits(&self.db, &repo.full_name(), filter, pagination).await
    }

    pub async fn top_authors(
        &self,
        repo: &RepoRef,
        limit: u64,
    ) -> Result<Vec<AuthorCommitCount>, StoreError> {
        store::top_authors(&self.db, &repo.full_name(), limit).await
    }
}
