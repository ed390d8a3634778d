//! Persistence gateway for repositories and commits.
//!
//! Write operations are generic over [`ConnectionTrait`] so they run the same
//! against a pooled connection or inside a transaction opened with
//! [`with_transaction`]. Reads that resolve a repository by name fail with
//! [`StoreError::NotFound`] when it is not tracked.

mod commits;
mod errors;
mod query;
mod repos;

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

pub use commits::{NewCommit, delete_commits_for, insert_commit};
pub use errors::{Result, StoreError};
pub use query::{
    AuthorCommitCount, CommitFilter, PaginatedResult, Pagination, count_commits, find_commits,
    paginate_commits, top_authors,
};
pub use repos::{
    NewRepository, UpsertOutcome, find_by_name, get_by_name, list_repositories,
    update_watermark, upsert_repository,
};

/// Run `f` in a transaction: committed when it returns `Ok`, rolled back
/// otherwise.
pub async fn with_transaction<F, T>(db: &DatabaseConnection, f: F) -> Result<T>
where
    F: for<'c> FnOnce(
            &'c DatabaseTransaction,
        ) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'c>>
        + Send,
    T: Send,
{
    Ok(db.transaction::<F, T, StoreError>(f).await?)
}

/// Outcome of [`reset_repository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOutcome {
    pub repository_id: Uuid,
    pub deleted_commits: u64,
    pub watermark: DateTime<Utc>,
}

/// Delete every commit of `name` and set its watermark to `since`, atomically.
pub async fn reset_repository(
    db: &DatabaseConnection,
    name: &str,
    since: DateTime<Utc>,
) -> Result<ResetOutcome> {
    let name = name.to_string();
    let outcome = with_transaction(db, move |txn| {
        Box::pin(async move {
            let repo = get_by_name(txn, &name).await?;
            let deleted_commits = delete_commits_for(txn, repo.id).await?;
            update_watermark(txn, repo.id, since).await?;
            Ok(ResetOutcome {
                repository_id: repo.id,
                deleted_commits,
                watermark: since,
            })
        })
    })
    .await?;

    tracing::info!(
        repository_id = %outcome.repository_id,
        deleted = outcome.deleted_commits,
        since = %since,
        "Reset repository collection"
    );
    Ok(outcome)
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn setup_db() -> DatabaseConnection {
        crate::connect_and_migrate("sqlite::memory:")
            .await
            .expect("in-memory database should migrate")
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn new_repo(name: &str, stars: i32) -> NewRepository {
        NewRepository {
            name: name.to_string(),
            description: Some("desc".to_string()),
            url: format!("https://github.com/{name}"),
            language: None,
            forks_count: 1,
            stars_count: stars,
            open_issues_count: 0,
            watchers_count: stars,
            created_at: ts(1),
            updated_at: ts(2),
        }
    }

    fn new_commit(repository_id: Uuid, sha: &str, author: &str, day: u32) -> NewCommit {
        NewCommit {
            sha: sha.to_string(),
            repository_id,
            message: format!("commit {sha}"),
            author_name: author.to_string(),
            author_email: format!("{author}@example.com"),
            author_date: ts(day),
            commit_url: format!("https://github.com/o/r/commit/{sha}"),
        }
    }

    #[tokio::test]
    async fn upsert_keeps_identity_and_updates_counters() {
        let db = setup_db().await;

        let first = upsert_repository(&db, new_repo("o/r", 10))
            .await
            .expect("insert should succeed");
        assert!(first.is_first_sync());

        update_watermark(&db, first.id, ts(5))
            .await
            .expect("watermark update should succeed");

        let second = upsert_repository(&db, new_repo("o/r", 99))
            .await
            .expect("update should succeed");
        assert_eq!(second.id, first.id);
        assert_eq!(second.previous_watermark, Some(ts(5)));

        let stored = get_by_name(&db, "o/r").await.expect("repo should exist");
        assert_eq!(stored.stars_count, 99);
        assert_eq!(stored.watermark(), Some(ts(5)));
        assert_eq!(list_repositories(&db).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn duplicate_commit_is_ignored() {
        let db = setup_db().await;
        let repo = upsert_repository(&db, new_repo("o/r", 1)).await.expect("repo");

        assert!(
            insert_commit(&db, new_commit(repo.id, "a", "alice", 3))
                .await
                .expect("first insert")
        );
        assert!(
            !insert_commit(&db, new_commit(repo.id, "a", "alice", 3))
                .await
                .expect("duplicate insert")
        );
        assert_eq!(count_commits(&db, "o/r").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn same_sha_in_two_repositories_is_two_rows() {
        let db = setup_db().await;
        let a = upsert_repository(&db, new_repo("o/a", 1)).await.expect("repo a");
        let b = upsert_repository(&db, new_repo("o/b", 1)).await.expect("repo b");

        assert!(insert_commit(&db, new_commit(a.id, "x", "alice", 3)).await.expect("a"));
        assert!(insert_commit(&db, new_commit(b.id, "x", "alice", 3)).await.expect("b"));
    }

    #[tokio::test]
    async fn find_commits_filters_inclusively_newest_first() {
        let db = setup_db().await;
        let repo = upsert_repository(&db, new_repo("o/r", 1)).await.expect("repo");
        for (sha, day) in [("a", 3), ("b", 5), ("c", 7), ("d", 9)] {
            insert_commit(&db, new_commit(repo.id, sha, "alice", day))
                .await
                .expect("insert");
        }

        let filter = CommitFilter {
            since: Some(ts(5)),
            until: Some(ts(7)),
        };
        let commits = find_commits(&db, "o/r", filter).await.expect("query");
        let shas: Vec<_> = commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, ["c", "b"]);

        let page = paginate_commits(&db, "o/r", CommitFilter::default(), Pagination::new(1, 3))
            .await
            .expect("page");
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].sha, "a");
    }

    #[tokio::test]
    async fn top_authors_orders_by_count() {
        let db = setup_db().await;
        let repo = upsert_repository(&db, new_repo("o/r", 1)).await.expect("repo");
        let mut n = 0;
        for (author, count) in [("carol", 1), ("alice", 5), ("bob", 3)] {
            for _ in 0..count {
                n += 1;
                insert_commit(&db, new_commit(repo.id, &format!("sha{n}"), author, 3))
                    .await
                    .expect("insert");
            }
        }

        let top = top_authors(&db, "o/r", 2).await.expect("top authors");
        assert_eq!(
            top,
            vec![
                AuthorCommitCount {
                    author_name: "alice".to_string(),
                    commit_count: 5
                },
                AuthorCommitCount {
                    author_name: "bob".to_string(),
                    commit_count: 3
                },
            ]
        );
    }

    #[tokio::test]
    async fn reads_for_unknown_repository_are_not_found() {
        let db = setup_db().await;

        let err = find_commits(&db, "ghost/repo", CommitFilter::default())
            .await
            .expect_err("unknown repo should fail");
        assert!(err.is_not_found());

        let err = top_authors(&db, "ghost/repo", 10)
            .await
            .expect_err("unknown repo should fail");
        assert!(err.is_not_found());

        let err = reset_repository(&db, "ghost/repo", ts(1))
            .await
            .expect_err("unknown repo should fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn reset_clears_commits_and_sets_watermark() {
        let db = setup_db().await;
        let repo = upsert_repository(&db, new_repo("o/r", 1)).await.expect("repo");
        for (sha, day) in [("a", 3), ("b", 5)] {
            insert_commit(&db, new_commit(repo.id, sha, "alice", day))
                .await
                .expect("insert");
        }
        update_watermark(&db, repo.id, ts(20)).await.expect("watermark");

        let outcome = reset_repository(&db, "o/r", ts(4)).await.expect("reset");
        assert_eq!(outcome.deleted_commits, 2);
        assert_eq!(outcome.repository_id, repo.id);

        assert_eq!(count_commits(&db, "o/r").await.expect("count"), 0);
        let stored = get_by_name(&db, "o/r").await.expect("repo");
        assert_eq!(stored.watermark(), Some(ts(4)));
    }

    #[tokio::test]
    async fn failed_transaction_rolls_back() {
        let db = setup_db().await;

        let err = with_transaction(&db, |txn| {
            Box::pin(async move {
                upsert_repository(txn, new_repo("o/r", 1)).await?;
                Err::<(), _>(StoreError::invalid_input("abort"))
            })
        })
        .await
        .expect_err("closure error should propagate");
        assert!(matches!(err, StoreError::InvalidInput { .. }));

        assert!(find_by_name(&db, "o/r").await.expect("lookup").is_none());
    }
}
