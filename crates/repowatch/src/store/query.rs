use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, QueryTrait, Select,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::commit::{Column, Entity as Commit, Model};

use super::errors::{Result, StoreError};
use super::repos::get_by_name;

/// Inclusive author-date bounds for commit queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (0-indexed).
    pub page: u64,
    /// Items per page.
    pub per_page: u64,
}

const MIN_PER_PAGE: u64 = 1;

impl Pagination {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page,
            per_page: per_page.max(MIN_PER_PAGE),
        }
    }
}

/// Result of a paginated query.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: u64,
    /// Current page number (0-indexed).
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Commit count for one author.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct AuthorCommitCount {
    pub author_name: String,
    pub commit_count: i64,
}

fn filtered(repository_id: Uuid, filter: CommitFilter) -> Select<Commit> {
    Commit::find()
        .filter(Column::RepositoryId.eq(repository_id))
        .apply_if(filter.since, |q, since| {
            q.filter(Column::AuthorDate.gte(since.fixed_offset()))
        })
        .apply_if(filter.until, |q, until| {
            q.filter(Column::AuthorDate.lte(until.fixed_offset()))
        })
        .order_by_desc(Column::AuthorDate)
        .order_by_asc(Column::Sha)
}

/// Commits of `name` within `filter`, newest first.
pub async fn find_commits(
    db: &DatabaseConnection,
    name: &str,
    filter: CommitFilter,
) -> Result<Vec<Model>> {
    let repo = get_by_name(db, name).await?;
    Ok(filtered(repo.id, filter).all(db).await?)
}

/// One page of [`find_commits`].
pub async fn paginate_commits(
    db: &DatabaseConnection,
    name: &str,
    filter: CommitFilter,
    pagination: Pagination,
) -> Result<PaginatedResult<Model>> {
    let repo = get_by_name(db, name).await?;
    let paginator = filtered(repo.id, filter).paginate(db, pagination.per_page);

    let total = paginator.num_items().await?;
    let total_pages = paginator.num_pages().await?;
    let items = paginator.fetch_page(pagination.page).await?;

    Ok(PaginatedResult {
        items,
        total,
        page: pagination.page,
        per_page: pagination.per_page,
        total_pages,
    })
}

/// Number of stored commits for `name`.
pub async fn count_commits(db: &DatabaseConnection, name: &str) -> Result<u64> {
    let repo = get_by_name(db, name).await?;
    Ok(Commit::find()
        .filter(Column::RepositoryId.eq(repo.id))
        .count(db)
        .await?)
}

/// The `limit` most prolific authors of `name`, by descending commit count.
///
/// Ties are broken by author name so the ordering is stable.
pub async fn top_authors(
    db: &DatabaseConnection,
    name: &str,
    limit: u64,
) -> Result<Vec<AuthorCommitCount>> {
    if limit == 0 {
        return Err(StoreError::invalid_input("limit must be at least 1"));
    }
    let repo = get_by_name(db, name).await?;

    Ok(Commit::find()
        .select_only()
        .column(Column::AuthorName)
        .column_as(Expr::col(Column::Id).count(), "commit_count")
        .filter(Column::RepositoryId.eq(repo.id))
        .group_by(Column::AuthorName)
        .order_by_desc(Expr::cust("commit_count"))
        .order_by_asc(Column::AuthorName)
        .limit(limit)
        .into_model::<AuthorCommitCount>()
        .all(db)
        .await?)
}
