use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::repository::{ActiveModel, Column, Entity as Repository, Model};
use crate::platform::RepositoryMetadata;

use super::errors::{Result, StoreError};

/// Descriptive fields written on every upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRepository {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub language: Option<String>,
    pub forks_count: i32,
    pub stars_count: i32,
    pub open_issues_count: i32,
    pub watchers_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewRepository {
    /// Build the row for `name` from upstream metadata.
    ///
    /// The stored key is the caller's `owner/name`, not the upstream
    /// `full_name`, so later lookups by the same key always hit.
    pub fn from_metadata(name: impl Into<String>, meta: &RepositoryMetadata) -> Self {
        Self {
            name: name.into(),
            description: meta.description.clone(),
            url: meta.html_url.clone(),
            language: meta.language.clone(),
            forks_count: meta.forks,
            stars_count: meta.stars,
            open_issues_count: meta.open_issues,
            watchers_count: meta.watchers,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        }
    }
}

/// Identity of an upserted repository and its watermark before the upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: Uuid,
    pub previous_watermark: Option<DateTime<Utc>>,
}

impl UpsertOutcome {
    pub fn is_first_sync(&self) -> bool {
        self.previous_watermark.is_none()
    }
}

/// Insert or update a repository by name.
///
/// On conflict only descriptive fields and counters change; `id`,
/// `created_at` and the watermark are left alone.
pub async fn upsert_repository<C>(conn: &C, repo: NewRepository) -> Result<UpsertOutcome>
where
    C: ConnectionTrait,
{
    let name = repo.name.clone();
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(repo.name),
        description: Set(repo.description),
        url: Set(repo.url),
        language: Set(repo.language),
        forks_count: Set(repo.forks_count),
        stars_count: Set(repo.stars_count),
        open_issues_count: Set(repo.open_issues_count),
        watchers_count: Set(repo.watchers_count),
        created_at: Set(repo.created_at.fixed_offset()),
        updated_at: Set(repo.updated_at.fixed_offset()),
        last_commit_fetched_at: NotSet,
    };

    let on_conflict = OnConflict::column(Column::Name)
        .update_columns([
            Column::Description,
            Column::Url,
            Column::Language,
            Column::ForksCount,
            Column::StarsCount,
            Column::OpenIssuesCount,
            Column::WatchersCount,
            Column::UpdatedAt,
        ])
        .to_owned();

    Repository::insert(model)
        .on_conflict(on_conflict)
        .exec_without_returning(conn)
        .await?;

    let stored = find_by_name(conn, &name)
        .await?
        .ok_or_else(|| StoreError::not_found(&name))?;

    Ok(UpsertOutcome {
        id: stored.id,
        previous_watermark: stored.watermark(),
    })
}

/// Set the watermark of the repository with `id`.
pub async fn update_watermark<C>(conn: &C, id: Uuid, at: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Repository::update_many()
        .col_expr(
            Column::LastCommitFetchedAt,
            Expr::value(Some(at.fixed_offset())),
        )
        .filter(Column::Id.eq(id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(StoreError::not_found(format!("id={id}")));
    }
    Ok(())
}

/// Find a repository by its `owner/name` key.
pub async fn find_by_name<C>(conn: &C, name: &str) -> Result<Option<Model>>
where
    C: ConnectionTrait,
{
    Ok(Repository::find()
        .filter(Column::Name.eq(name))
        .one(conn)
        .await?)
}

/// Like [`find_by_name`], but a missing repository is an error.
pub async fn get_by_name<C>(conn: &C, name: &str) -> Result<Model>
where
    C: ConnectionTrait,
{
    find_by_name(conn, name)
        .await?
        .ok_or_else(|| StoreError::not_found(name))
}

/// All tracked repositories ordered by name.
pub async fn list_repositories(db: &DatabaseConnection) -> Result<Vec<Model>> {
    Ok(Repository::find()
        .order_by_asc(Column::Name)
        .all(db)
        .await?)
}
