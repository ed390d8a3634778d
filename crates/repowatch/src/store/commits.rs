use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entity::commit::{ActiveModel, Column, Entity as Commit};
use crate::platform::RemoteCommit;

use super::errors::Result;

/// A commit ready to be written for a known repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub sha: String,
    pub repository_id: Uuid,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub author_date: DateTime<Utc>,
    pub commit_url: String,
}

impl NewCommit {
    pub fn from_remote(repository_id: Uuid, commit: &RemoteCommit) -> Self {
        Self {
            sha: commit.sha.clone(),
            repository_id,
            message: commit.message.clone(),
            author_name: commit.author_name.clone(),
            author_email: commit.author_email.clone(),
            author_date: commit.authored_at,
            commit_url: commit.html_url.clone(),
        }
    }
}

/// Insert a commit, ignoring it if `(sha, repository_id)` already exists.
///
/// Returns whether a row was written.
pub async fn insert_commit<C>(conn: &C, commit: NewCommit) -> Result<bool>
where
    C: ConnectionTrait,
{
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        sha: Set(commit.sha),
        repository_id: Set(commit.repository_id),
        message: Set(commit.message),
        author_name: Set(commit.author_name),
        author_email: Set(commit.author_email),
        author_date: Set(commit.author_date.fixed_offset()),
        commit_url: Set(commit.commit_url),
    };

    let on_conflict = OnConflict::columns([Column::Sha, Column::RepositoryId])
        .do_nothing()
        .to_owned();

    let rows = Commit::insert(model)
        .on_conflict(on_conflict)
        .exec_without_returning(conn)
        .await?;
    Ok(rows > 0)
}

/// Delete every commit of a repository, returning how many were removed.
pub async fn delete_commits_for<C>(conn: &C, repository_id: Uuid) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Commit::delete_many()
        .filter(Column::RepositoryId.eq(repository_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
