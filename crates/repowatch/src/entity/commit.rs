//! Commit entity - commits ingested for a tracked repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A commit belonging to exactly one repository.
///
/// `(sha, repository_id)` is unique; re-ingesting the same commit is a no-op.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sha: String,
    pub repository_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub author_date: DateTimeWithTimeZone,
    pub commit_url: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepositoryId",
        to = "super::repository::Column::Id",
        on_delete = "Cascade"
    )]
    Repository,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
