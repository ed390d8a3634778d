//! Repository entity - one row per tracked upstream repository.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A tracked repository and its sync watermark.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repositories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Canonical `owner/name` key.
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub url: String,
    pub language: Option<String>,

    // ─── Statistics ──────────────────────────────────────────────────────────
    pub forks_count: i32,
    pub stars_count: i32,
    pub open_issues_count: i32,
    pub watchers_count: i32,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    /// Creation time on the remote host.
    pub created_at: DateTimeWithTimeZone,
    /// Last update time on the remote host.
    pub updated_at: DateTimeWithTimeZone,
    /// High-water mark for incremental commit fetches. `None` until the first
    /// successful sync.
    pub last_commit_fetched_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::commit::Entity")]
    Commits,
}

impl Related<super::commit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Split the stored key into `(owner, name)`.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        self.name.split_once('/')
    }

    /// The watermark normalized to UTC.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.last_commit_fetched_at
            .map(|at| at.with_timezone(&Utc))
    }
}
