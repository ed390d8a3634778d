use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::platform::PlatformError;
use crate::store::StoreError;

/// Summary of one successful synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub repository_id: Uuid,
    pub full_name: String,
    /// Commits returned by the remote host.
    pub fetched: usize,
    /// Commits that were not already stored.
    pub inserted: usize,
    /// Whether the repository had never completed a sync before.
    pub first_sync: bool,
    /// Watermark after the sync.
    pub watermark: DateTime<Utc>,
}

/// Stage at which a synchronization failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    MetadataFetch,
    CommitFetch,
    Persistence,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::MetadataFetch => "metadata fetch",
            Self::CommitFetch => "commit fetch",
            Self::Persistence => "persistence",
        })
    }
}

/// A failed synchronization, tagged with the repository and stage.
///
/// Nothing is persisted when any stage fails.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to fetch metadata for {repo}: {source}")]
    Metadata { repo: String, source: PlatformError },

    #[error("Failed to fetch commits for {repo}: {source}")]
    Commits { repo: String, source: PlatformError },

    #[error("Failed to persist {repo}: {source}")]
    Persistence { repo: String, source: StoreError },
}

impl SyncError {
    pub fn stage(&self) -> SyncStage {
        match self {
            Self::Metadata { .. } => SyncStage::MetadataFetch,
            Self::Commits { .. } => SyncStage::CommitFetch,
            Self::Persistence { .. } => SyncStage::Persistence,
        }
    }

    pub fn repo(&self) -> &str {
        match self {
            Self::Metadata { repo, .. }
            | Self::Commits { repo, .. }
            | Self::Persistence { repo, .. } => repo,
        }
    }

    /// The upstream error, for fetch-stage failures.
    pub fn upstream(&self) -> Option<&PlatformError> {
        match self {
            Self::Metadata { source, .. } | Self::Commits { source, .. } => Some(source),
            Self::Persistence { .. } => None,
        }
    }

    /// The store error, for persistence failures.
    pub fn store(&self) -> Option<&StoreError> {
        match self {
            Self::Persistence { source, .. } => Some(source),
            _ => None,
        }
    }
}
