use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::Result;

/// Repository metadata as reported by the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub language: Option<String>,
    pub forks: i32,
    pub stars: i32,
    pub open_issues: i32,
    pub watchers: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A commit as reported by the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommit {
    pub sha: String,
    pub message: String,
    /// Account login when the author is linked to an account, otherwise the
    /// git author name.
    pub author_name: String,
    pub author_email: String,
    pub authored_at: DateTime<Utc>,
    pub html_url: String,
}

/// Read-only access to a remote code host.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Fetch metadata for `owner/name`.
    async fn get_repository_metadata(&self, owner: &str, name: &str)
    -> Result<RepositoryMetadata>;

    /// List commits authored at or after `since`, newest first.
    ///
    /// With `page` set, exactly that page is fetched. Without it, pages are
    /// followed until the host reports no further page.
    async fn list_commits_since(
        &self,
        owner: &str,
        name: &str,
        since: Option<DateTime<Utc>>,
        page: Option<u32>,
    ) -> Result<Vec<RemoteCommit>>;
}

/// An `owner/name` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected repository in owner/name form, got {0:?}")]
pub struct ParseRepoRefError(pub String);

impl RepoRef {
    pub fn new(owner: &str, name: &str) -> std::result::Result<Self, ParseRepoRefError> {
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() || owner.contains('/') || name.contains('/') {
            return Err(ParseRepoRefError(format!("{owner}/{name}")));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = ParseRepoRefError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (owner, name) = s
            .split_once('/')
            .ok_or_else(|| ParseRepoRefError(s.to_string()))?;
        Self::new(owner, name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
