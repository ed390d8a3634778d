//! Conversion from GitHub wire types to platform types.

use crate::platform::{RemoteCommit, RepositoryMetadata};

use super::types::{GitHubCommit, GitHubRepository};

pub fn to_repository_metadata(repo: GitHubRepository) -> RepositoryMetadata {
    RepositoryMetadata {
        full_name: repo.full_name,
        description: repo.description,
        html_url: repo.html_url,
        language: repo.language,
        forks: repo.forks_count,
        stars: repo.stargazers_count,
        open_issues: repo.open_issues_count,
        watchers: repo.watchers_count,
        created_at: repo.created_at,
        updated_at: repo.updated_at,
    }
}

/// The author is attributed to the linked account login when there is one,
/// falling back to the name recorded in the git commit.
pub fn to_remote_commit(commit: GitHubCommit) -> RemoteCommit {
    let author_name = match commit.author {
        Some(user) if !user.login.is_empty() => user.login,
        _ => commit.commit.author.name,
    };

    RemoteCommit {
        sha: commit.sha,
        message: commit.commit.message,
        author_name,
        author_email: commit.commit.author.email,
        authored_at: commit.commit.author.date,
        html_url: commit.html_url,
    }
}
