//! Platform-agnostic contract for remote code hosts.
//!
//! The [`PlatformClient`] trait is the only way the sync layer talks to the
//! remote host. Implementations route every request through a
//! [`RateLimitedTransport`] sharing one process-wide [`QuotaLimiter`].
//!
//! # Example
//!
//! ```ignore
//! use repowatch::platform::PlatformClient;
//!
//! async fn latest<C: PlatformClient>(client: &C) -> Result<(), PlatformError> {
//!     let commits = client.list_commits_since("rust-lang", "rust", None, Some(1)).await?;
//!     for commit in commits {
//!         println!("{} {}", commit.sha, commit.author_name);
//!     }
//!     Ok(())
//! }
//! ```

mod errors;
mod rate_limit;
mod types;

pub use errors::{FetchStage, PlatformError, PlatformErrorKind, Result, short_error_message};
pub use rate_limit::{
    DEFAULT_LOW_QUOTA_WARNING, DEFAULT_QUOTA, QuotaLimiter, RateLimitInfo, RateLimitedTransport,
    TOO_MANY_REQUESTS,
};
pub use types::{ParseRepoRefError, PlatformClient, RemoteCommit, RepoRef, RepositoryMetadata};
