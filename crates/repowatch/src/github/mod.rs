//! GitHub REST API client.
//!
//! # Module Structure
//!
//! - [`client`] - [`GitHubClient`], the [`PlatformClient`](crate::platform::PlatformClient) implementation
//! - [`types`] - Wire shapes of the REST responses
//! - [`convert`] - Wire shapes to platform types
//! - [`pagination`] - `Link` header parsing

mod client;
mod convert;
mod pagination;
mod types;

pub use client::{COMMITS_PER_PAGE, DEFAULT_API_URL, DEFAULT_TIMEOUT, GitHubClient};
pub use convert::{to_remote_commit, to_repository_metadata};
pub use pagination::{LinkPagination, parse_link_header};
pub use types::{GitCommitDetail, GitHubCommit, GitHubRepository, GitHubUser, GitSignature};
