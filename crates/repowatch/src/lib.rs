//! Repowatch - keeps a local copy of a remote repository's metadata and
//! commit history up to date.
//!
//! The engine fetches from a GitHub-compatible REST API under a shared,
//! header-driven rate limiter, persists each sync in a single transaction,
//! and re-syncs tracked repositories on a fixed interval from a stored
//! watermark.
//!
//! # Features
//!
//! - `sqlite` / `postgres` - database backends.
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to bring the schema up to date on connection.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use repowatch::{connect_and_migrate, github::GitHubClient, platform::QuotaLimiter, sync::SyncService};
//!
//! let db = connect_and_migrate("sqlite://repowatch.db?mode=rwc").await?;
//! let limiter = Arc::new(QuotaLimiter::new());
//! let client = GitHubClient::new(github::DEFAULT_API_URL, Some(&token), github::DEFAULT_TIMEOUT, limiter)?;
//! let service = SyncService::new(Arc::new(client), db);
//!
//! let report = service.sync_repository("chromium", "chromium", None).await?;
//! ```

pub mod db;
pub mod entity;
pub mod github;
pub mod http;
pub mod platform;
pub mod store;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use platform::{PlatformClient, PlatformError, QuotaLimiter, RepoRef};
pub use store::StoreError;
pub use sync::{PollWorker, SyncError, SyncReport, SyncService};
