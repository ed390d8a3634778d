//! Repository synchronization.
//!
//! # Module Structure
//!
//! - [`types`] - `SyncReport`, `SyncError`, `SyncStage`
//! - [`service`] - [`SyncService`]: fetch, then persist atomically
//! - [`worker`] - [`PollWorker`]: periodic incremental sync of one repository
//!
//! # Example
//!
//! ```ignore
//! use repowatch::sync::{PollWorker, SyncService};
//! use tokio_util::sync::CancellationToken;
//!
//! let service = Arc::new(SyncService::new(client, db));
//! let report = service.sync_repository("chromium", "chromium", None).await?;
//! println!("{} new commits", report.inserted);
//!
//! let shutdown = CancellationToken::new();
//! let worker = PollWorker::new("chromium", "chromium", Duration::from_secs(3600));
//! tokio::spawn(worker.run(service, shutdown.clone()));
//! ```

mod service;
mod types;
mod worker;

pub use service::SyncService;
pub use types::{SyncError, SyncReport, SyncStage};
pub use worker::{DEFAULT_POLL_INTERVAL, PollWorker, RepositorySyncer, WorkerState};
