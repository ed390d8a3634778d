use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::platform::{PlatformClient, RepoRef, short_error_message};

use super::service::SyncService;
use super::types::{SyncError, SyncReport};

/// One hour, matching the remote host's quota window.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3600);

/// The operations a [`PollWorker`] needs from the sync layer.
#[async_trait]
pub trait RepositorySyncer: Send + Sync {
    async fn sync_repository(
        &self,
        repo: &RepoRef,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncReport, SyncError>;

    /// Watermark to resume from; `None` when the repository has never been
    /// synced.
    async fn stored_watermark(&self, repo: &RepoRef) -> Result<Option<DateTime<Utc>>, SyncError>;

    /// One scheduled sync: resume from the stored watermark.
    async fn sync_from_watermark(&self, repo: &RepoRef) -> Result<SyncReport, SyncError> {
        let since = self.stored_watermark(repo).await?;
        self.sync_repository(repo, since).await
    }
}

#[async_trait]
impl<C: PlatformClient + ?Sized + 'static> RepositorySyncer for SyncService<C> {
    async fn sync_repository(
        &self,
        repo: &RepoRef,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncReport, SyncError> {
        SyncService::sync_repository(self, &repo.owner, &repo.name, since).await
    }

    async fn stored_watermark(&self, repo: &RepoRef) -> Result<Option<DateTime<Utc>>, SyncError> {
        match SyncService::stored_watermark(self, repo).await {
            Ok(watermark) => Ok(watermark),
            // No row yet: the first full sync never succeeded.
            Err(e) if e.is_not_found() => Ok(None),
            Err(source) => Err(SyncError::Persistence {
                repo: repo.full_name(),
                source,
            }),
        }
    }

    async fn sync_from_watermark(&self, repo: &RepoRef) -> Result<SyncReport, SyncError> {
        SyncService::sync_from_watermark(self, repo).await
    }
}

/// Lifecycle of a [`PollWorker`], observable through [`PollWorker::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Waiting,
    Syncing,
    Stopped,
}

/// Periodically re-syncs one repository from its stored watermark.
///
/// Cancellation is observed between ticks; an in-flight sync always runs to
/// completion. Failures are logged and never stop the loop.
pub struct PollWorker {
    repo: RepoRef,
    interval: Duration,
    initial_sync: bool,
    state: watch::Sender<WorkerState>,
}

impl PollWorker {
    pub fn new(repo: RepoRef, interval: Duration) -> Self {
        let (state, _) = watch::channel(WorkerState::Starting);
        Self {
            repo,
            interval,
            initial_sync: true,
            state,
        }
    }

    /// Skip the full-history sync on start, for repositories that were just
    /// synced by the caller.
    #[must_use]
    pub fn without_initial_sync(mut self) -> Self {
        self.initial_sync = false;
        self
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }

    pub async fn run<S>(self, syncer: Arc<S>, shutdown: CancellationToken)
    where
        S: RepositorySyncer + ?Sized,
    {
        let repo = self.repo.full_name();
        tracing::info!(
            repo = %repo,
            interval_secs = self.interval.as_secs(),
            "Starting sync worker"
        );

        if self.initial_sync {
            self.set_state(WorkerState::Syncing);
            log_outcome(syncer.sync_repository(&self.repo, None).await);
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.set_state(WorkerState::Waiting);
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.set_state(WorkerState::Syncing);
            log_outcome(syncer.sync_from_watermark(&self.repo).await);
        }

        self.set_state(WorkerState::Stopped);
        tracing::info!(repo = %repo, "Sync worker stopped");
    }
}

fn log_outcome(result: Result<SyncReport, SyncError>) {
    match result {
        Ok(report) => tracing::debug!(
            repo = %report.full_name,
            inserted = report.inserted,
            "Scheduled sync finished"
        ),
        Err(e) => tracing::error!(
            repo = %e.repo(),
            stage = %e.stage(),
            error = %short_error_message(&e),
            "Scheduled sync failed"
        ),
    }
}
