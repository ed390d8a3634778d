//! Supervisor for the per-repository poll workers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use repowatch::platform::RepoRef;
use repowatch::sync::{PollWorker, SyncService};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Owns every running [`PollWorker`], at most one per repository.
pub(crate) struct Monitor {
    service: Arc<SyncService>,
    interval: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    running: Arc<Mutex<HashSet<String>>>,
}

impl Monitor {
    /// Workers stop when `shutdown` (or [`Monitor::shutdown`]) is cancelled.
    pub(crate) fn new(
        service: Arc<SyncService>,
        interval: Duration,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            service,
            interval,
            shutdown: shutdown.child_token(),
            tracker: TaskTracker::new(),
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Spawn a worker for `repo` unless one is already running.
    ///
    /// Returns `false` when the repository was already monitored.
    pub(crate) fn start(&self, repo: RepoRef, initial_sync: bool) -> bool {
        let key = repo.full_name();
        {
            let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            if !running.insert(key.clone()) {
                tracing::debug!(repo = %key, "Worker already running");
                return false;
            }
        }

        let mut worker = PollWorker::new(repo, self.interval);
        if !initial_sync {
            worker = worker.without_initial_sync();
        }

        let service = Arc::clone(&self.service);
        let shutdown = self.shutdown.clone();
        let running = Arc::clone(&self.running);
        self.tracker.spawn(async move {
            worker.run(service, shutdown).await;
            running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        });
        true
    }

    pub(crate) fn is_running(&self, repo: &RepoRef) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&repo.full_name())
    }

    /// Names of the monitored repositories, sorted.
    pub(crate) fn running(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Stop every worker and wait for in-flight syncs to finish.
    pub(crate) async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("All sync workers stopped");
    }
}
