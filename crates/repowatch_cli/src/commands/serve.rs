use std::sync::Arc;

use repowatch::platform::{RepoRef, short_error_message};
use repowatch::sync::SyncService;
use tokio::net::TcpListener;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::monitor::Monitor;
use crate::shutdown::setup_shutdown_handler;

/// Repositories to monitor on start-up, and whether each still needs its
/// initial full sync.
///
/// With nothing tracked yet, `default_repo` is synced here first; a failure
/// is fatal.
pub(crate) async fn bootstrap(
    service: &SyncService,
    default_repo: &RepoRef,
) -> Result<Vec<(RepoRef, bool)>, Box<dyn std::error::Error>> {
    let stored = service.list_repositories().await?;

    if stored.is_empty() {
        tracing::warn!(
            repo = %default_repo,
            "No repositories tracked yet, syncing default repository"
        );
        let report = service
            .sync_repository(&default_repo.owner, &default_repo.name, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    repo = %default_repo,
                    stage = %e.stage(),
                    error = %short_error_message(&e),
                    "Failed to sync default repository"
                );
                e
            })?;
        tracing::info!(repo = %report.full_name, inserted = report.inserted, "Default repository synced");
        return Ok(vec![(default_repo.clone(), false)]);
    }

    let mut repos = Vec::with_capacity(stored.len());
    for model in stored {
        match model.name.parse::<RepoRef>() {
            Ok(repo) => repos.push((repo, true)),
            Err(e) => tracing::warn!(name = %model.name, error = %e, "Skipping malformed repository key"),
        }
    }
    Ok(repos)
}

/// Run the poll workers and the query API until Ctrl+C.
pub(crate) async fn handle_serve(
    config: &Config,
    service: Arc<SyncService>,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = setup_shutdown_handler();
    let default_repo = config.default_repository()?;
    let bind = config.bind_addr()?;

    let repos = bootstrap(&service, &default_repo).await?;

    let monitor = Arc::new(Monitor::new(
        Arc::clone(&service),
        config.sync_interval(),
        &shutdown,
    ));
    for (repo, initial_sync) in repos {
        monitor.start(repo, initial_sync);
    }
    tracing::info!(
        workers = monitor.running().len(),
        interval_secs = config.sync.interval_secs,
        "Sync workers started"
    );

    let listener = TcpListener::bind(bind).await?;
    let state = AppState {
        service,
        monitor: Arc::clone(&monitor),
    };
    let served = api::serve(listener, state, shutdown.clone()).await;

    // The server also returns on I/O failure; stop the workers either way.
    shutdown.cancel();
    monitor.shutdown().await;
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
