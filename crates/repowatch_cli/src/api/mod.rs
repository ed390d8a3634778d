//! HTTP query API served by `repowatch serve`.
//!
//! All routes live under `/api/v1`. Successful responses are wrapped as
//! `{status, message, data}`; failures as
//! `{status, error_reference, title, detail, timestamp}`.

mod error;
mod handlers;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::routing::{get, post};
use repowatch::sync::SyncService;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::monitor::Monitor;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) service: Arc<SyncService>,
    pub(crate) monitor: Arc<Monitor>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T> {
    status: &'static str,
    message: String,
    data: T,
}

pub(crate) fn success<T>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        status: "success",
        message: message.into(),
        data,
    })
}

pub(crate) fn router(state: AppState) -> Router {
    let repositories = Router::new()
        .route(
            "/repositories",
            get(handlers::list_repositories).post(handlers::add_repository),
        )
        .route("/repositories/{owner}/{name}", get(handlers::get_repository))
        .route(
            "/repositories/{owner}/{name}/commits",
            get(handlers::list_commits),
        )
        .route(
            "/repositories/{owner}/{name}/top-authors",
            get(handlers::top_authors),
        )
        .route(
            "/repositories/{owner}/{name}/reset-collection",
            post(handlers::reset_collection),
        )
        .route(
            "/repositories/{owner}/{name}/monitor",
            post(handlers::monitor_repository),
        );

    Router::new().nest("/api/v1", repositories).with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
pub(crate) async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "API listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
