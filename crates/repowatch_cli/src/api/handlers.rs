use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use repowatch::entity::commit::Model as CommitModel;
use repowatch::entity::repository::Model as RepositoryModel;
use repowatch::platform::RepoRef;
use repowatch::store::{AuthorCommitCount, CommitFilter, Pagination};
use repowatch::sync::SyncReport;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::{ApiResponse, AppState, success};

const DEFAULT_COMMITS_LIMIT: u64 = 30;
const DEFAULT_AUTHORS_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 100;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Out-of-range limits fall back to the endpoint default.
fn limit_or(limit: Option<u64>, default: u64) -> u64 {
    limit.filter(|l| (1..=MAX_LIMIT).contains(l)).unwrap_or(default)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddRepositoryRequest {
    owner: String,
    name: String,
}

/// Body of the reset and monitor endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct SinceRequest {
    since: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitsQuery {
    page: Option<u64>,
    limit: Option<u64>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    limit: Option<u64>,
}

/// One page of commits; `page` is 1-indexed.
#[derive(Debug, Serialize)]
pub(crate) struct CommitsPage {
    commits: Vec<CommitModel>,
    total: u64,
    page: u64,
    limit: u64,
    total_pages: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResetResponse {
    since: DateTime<Utc>,
    deleted_commits: u64,
    sync: SyncReport,
}

#[derive(Debug, Serialize)]
pub(crate) struct MonitorResponse {
    since: DateTime<Utc>,
    sync: SyncReport,
    /// False when a worker was already running.
    worker_started: bool,
}

pub(crate) async fn list_repositories(
    State(state): State<AppState>,
) -> ApiResult<Vec<RepositoryModel>> {
    let repos = state.service.list_repositories().await?;
    Ok(success("Successfully fetched repositories", repos))
}

pub(crate) async fn get_repository(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
) -> ApiResult<RepositoryModel> {
    let repo = RepoRef::new(&owner, &name)?;
    let model = state.service.get_repository(&repo).await?;
    tracing::debug!(repo = %repo, "Fetched repository");
    Ok(success("Successfully fetched repository", model))
}

/// Sync a new repository from scratch and start monitoring it.
pub(crate) async fn add_repository(
    State(state): State<AppState>,
    body: Result<Json<AddRepositoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SyncReport>>), ApiError> {
    let Json(req) = body?;
    let repo = RepoRef::new(&req.owner, &req.name)?;

    let conflict = || ApiError::Conflict(format!("Repository {repo} is already monitored"));
    if state.monitor.is_running(&repo) {
        return Err(conflict());
    }
    let report = state
        .service
        .sync_new_repository(&repo)
        .await?
        .ok_or_else(conflict)?;
    state.monitor.start(repo.clone(), false);
    tracing::info!(repo = %repo, inserted = report.inserted, "Repository added");

    Ok((
        StatusCode::CREATED,
        success(
            "Repository successfully added and monitoring started",
            report,
        ),
    ))
}

pub(crate) async fn list_commits(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    query: Result<Query<CommitsQuery>, QueryRejection>,
) -> ApiResult<CommitsPage> {
    let Query(query) = query?;
    let repo = RepoRef::new(&owner, &name)?;

    if let (Some(since), Some(until)) = (query.since, query.until)
        && since > until
    {
        return Err(ApiError::InvalidInput(
            "since must not be after until".to_string(),
        ));
    }

    let page = query.page.filter(|p| *p >= 1).unwrap_or(1);
    let limit = limit_or(query.limit, DEFAULT_COMMITS_LIMIT);
    let filter = CommitFilter {
        since: query.since,
        until: query.until,
    };

    let result = state
        .service
        .paginate_commits(&repo, filter, Pagination::new(page - 1, limit))
        .await?;

    Ok(success(
        "Successfully fetched commits",
        CommitsPage {
            commits: result.items,
            total: result.total,
            page,
            limit,
            total_pages: result.total_pages,
        },
    ))
}

pub(crate) async fn top_authors(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Vec<AuthorCommitCount>> {
    let Query(query) = query?;
    let repo = RepoRef::new(&owner, &name)?;
    let limit = limit_or(query.limit, DEFAULT_AUTHORS_LIMIT);

    let authors = state.service.top_authors(&repo, limit).await?;
    Ok(success("Successfully fetched top commit authors", authors))
}

/// Drop stored commits and re-collect them from `since`.
pub(crate) async fn reset_collection(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    body: Result<Json<SinceRequest>, JsonRejection>,
) -> ApiResult<ResetResponse> {
    let Json(SinceRequest { since }) = body?;
    let repo = RepoRef::new(&owner, &name)?;

    let (outcome, sync) = state.service.reset_and_resync(&repo, since).await?;

    Ok(success(
        "Repository data reset successfully",
        ResetResponse {
            since,
            deleted_commits: outcome.deleted_commits,
            sync,
        },
    ))
}

/// Sync from `since` and make sure a worker keeps the repository current.
pub(crate) async fn monitor_repository(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    body: Result<Json<SinceRequest>, JsonRejection>,
) -> ApiResult<MonitorResponse> {
    let Json(SinceRequest { since }) = body?;
    let repo = RepoRef::new(&owner, &name)?;

    let sync = state
        .service
        .sync_repository(&repo.owner, &repo.name, Some(since))
        .await?;
    let worker_started = state.monitor.start(repo.clone(), false);
    tracing::info!(repo = %repo, since = %since, worker_started, "Monitoring repository");

    Ok(success(
        "Repository monitoring started successfully",
        MonitorResponse {
            since,
            sync,
            worker_started,
        },
    ))
}
