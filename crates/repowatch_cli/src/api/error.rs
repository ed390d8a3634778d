use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use repowatch::platform::{ParseRepoRefError, PlatformError, PlatformErrorKind, short_error_message};
use repowatch::store::StoreError;
use repowatch::sync::SyncError;
use serde::Serialize;
use uuid::Uuid;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    /// The remote host failed or returned something unusable.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Resource not found",
            Self::InvalidInput(_) => "Invalid request",
            Self::Conflict(_) => "Resource already exists",
            Self::Upstream(_) => "Upstream request failed",
            Self::Internal(_) => "An unexpected error occurred",
        }
    }
}

impl From<PlatformError> for ApiError {
    fn from(err: PlatformError) -> Self {
        let detail = short_error_message(&err);
        match err.kind() {
            PlatformErrorKind::NotFound => Self::NotFound(detail),
            PlatformErrorKind::TransientUpstream | PlatformErrorKind::MalformedResponse => {
                Self::Upstream(detail)
            }
            PlatformErrorKind::Configuration => Self::Internal(detail),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { name } => Self::NotFound(format!("Repository {name} is not tracked")),
            StoreError::InvalidInput { message } => Self::InvalidInput(message),
            StoreError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Metadata { source, .. } | SyncError::Commits { source, .. } => source.into(),
            SyncError::Persistence { source, .. } => source.into(),
        }
    }
}

impl From<ParseRepoRefError> for ApiError {
    fn from(err: ParseRepoRefError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    error_reference: String,
    title: &'static str,
    detail: String,
    timestamp: DateTime<Utc>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_reference = Uuid::new_v4().to_string();

        // Database details stay in the log; clients get the reference.
        let detail = match &self {
            Self::Internal(e) => {
                tracing::error!(error_reference = %error_reference, error = %e, "Request failed");
                "Internal error, quote the error reference when reporting".to_string()
            }
            other => {
                tracing::warn!(
                    error_reference = %error_reference,
                    status = status.as_u16(),
                    error = %other,
                    "Request rejected"
                );
                other.to_string()
            }
        };

        let body = ErrorBody {
            status: status.as_u16(),
            error_reference,
            title: self.title(),
            detail,
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}
