pub(crate) mod migrate;
pub(crate) mod query;
pub(crate) mod serve;
pub(crate) mod sync;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use repowatch::github::GitHubClient;
use repowatch::platform::{PlatformClient, QuotaLimiter};
use repowatch::sync::SyncService;
use sea_orm::DatabaseConnection;

use crate::config::Config;

/// Build the process-wide sync service.
///
/// The service owns the only [`GitHubClient`], so every request in the
/// process shares one [`QuotaLimiter`].
pub(crate) fn build_service(
    config: &Config,
    db: DatabaseConnection,
) -> Result<Arc<SyncService>, Box<dyn std::error::Error>> {
    let mut limiter = QuotaLimiter::with_low_quota_warning(config.rate_limit.low_quota_warning);
    if let Some(rps) = config.rate_limit.requests_per_second {
        limiter = limiter.with_pacing(rps);
    }

    if config.github_token().is_none() {
        tracing::warn!("No GitHub token configured; requests are unauthenticated");
    }

    let client = GitHubClient::new(
        &config.github.api_url,
        config.github_token(),
        config.github_timeout(),
        Arc::new(limiter),
    )?;
    let client: Arc<dyn PlatformClient> = Arc::new(client);
    Ok(Arc::new(SyncService::new(client, db)))
}

/// Parse a command-line timestamp: RFC 3339, or a bare date at midnight UTC.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid timestamp {s:?}, expected RFC 3339 or YYYY-MM-DD"))
}
