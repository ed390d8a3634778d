use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;

use crate::http::{HttpHeaders, HttpRequest, HttpTransport, ReqwestTransport, header_get};
use crate::platform::{
    self, PlatformClient, PlatformError, QuotaLimiter, RateLimitedTransport, RemoteCommit,
    RepositoryMetadata,
};

use super::convert::{to_remote_commit, to_repository_metadata};
use super::pagination::parse_link_header;
use super::types::{GitHubCommit, GitHubRepository};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Page size requested from the commits endpoint (the API maximum).
pub const COMMITS_PER_PAGE: u32 = 100;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = "repowatch";

/// Longest slice of an error body carried into an error message.
const MAX_ERROR_BODY: usize = 200;

/// GitHub client over an [`HttpTransport`].
///
/// Every request goes through a [`RateLimitedTransport`] bound to the shared
/// [`QuotaLimiter`] passed in at construction.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: Option<String>,
    limiter: Arc<QuotaLimiter>,
}

impl GitHubClient {
    /// Create a client backed by reqwest.
    ///
    /// An absent or empty token sends unauthenticated requests.
    pub fn new(
        api_url: &str,
        token: Option<&str>,
        timeout: Duration,
        limiter: Arc<QuotaLimiter>,
    ) -> platform::Result<Self> {
        let transport = ReqwestTransport::with_timeout(timeout)
            .map_err(|e| PlatformError::config(e.to_string()))?;
        Ok(Self::new_with_transport(
            api_url,
            token,
            limiter,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        api_url: &str,
        token: Option<&str>,
        limiter: Arc<QuotaLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let rate_limited = RateLimitedTransport::new(transport, Arc::clone(&limiter));
        Self {
            transport: Arc::new(rate_limited),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
            limiter,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn limiter(&self) -> &Arc<QuotaLimiter> {
        &self.limiter
    }

    fn repo_url(&self, owner: &str, name: &str) -> String {
        format!("{}/repos/{owner}/{name}", self.api_url)
    }

    fn commits_url(
        &self,
        owner: &str,
        name: &str,
        since: Option<DateTime<Utc>>,
        page: u32,
    ) -> String {
        let mut query = Vec::with_capacity(3);
        if let Some(since) = since {
            query.push(format!(
                "since={}",
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        query.push(format!("page={page}"));
        query.push(format!("per_page={COMMITS_PER_PAGE}"));
        format!("{}/commits?{}", self.repo_url(owner, name), query.join("&"))
    }

    fn request(&self, url: &str) -> HttpRequest {
        let request = HttpRequest::get(url)
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT);
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {token}")),
            None => request,
        }
    }

    /// GET `url` and decode the JSON body, returning the response headers
    /// alongside. A 404 becomes [`PlatformError::NotFound`] for `resource`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        resource: &str,
    ) -> platform::Result<(T, HttpHeaders)> {
        let response = self
            .transport
            .send(self.request(url))
            .await
            .map_err(|e| PlatformError::network(url, e.to_string()))?;

        match response.status {
            404 => return Err(PlatformError::not_found(resource)),
            status if !response.is_success() => {
                let body = String::from_utf8_lossy(&response.body);
                let message: String = body.chars().take(MAX_ERROR_BODY).collect();
                return Err(PlatformError::status(url, status, message));
            }
            _ => {}
        }

        let data = serde_json::from_slice(&response.body)
            .map_err(|e| PlatformError::malformed(url, e))?;
        Ok((data, response.headers))
    }

    async fn fetch_commit_page(
        &self,
        owner: &str,
        name: &str,
        since: Option<DateTime<Utc>>,
        page: u32,
    ) -> platform::Result<(Vec<RemoteCommit>, bool)> {
        let url = self.commits_url(owner, name, since, page);
        let (commits, headers) = self
            .get_json::<Vec<GitHubCommit>>(&url, &format!("{owner}/{name}"))
            .await?;
        let has_next = header_get(&headers, "link")
            .map(parse_link_header)
            .is_some_and(|link| link.has_next);
        Ok((commits.into_iter().map(to_remote_commit).collect(), has_next))
    }
}

#[async_trait]
impl PlatformClient for GitHubClient {
    async fn get_repository_metadata(
        &self,
        owner: &str,
        name: &str,
    ) -> platform::Result<RepositoryMetadata> {
        let url = self.repo_url(owner, name);
        let (repo, _) = self
            .get_json::<GitHubRepository>(&url, &format!("{owner}/{name}"))
            .await?;
        Ok(to_repository_metadata(repo))
    }

    async fn list_commits_since(
        &self,
        owner: &str,
        name: &str,
        since: Option<DateTime<Utc>>,
        page: Option<u32>,
    ) -> platform::Result<Vec<RemoteCommit>> {
        if let Some(page) = page {
            let (commits, _) = self.fetch_commit_page(owner, name, since, page).await?;
            return Ok(commits);
        }

        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let (commits, has_next) = self.fetch_commit_page(owner, name, since, page).await?;
            if commits.is_empty() {
                break;
            }
            all.extend(commits);
            if !has_next {
                break;
            }
            page += 1;
        }

        tracing::debug!(
            repo = %format!("{owner}/{name}"),
            pages = page,
            commits = all.len(),
            "Fetched commit pages"
        );
        Ok(all)
    }
}
