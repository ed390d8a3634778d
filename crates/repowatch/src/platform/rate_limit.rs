use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::http::{HttpError, HttpHeaders, HttpRequest, HttpResponse, HttpTransport, header_get};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Hourly quota assumed until the host reports otherwise.
pub const DEFAULT_QUOTA: i64 = 5000;

/// Remaining-quota level below which a warning is logged.
pub const DEFAULT_LOW_QUOTA_WARNING: i64 = 100;

pub const TOO_MANY_REQUESTS: u16 = 429;

const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_RETRY_AFTER: &str = "retry-after";

/// Point-in-time view of the quota state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
    pub retry_after: Duration,
}

#[derive(Debug)]
struct QuotaState {
    remaining: i64,
    reset_at: DateTime<Utc>,
    retry_after: Duration,
}

/// Process-wide tracker of the remote host's quota.
///
/// Updated from response headers; consulted before every request. A single
/// instance is shared by every component that talks to the host.
///
/// The state lock is a plain mutex and is never held across an await.
pub struct QuotaLimiter {
    state: Mutex<QuotaState>,
    low_quota_warning: i64,
    pacer: Option<GovernorRateLimiter>,
}

impl Default for QuotaLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaLimiter {
    pub fn new() -> Self {
        Self::with_low_quota_warning(DEFAULT_LOW_QUOTA_WARNING)
    }

    pub fn with_low_quota_warning(low_quota_warning: i64) -> Self {
        Self {
            state: Mutex::new(QuotaState {
                remaining: DEFAULT_QUOTA,
                reset_at: Utc::now(),
                retry_after: Duration::ZERO,
            }),
            low_quota_warning,
            pacer: None,
        }
    }

    /// Additionally pace requests to at most `requests_per_second`.
    ///
    /// A value of 0 is treated as 1.
    #[must_use]
    pub fn with_pacing(mut self, requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        self.pacer = Some(RateLimiter::direct(Quota::per_second(rps)));
        self
    }

    fn lock(&self) -> MutexGuard<'_, QuotaState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> RateLimitInfo {
        let state = self.lock();
        RateLimitInfo {
            remaining: state.remaining,
            reset_at: state.reset_at,
            retry_after: state.retry_after,
        }
    }

    /// Most recently declared retry-after delay that has not been used yet.
    pub fn retry_after(&self) -> Duration {
        self.lock().retry_after
    }

    /// Take the declared retry-after delay, leaving zero behind so a later
    /// 429 without the header does not reuse it.
    pub fn take_retry_after(&self) -> Duration {
        std::mem::take(&mut self.lock().retry_after)
    }

    /// How long a request issued at `now` must wait, if at all.
    pub fn time_until_reset(&self, now: DateTime<Utc>) -> Option<Duration> {
        let state = self.lock();
        if state.remaining > 0 || now >= state.reset_at {
            return None;
        }
        (state.reset_at - now).to_std().ok()
    }

    /// Block until a request may be issued.
    ///
    /// When the quota is exhausted and the reset instant is in the future this
    /// sleeps once for exactly the remaining duration.
    pub async fn wait_if_needed(&self) {
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }

        let wait = self.time_until_reset(Utc::now());
        if let Some(wait) = wait {
            tracing::warn!(
                wait_secs = wait.as_secs(),
                "Rate limit exhausted, waiting for quota reset"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Absorb quota headers from a response. Absent or unparseable headers
    /// leave the corresponding field unchanged.
    pub fn update_from_headers(&self, headers: &HttpHeaders) {
        let remaining =
            header_get(headers, HEADER_REMAINING).and_then(|v| v.trim().parse::<i64>().ok());
        let reset_at = header_get(headers, HEADER_RESET)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        let retry_after = header_get(headers, HEADER_RETRY_AFTER)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let mut state = self.lock();
        if let Some(remaining) = remaining {
            state.remaining = remaining;
        }
        if let Some(reset_at) = reset_at {
            state.reset_at = reset_at;
        }
        if let Some(retry_after) = retry_after {
            state.retry_after = retry_after;
        }

        if remaining.is_some() && state.remaining < self.low_quota_warning {
            tracing::warn!(
                remaining = state.remaining,
                reset_at = %state.reset_at,
                "API quota running low"
            );
        }
    }
}

/// Transport decorator that enforces the shared quota.
///
/// Every request first waits on the [`QuotaLimiter`]. A 429 response is
/// retried exactly once after the declared retry-after delay; a second 429
/// is handed back to the caller. Network failures and other statuses are
/// never retried here.
pub struct RateLimitedTransport {
    inner: Arc<dyn HttpTransport>,
    limiter: Arc<QuotaLimiter>,
}

impl RateLimitedTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, limiter: Arc<QuotaLimiter>) -> Self {
        Self { inner, limiter }
    }

    pub fn limiter(&self) -> &Arc<QuotaLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl HttpTransport for RateLimitedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.limiter.wait_if_needed().await;

        let response = self.inner.send(request.clone()).await?;
        self.limiter.update_from_headers(&response.headers);
        if response.status != TOO_MANY_REQUESTS {
            return Ok(response);
        }

        let delay = self.limiter.take_retry_after();
        tracing::warn!(
            url = %request.url,
            retry_after_secs = delay.as_secs(),
            "Throttled by upstream, retrying once"
        );
        tokio::time::sleep(delay).await;

        let retried = self.inner.send(request).await?;
        self.limiter.update_from_headers(&retried.headers);
        if retried.status == TOO_MANY_REQUESTS {
            // Returned to the caller as is; its delay is not carried over.
            self.limiter.take_retry_after();
        }
        Ok(retried)
    }
}
