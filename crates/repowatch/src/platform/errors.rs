use std::fmt;

use thiserror::Error;

/// Where in a fetch an upstream call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// The request never produced a response.
    Network,
    /// The response carried an unexpected status code.
    Status(u16),
    /// The body could not be decoded.
    Decode,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Decode => f.write_str("decode"),
        }
    }
}

/// Coarse classification used by callers that map errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    NotFound,
    TransientUpstream,
    MalformedResponse,
    Configuration,
}

/// Errors that can occur when talking to the remote host.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Repository (or other resource) does not exist upstream.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Network failure or unexpected status; the caller may retry later.
    #[error("Upstream request to {url} failed ({stage}): {message}")]
    Transient {
        url: String,
        stage: FetchStage,
        message: String,
    },

    /// The upstream answered but the payload did not match the expected shape.
    #[error("Malformed response from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The client could not be constructed.
    #[error("Client configuration error: {message}")]
    Config { message: String },
}

impl PlatformError {
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            url: url.into(),
            stage: FetchStage::Network,
            message: message.into(),
        }
    }

    #[inline]
    pub fn status(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Transient {
            url: url.into(),
            stage: FetchStage::Status(status),
            message: message.into(),
        }
    }

    #[inline]
    pub fn malformed(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Malformed {
            url: url.into(),
            source,
        }
    }

    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> PlatformErrorKind {
        match self {
            Self::NotFound { .. } => PlatformErrorKind::NotFound,
            Self::Transient { .. } => PlatformErrorKind::TransientUpstream,
            Self::Malformed { .. } => PlatformErrorKind::MalformedResponse,
            Self::Config { .. } => PlatformErrorKind::Configuration,
        }
    }

    /// The fetch stage that failed, if the error came from a fetch.
    pub fn stage(&self) -> Option<FetchStage> {
        match self {
            Self::Transient { stage, .. } => Some(*stage),
            Self::Malformed { .. } => Some(FetchStage::Decode),
            Self::NotFound { .. } => Some(FetchStage::Status(404)),
            Self::Config { .. } => None,
        }
    }

    /// Whether the upstream was still throttling after the single retry.
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.stage(), Some(FetchStage::Status(429)))
    }
}

/// First line of an error's display output, for log fields and summaries.
///
/// # Example
///
/// ```ignore
/// use repowatch::platform::short_error_message;
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
/// assert_eq!(short_error_message(&error), "file not found");
/// ```
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
