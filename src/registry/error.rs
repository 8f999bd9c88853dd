//! Outcome taxonomy for upstream registry access.
//!
//! Upstream failures are values, not exceptions: a classified [`FetchError`]
//! flows back through the retry/breaker machinery and ultimately resolves to
//! "no data" at the client boundary. Only programmer errors are allowed to
//! surface as `Err` past that boundary.

use thiserror::Error;

/// Classified failure of a single upstream transport attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection-level failure: DNS, TLS, reset, malformed body
    #[error("network error: {0}")]
    Network(String),
    /// The per-request deadline elapsed
    #[error("request timed out")]
    Timeout,
    /// HTTP 429 from the upstream, with the Retry-After hint if present
    #[error("rate limited by upstream (retry-after: {retry_after:?}s)")]
    RateLimited {
        /// Retry-After duration in seconds, if provided by the server
        retry_after: Option<u64>,
    },
    /// HTTP 5xx: the upstream is degraded, likely for longer than a backoff
    #[error("upstream degraded: HTTP {0}")]
    Upstream(u16),
    /// HTTP 4xx other than 429: the request itself is wrong, retrying is futile
    #[error("request rejected: HTTP {0}")]
    Rejected(u16),
}

impl FetchError {
    /// Whether another attempt within the same logical call may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::RateLimited { .. }
        )
    }

    /// Whether this outcome signals upstream degradation to the breaker.
    /// Client-side rejections (4xx) say nothing about upstream health.
    #[must_use]
    pub const fn counts_toward_breaker(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Errors from the durable cache layer
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying SQLite failure
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Cached value could not round-trip through JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error (database directory creation)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The blocking cache task was cancelled or panicked
    #[error("cache task failed: {0}")]
    Task(String),
}

/// Malformed lookup identifier — a programmer error at the aggregator
/// boundary, not an upstream condition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The identifier contains something other than ASCII digits
    #[error("identifier must contain only digits")]
    NotDigits,
    /// The identifier has a length no known registry number uses
    #[error("identifier must be 10, 12, 13 or 15 digits, got {0}")]
    BadLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(FetchError::Network("reset".into()).is_retryable());
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::RateLimited { retry_after: None }.is_retryable());
        assert!(!FetchError::Upstream(502).is_retryable());
        assert!(!FetchError::Rejected(404).is_retryable());
    }

    #[test]
    fn test_breaker_classification() {
        assert!(FetchError::Network("reset".into()).counts_toward_breaker());
        assert!(FetchError::Timeout.counts_toward_breaker());
        assert!(FetchError::RateLimited { retry_after: None }.counts_toward_breaker());
        assert!(FetchError::Upstream(500).counts_toward_breaker());
        assert!(!FetchError::Rejected(403).counts_toward_breaker());
    }
}
