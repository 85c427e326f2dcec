//! Error types for sahayak-llm
//!
//! Provider failures are classified into four kinds so the manager can
//! decide between circuit breaking, fallback, and hard failure.

use thiserror::Error;

/// LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured (missing credentials)
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Provider quota exhausted for the current billing window
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Provider rate limit hit
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Provider temporarily unavailable (5xx, timeout)
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Generic API error
    #[error("api error: {0}")]
    Api(String),

    /// Response could not be parsed
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Structured output failed schema validation
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// Capability not offered by this provider
    #[error("not supported by {provider}: {capability}")]
    NotSupported {
        /// Provider name
        provider: String,
        /// Missing capability (e.g. "embeddings")
        capability: String,
    },

    /// Every configured provider was unhealthy or failed
    #[error("all {count} providers failed (tried: {tried}); last error: {last_error}")]
    AllProvidersFailed {
        /// Number of providers attempted
        count: usize,
        /// Comma-separated provider names, in attempt order
        tried: String,
        /// Message from the last underlying failure
        last_error: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classification used for circuit-breaker policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Quota exhausted - long cooldown
    Quota,
    /// Rate limited - short cooldown
    RateLimit,
    /// Transient outage - no cooldown, but fallback-eligible
    Unavailable,
    /// Everything else
    Other,
}

impl Error {
    /// Classify this error for health accounting.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QuotaExceeded(_) => ErrorKind::Quota,
            Self::RateLimited(_) => ErrorKind::RateLimit,
            Self::Unavailable(_) | Self::NotConfigured(_) => ErrorKind::Unavailable,
            _ => ErrorKind::Other,
        }
    }

    /// Whether trying another provider could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Quota | ErrorKind::RateLimit | ErrorKind::Unavailable
        )
    }
}

/// Classify an HTTP failure by status code and body text.
///
/// Vendors disagree on status codes for quota vs. rate limit, so the
/// body is pattern-matched on known phrases ("quota", "resource
/// exhausted", "rate limit") as a tie-breaker.
#[must_use]
pub fn classify_http_error(status: u16, body: &str) -> Error {
    let lower = body.to_lowercase();

    let quota_phrase = lower.contains("quota")
        || lower.contains("insufficient_quota")
        || (lower.contains("resource") && lower.contains("exhausted"));

    if status == 429 {
        if quota_phrase {
            return Error::QuotaExceeded(truncate(body));
        }
        return Error::RateLimited(truncate(body));
    }

    if quota_phrase {
        return Error::QuotaExceeded(truncate(body));
    }
    if lower.contains("rate") && lower.contains("limit") {
        return Error::RateLimited(truncate(body));
    }
    if status == 503
        || status == 502
        || status == 504
        || lower.contains("unavailable")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("overloaded")
    {
        return Error::Unavailable(truncate(body));
    }

    Error::Api(truncate(body))
}

/// Classify a reqwest transport failure. Timeouts and connection
/// errors count as unavailability so they trigger the fallback path.
#[must_use]
pub fn classify_transport_error(err: &reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() {
        Error::Unavailable(err.to_string())
    } else {
        Error::Api(err.to_string())
    }
}

fn truncate(msg: &str) -> String {
    const MAX: usize = 200;
    if msg.len() <= MAX {
        msg.to_string()
    } else {
        let mut end = MAX;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &msg[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_with_quota_phrase_is_quota() {
        let err = classify_http_error(429, "You exceeded your current quota");
        assert_eq!(err.kind(), ErrorKind::Quota);
    }

    #[test]
    fn test_429_without_quota_phrase_is_rate_limit() {
        let err = classify_http_error(429, "Too many requests, slow down");
        assert_eq!(err.kind(), ErrorKind::RateLimit);
    }

    #[test]
    fn test_resource_exhausted_is_quota() {
        let err = classify_http_error(400, "RESOURCE_EXHAUSTED: daily limit reached");
        assert_eq!(err.kind(), ErrorKind::Quota);
    }

    #[test]
    fn test_503_is_unavailable() {
        let err = classify_http_error(503, "Service Unavailable");
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_timeout_phrase_is_unavailable() {
        let err = classify_http_error(500, "upstream request timed out");
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_other_is_generic() {
        let err = classify_http_error(400, "invalid request body");
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_kinds() {
        assert!(Error::QuotaExceeded("q".into()).is_transient());
        assert!(Error::RateLimited("r".into()).is_transient());
        assert!(Error::Unavailable("u".into()).is_transient());
        assert!(!Error::SchemaValidation("s".into()).is_transient());
    }

    #[test]
    fn test_truncate_long_body() {
        let long = "x".repeat(500);
        let err = classify_http_error(400, &long);
        let msg = err.to_string();
        assert!(msg.len() < 300);
        assert!(msg.contains("..."));
    }
}
