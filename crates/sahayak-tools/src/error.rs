//! Tool layer error types

use thiserror::Error;

/// Errors from the banking data client.
///
/// Tools convert these into descriptive strings at the execution
/// boundary; they never propagate past a tool call.
#[derive(Debug, Error)]
pub enum Error {
    /// Client configuration is incomplete
    #[error("banking API not configured: {0}")]
    NotConfigured(String),

    /// Request failed at the transport layer
    #[error("banking API request failed: {0}")]
    Request(String),

    /// Backend returned a non-success status
    #[error("banking API returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Response body did not parse as expected
    #[error("unexpected banking API response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
