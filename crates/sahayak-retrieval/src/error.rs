//! Retrieval error types

use thiserror::Error;

/// Errors raised by a vector search backend.
///
/// The gateway absorbs these into empty result sets; they only
/// surface to callers of the raw [`crate::VectorSearch`] trait.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend is unreachable or timed out
    #[error("search backend unavailable: {0}")]
    Backend(String),

    /// Backend returned a malformed hit
    #[error("invalid search result: {0}")]
    InvalidResult(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
