//! Core orchestration errors
//!
//! These only surface at construction time. Once a query is running,
//! every component absorbs its own failures into soft results.

use thiserror::Error;

/// Errors from building the orchestration stack.
#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration is missing or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider layer failed during setup
    #[error(transparent)]
    Llm(#[from] sahayak_llm::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
