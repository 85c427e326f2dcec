//! Retrieval gateway for Sahayak
//!
//! Wraps a vector similarity search backend behind a narrow trait and
//! converts raw hits into ranked [`RetrievedDocument`]s. Backend
//! outages are absorbed into empty result sets so the answering
//! pipeline never has to handle retrieval errors inline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod document;
pub mod error;
pub mod gateway;
pub mod memory;

pub use document::{RetrievedDocument, SearchHit};
pub use error::{Error, Result};
pub use gateway::{RetrievalGateway, VectorSearch};
pub use memory::InMemoryIndex;
