//! Query orchestration for Sahayak
//!
//! Classifies an incoming banking question, runs the matching
//! answering pipeline (operational-data lookups, retrieval-augmented
//! generation, or both merged), and returns a natural-language answer
//! with routing and provenance metadata. Every internal failure is
//! converted into a soft result; nothing past the `Agent` entry point
//! ever surfaces a raw error to the caller.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod prompts;
pub mod rag;
pub mod router;
pub mod state;

pub use agent::Agent;
pub use config::Settings;
pub use error::{Error, Result};
pub use executor::{ApiExecutor, ExecutorResult};
pub use rag::RagLoop;
pub use router::QueryRouter;
pub use state::{ChatRole, ChatTurn, ConversationState, Datasource, QueryResponse, RouteDecision};
