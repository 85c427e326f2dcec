//! Sahayak LLM - Provider Abstraction and Fallback Manager
//!
//! This crate provides the LLM layer for Sahayak:
//! - Provider: trait definition shared by all backends
//! - Manager: priority-ordered invocation with automatic fallback
//! - Health: per-provider counters and circuit breaking
//! - OpenAI: primary provider (GPT family)
//! - Groq: fast free-tier fallback (Llama family)
//! - Gemini: last-resort fallback via the OpenAI-compatible endpoint

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod health;
pub mod manager;
pub mod message;
pub mod provider;
pub mod providers;
pub mod schema;
pub mod tools;

pub use error::{classify_http_error, Error, ErrorKind, Result};
pub use health::{CooldownPolicy, ProviderHealth, ProviderStats};
pub use manager::{FallbackResponse, LlmRequest, ManagerStats, Payload, ProviderManager};
pub use message::{Message, MessageRole};
pub use provider::{CallOptions, LlmProvider};
pub use schema::{FieldKind, SchemaField, StructuredSchema};
pub use tools::{ToolCall, ToolDefinition, ToolResponse};

// Re-export provider types
pub use providers::gemini::{GeminiConfig, GeminiProvider};
pub use providers::groq::{groq_cooldowns, GroqConfig, GroqProvider};
pub use providers::openai::{OpenAiConfig, OpenAiProvider};
