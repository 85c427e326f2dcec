//! Provider trait definition
//!
//! All four operations go through the `ProviderManager`; nothing in
//! the pipeline talks to a vendor SDK directly.

use crate::error::Result;
use crate::message::Message;
use crate::schema::StructuredSchema;
use crate::tools::{ToolDefinition, ToolResponse};

/// Per-call options forwarded to the provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Sampling temperature override (provider default when `None`)
    pub temperature: Option<f32>,
    /// Completion token cap override
    pub max_tokens: Option<u32>,
}

impl CallOptions {
    /// Set a temperature override
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g. "openai", "groq", "gemini")
    fn name(&self) -> &str;

    /// Model identifier this provider dispatches to
    fn model(&self) -> &str;

    /// Priority rank; lower is tried first
    fn priority(&self) -> u8;

    /// Complete a conversation, returning plain text
    async fn invoke(&self, messages: &[Message], opts: CallOptions) -> Result<String>;

    /// Complete a conversation with tools bound
    async fn invoke_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        opts: CallOptions,
    ) -> Result<ToolResponse>;

    /// Produce a schema-validated structured object.
    ///
    /// Implementations validate against the declared field set and
    /// retry once on validation failure before surfacing the error.
    async fn get_structured_output(
        &self,
        messages: &[Message],
        schema: &StructuredSchema,
        opts: CallOptions,
    ) -> Result<serde_json::Value>;

    /// Generate an embedding vector for a text
    async fn get_embeddings(&self, text: &str) -> Result<Vec<f32>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_builder_chains_from_default() {
        let opts = CallOptions::default().with_temperature(0.7);
        assert_eq!(opts.temperature, Some(0.7));
        assert_eq!(opts.max_tokens, None);
    }
}
