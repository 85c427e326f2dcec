//! Groq - fast free-tier fallback
//!
//! Free tier allows 30 requests per minute, so quota failures here get
//! a longer cooldown than the default. No embeddings endpoint.

use super::mask_api_key;
use super::wire::CompatClient;
use crate::error::{Error, Result};
use crate::health::CooldownPolicy;
use crate::message::Message;
use crate::provider::{CallOptions, LlmProvider};
use crate::schema::StructuredSchema;
use crate::tools::{ToolDefinition, ToolResponse};
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Groq API base URL (OpenAI-compatible)
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Default Groq model (free, fast, capable)
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Groq provider configuration
#[derive(Clone)]
pub struct GroqConfig {
    /// API key
    pub api_key: String,
    /// Base URL (usually not needed)
    pub base_url: String,
    /// Chat model
    pub model: String,
    /// Priority rank (lower = tried first)
    pub priority: u8,
    /// Default sampling temperature
    pub temperature: f32,
    /// Default completion token cap
    pub max_tokens: u32,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for GroqConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroqConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "API authentication error. Please check your GROQ_API_KEY.".to_string();
    }
    if lower.contains("internal") || lower.contains("server error") {
        return "Groq server error. Please try again later.".to_string();
    }
    if error.len() < 200 && !error.contains("gsk_") {
        return error.to_string();
    }
    "An API error occurred. Please try again.".to_string()
}

impl GroqConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GROQ_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            priority: 2,
            temperature: 0.1,
            max_tokens: 2000,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| Error::NotConfigured("GROQ_API_KEY not set".to_string()))?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GROQ_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    /// Set the chat model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the priority rank
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Cooldown policy for Groq's free tier.
///
/// Rate limits reset every minute; daily-quota failures take longer.
#[must_use]
pub fn groq_cooldowns() -> CooldownPolicy {
    CooldownPolicy {
        quota: Duration::from_secs(180),
        rate_limit: Duration::from_secs(60),
    }
}

/// Groq provider (OpenAI-compatible)
pub struct GroqProvider {
    client: CompatClient,
    config: GroqConfig,
}

impl GroqProvider {
    /// Create a new Groq provider
    pub fn new(config: GroqConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::NotConfigured(format!("http client: {e}")))?;
        let client = CompatClient::new(
            http,
            config.base_url.clone(),
            config.api_key.clone(),
            sanitize_api_error,
        );
        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GroqConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl LlmProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn priority(&self) -> u8 {
        self.config.priority
    }

    #[instrument(skip(self, messages), fields(provider = "groq"))]
    async fn invoke(&self, messages: &[Message], opts: CallOptions) -> Result<String> {
        self.client
            .complete_text(
                &self.config.model,
                messages,
                opts,
                self.config.temperature,
                self.config.max_tokens,
            )
            .await
    }

    #[instrument(skip(self, messages, tools), fields(provider = "groq", tools = tools.len()))]
    async fn invoke_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        opts: CallOptions,
    ) -> Result<ToolResponse> {
        self.client
            .complete_with_tools(
                &self.config.model,
                messages,
                tools,
                opts,
                self.config.temperature,
                self.config.max_tokens,
            )
            .await
    }

    #[instrument(skip(self, messages, schema), fields(provider = "groq", schema = %schema.name))]
    async fn get_structured_output(
        &self,
        messages: &[Message],
        schema: &StructuredSchema,
        opts: CallOptions,
    ) -> Result<serde_json::Value> {
        self.client
            .structured_output(
                &self.config.model,
                messages,
                schema,
                opts,
                self.config.max_tokens,
            )
            .await
    }

    async fn get_embeddings(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::NotSupported {
            provider: "groq".to_string(),
            capability: "embeddings".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = GroqConfig::new("test-key")
            .with_model("llama-3.1-8b-instant")
            .with_timeout(Duration::from_secs(30));

        assert_eq!(config.model, "llama-3.1-8b-instant");
        assert_eq!(config.priority, 2);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_sanitize_hides_key_material() {
        let sanitized = sanitize_api_error("Invalid API key: gsk_1234567890");
        assert!(!sanitized.contains("gsk_"));
        assert!(sanitized.contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_groq_cooldowns() {
        let policy = groq_cooldowns();
        assert_eq!(policy.quota, Duration::from_secs(180));
        assert_eq!(policy.rate_limit, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_embeddings_not_supported() {
        let provider = GroqProvider::new(GroqConfig::new("test-key")).unwrap();
        let err = provider.get_embeddings("hello").await.unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));
    }
}
