//! Gemini - last-resort fallback
//!
//! Uses Google's OpenAI-compatibility endpoint. Gemini reports quota
//! exhaustion as RESOURCE_EXHAUSTED, which the shared classifier maps
//! to a quota failure.

use super::mask_api_key;
use super::wire::CompatClient;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::{CallOptions, LlmProvider};
use crate::schema::StructuredSchema;
use crate::tools::{ToolDefinition, ToolResponse};
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Gemini OpenAI-compatibility base URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default embeddings model
pub const DEFAULT_EMBEDDINGS_MODEL: &str = "text-embedding-004";

/// Gemini provider configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: String,
    /// Chat model
    pub model: String,
    /// Embeddings model
    pub embeddings_model: String,
    /// Priority rank (lower = tried first)
    pub priority: u8,
    /// Default sampling temperature
    pub temperature: f32,
    /// Default completion token cap
    pub max_tokens: u32,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
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
        || lower.contains("permission")
    {
        return "API authentication error. Please check your GEMINI_API_KEY.".to_string();
    }
    if lower.contains("internal") || lower.contains("server error") {
        return "Gemini server error. Please try again later.".to_string();
    }
    if error.len() < 200 && !error.contains("AIza") {
        return error.to_string();
    }
    "An API error occurred. Please try again.".to_string()
}

impl GeminiConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embeddings_model: DEFAULT_EMBEDDINGS_MODEL.to_string(),
            priority: 3,
            temperature: 0.1,
            max_tokens: 2000,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| Error::NotConfigured("GEMINI_API_KEY not set".to_string()))?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
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

/// Gemini provider (via the OpenAI-compatibility endpoint)
pub struct GeminiProvider {
    client: CompatClient,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(config: GeminiConfig) -> Result<Self> {
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
        Self::new(GeminiConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn priority(&self) -> u8 {
        self.config.priority
    }

    #[instrument(skip(self, messages), fields(provider = "gemini"))]
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

    #[instrument(skip(self, messages, tools), fields(provider = "gemini", tools = tools.len()))]
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

    #[instrument(skip(self, messages, schema), fields(provider = "gemini", schema = %schema.name))]
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

    #[instrument(skip(self, text), fields(provider = "gemini"))]
    async fn get_embeddings(&self, text: &str) -> Result<Vec<f32>> {
        self.client
            .embeddings(&self.config.embeddings_model, text)
            .await
    }
}
