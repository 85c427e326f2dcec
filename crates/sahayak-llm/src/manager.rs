//! Provider manager with automatic fallback
//!
//! Tries providers in priority order until one succeeds. Unhealthy
//! providers (open circuit, high error rate) are skipped outright;
//! classified failures from a healthy provider advance the loop to
//! the next one. Exhaustion of every provider is the only hard
//! failure mode.

use crate::error::{Error, Result};
use crate::health::{CooldownPolicy, ProviderHealth, ProviderStats};
use crate::message::Message;
use crate::provider::{CallOptions, LlmProvider};
use crate::schema::StructuredSchema;
use crate::tools::{ToolDefinition, ToolResponse};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// One request through the fallback loop.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Structured output schema; takes precedence over tools
    pub schema: Option<StructuredSchema>,
    /// Tools to bind; takes precedence over plain invocation
    pub tools: Option<Vec<ToolDefinition>>,
    /// Per-call options
    pub opts: CallOptions,
}

impl LlmRequest {
    /// Plain text completion request
    #[must_use]
    pub fn text(messages: Vec<Message>) -> Self {
        Self {
            messages,
            schema: None,
            tools: None,
            opts: CallOptions::default(),
        }
    }

    /// Structured output request
    #[must_use]
    pub fn structured(messages: Vec<Message>, schema: StructuredSchema) -> Self {
        Self {
            messages,
            schema: Some(schema),
            tools: None,
            opts: CallOptions::default(),
        }
    }

    /// Tool-calling request
    #[must_use]
    pub fn with_tools(messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            messages,
            schema: None,
            tools: Some(tools),
            opts: CallOptions::default(),
        }
    }

    /// Override the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.opts.temperature = Some(temperature);
        self
    }
}

/// What the serving provider returned.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Plain text completion
    Text(String),
    /// Schema-validated structured object
    Structured(serde_json::Value),
    /// Response with optional tool calls
    ToolUse(ToolResponse),
}

impl Payload {
    /// Extract the text variant
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(Error::InvalidResponse(format!(
                "expected text payload, got {other:?}"
            ))),
        }
    }

    /// Extract the structured variant
    pub fn into_structured(self) -> Result<serde_json::Value> {
        match self {
            Self::Structured(value) => Ok(value),
            other => Err(Error::InvalidResponse(format!(
                "expected structured payload, got {other:?}"
            ))),
        }
    }

    /// Extract the tool-use variant
    pub fn into_tool_response(self) -> Result<ToolResponse> {
        match self {
            Self::ToolUse(response) => Ok(response),
            other => Err(Error::InvalidResponse(format!(
                "expected tool payload, got {other:?}"
            ))),
        }
    }
}

/// A successful invocation, tagged with the provider that served it.
#[derive(Debug, Clone)]
pub struct FallbackResponse {
    /// The returned payload
    pub payload: Payload,
    /// Name of the serving provider
    pub provider: String,
    /// Model that produced the response
    pub model: String,
}

/// Aggregate manager statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    /// Total requests through the fallback loop
    pub total_requests: u64,
    /// Requests that got a response from some provider
    pub successful_requests: u64,
    /// Requests where every provider failed
    pub failed_requests: u64,
    /// Successes served by a non-primary provider
    pub fallback_count: u64,
}

struct ManagedProvider {
    provider: Arc<dyn LlmProvider>,
    stats: ProviderStats,
}

/// Priority-ordered collection of providers with fallback execution.
pub struct ProviderManager {
    providers: Vec<ManagedProvider>,
    min_priority: u8,
    enable_fallback: bool,

    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    fallback_count: AtomicU64,
}

impl ProviderManager {
    /// Create a manager over the given providers with default
    /// cooldown policy. Fails fast when no provider is configured.
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, enable_fallback: bool) -> Result<Self> {
        let parts = providers
            .into_iter()
            .map(|p| (p, CooldownPolicy::default()))
            .collect();
        Self::with_cooldowns(parts, enable_fallback)
    }

    /// Create a manager with a per-provider cooldown policy.
    pub fn with_cooldowns(
        providers: Vec<(Arc<dyn LlmProvider>, CooldownPolicy)>,
        enable_fallback: bool,
    ) -> Result<Self> {
        if providers.is_empty() {
            return Err(Error::NotConfigured(
                "at least one LLM provider is required".to_string(),
            ));
        }

        let mut managed: Vec<ManagedProvider> = providers
            .into_iter()
            .map(|(provider, cooldowns)| {
                let stats = ProviderStats::new(provider.name().to_string(), cooldowns);
                ManagedProvider { provider, stats }
            })
            .collect();
        // Priority ordering is fixed for the lifetime of the manager.
        managed.sort_by_key(|mp| mp.provider.priority());
        let min_priority = managed[0].provider.priority();

        for mp in &managed {
            info!(
                provider = mp.provider.name(),
                priority = mp.provider.priority(),
                model = mp.provider.model(),
                "registered provider"
            );
        }

        Ok(Self {
            providers: managed,
            min_priority,
            enable_fallback,
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            fallback_count: AtomicU64::new(0),
        })
    }

    /// Invoke with automatic fallback across providers.
    ///
    /// Dispatch precedence: structured output > tool calling > plain
    /// invocation. Returns the first healthy provider's result,
    /// tagged with its name and model.
    pub async fn invoke_with_fallback(&self, request: &LlmRequest) -> Result<FallbackResponse> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut errors: Vec<String> = Vec::new();
        let mut tried: Vec<String> = Vec::new();

        for mp in &self.providers {
            let name = mp.provider.name().to_string();

            if !mp.stats.is_healthy() {
                warn!(provider = %name, "skipping unhealthy provider");
                errors.push(format!("{name}: unhealthy (circuit breaker open)"));
                continue;
            }

            tried.push(name.clone());
            mp.stats.record_request();

            let result = if let Some(schema) = &request.schema {
                mp.provider
                    .get_structured_output(&request.messages, schema, request.opts)
                    .await
                    .map(Payload::Structured)
            } else if let Some(tools) = &request.tools {
                mp.provider
                    .invoke_with_tools(&request.messages, tools, request.opts)
                    .await
                    .map(Payload::ToolUse)
            } else {
                mp.provider
                    .invoke(&request.messages, request.opts)
                    .await
                    .map(Payload::Text)
            };

            match result {
                Ok(payload) => {
                    mp.stats.record_success();
                    self.successful_requests.fetch_add(1, Ordering::Relaxed);

                    if mp.provider.priority() != self.min_priority {
                        let total = self.fallback_count.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            provider = %name,
                            total_fallbacks = total,
                            "fallback succeeded on non-primary provider"
                        );
                    } else {
                        info!(provider = %name, "primary provider succeeded");
                    }

                    return Ok(FallbackResponse {
                        payload,
                        provider: name,
                        model: mp.provider.model().to_string(),
                    });
                }
                Err(e) => {
                    mp.stats.record_error(&e);
                    errors.push(format!("{name}: {e}"));

                    if !self.enable_fallback {
                        warn!(provider = %name, error = %e, "fallback disabled, propagating");
                        self.failed_requests.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                    warn!(provider = %name, error = %e, "provider failed, trying next");
                }
            }
        }

        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        let tried_list = if tried.is_empty() {
            "none".to_string()
        } else {
            tried.join(", ")
        };
        warn!(tried = %tried_list, "all providers failed");

        Err(Error::AllProvidersFailed {
            count: self.providers.len(),
            tried: tried_list,
            last_error: errors.last().cloned().unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Plain text completion through the fallback loop.
    pub async fn invoke(&self, messages: Vec<Message>, opts: CallOptions) -> Result<FallbackResponse> {
        let mut request = LlmRequest::text(messages);
        request.opts = opts;
        self.invoke_with_fallback(&request).await
    }

    /// Structured output through the fallback loop.
    pub async fn get_structured_output(
        &self,
        messages: Vec<Message>,
        schema: StructuredSchema,
        opts: CallOptions,
    ) -> Result<FallbackResponse> {
        let mut request = LlmRequest::structured(messages, schema);
        request.opts = opts;
        self.invoke_with_fallback(&request).await
    }

    /// Tool-calling invocation through the fallback loop.
    pub async fn invoke_with_tools(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        opts: CallOptions,
    ) -> Result<FallbackResponse> {
        let mut request = LlmRequest::with_tools(messages, tools);
        request.opts = opts;
        self.invoke_with_fallback(&request).await
    }

    /// Embeddings through the same skip-unhealthy/try-next policy.
    pub async fn get_embeddings(&self, text: &str) -> Result<Vec<f32>> {
        let mut errors: Vec<String> = Vec::new();
        let mut tried: Vec<String> = Vec::new();

        for mp in &self.providers {
            let name = mp.provider.name().to_string();
            if !mp.stats.is_healthy() {
                errors.push(format!("{name}: unhealthy (circuit breaker open)"));
                continue;
            }

            tried.push(name.clone());
            mp.stats.record_request();
            match mp.provider.get_embeddings(text).await {
                Ok(vector) => {
                    mp.stats.record_success();
                    return Ok(vector);
                }
                // Missing capability should not poison health accounting.
                Err(e @ Error::NotSupported { .. }) => {
                    mp.stats.record_success();
                    errors.push(format!("{name}: {e}"));
                }
                Err(e) => {
                    mp.stats.record_error(&e);
                    errors.push(format!("{name}: {e}"));
                    if !self.enable_fallback {
                        return Err(e);
                    }
                }
            }
        }

        Err(Error::AllProvidersFailed {
            count: self.providers.len(),
            tried: if tried.is_empty() {
                "none".to_string()
            } else {
                tried.join(", ")
            },
            last_error: errors.last().cloned().unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Names of registered providers in priority order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|mp| mp.provider.name()).collect()
    }

    /// Health snapshots for all providers.
    #[must_use]
    pub fn get_health_stats(&self) -> Vec<ProviderHealth> {
        self.providers
            .iter()
            .map(|mp| {
                mp.stats
                    .snapshot(mp.provider.model(), mp.provider.priority())
            })
            .collect()
    }

    /// Aggregate call statistics.
    #[must_use]
    pub fn get_manager_stats(&self) -> ManagerStats {
        ManagerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            fallback_count: self.fallback_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    enum Behavior {
        Succeed(&'static str),
        FailQuota,
        FailRateLimit,
        FailUnavailable,
        FailGeneric,
    }

    struct MockProvider {
        name: &'static str,
        priority: u8,
        behavior: Behavior,
        calls: AtomicU64,
    }

    impl MockProvider {
        fn new(name: &'static str, priority: u8, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority,
                behavior,
                calls: AtomicU64::new(0),
            })
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::Relaxed)
        }

        fn respond(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match self.behavior {
                Behavior::Succeed(text) => Ok(text.to_string()),
                Behavior::FailQuota => Err(Error::QuotaExceeded("quota".into())),
                Behavior::FailRateLimit => Err(Error::RateLimited("rate".into())),
                Behavior::FailUnavailable => Err(Error::Unavailable("503".into())),
                Behavior::FailGeneric => Err(Error::Api("boom".into())),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn model(&self) -> &str {
            "mock-model"
        }
        fn priority(&self) -> u8 {
            self.priority
        }
        async fn invoke(&self, _messages: &[Message], _opts: CallOptions) -> Result<String> {
            self.respond()
        }
        async fn invoke_with_tools(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _opts: CallOptions,
        ) -> Result<ToolResponse> {
            self.respond().map(|text| ToolResponse {
                content: Some(text),
                tool_calls: vec![],
            })
        }
        async fn get_structured_output(
            &self,
            _messages: &[Message],
            _schema: &StructuredSchema,
            _opts: CallOptions,
        ) -> Result<serde_json::Value> {
            self.respond()
                .map(|text| serde_json::json!({"marker": text}))
        }
        async fn get_embeddings(&self, _text: &str) -> Result<Vec<f32>> {
            self.respond().map(|_| vec![0.1, 0.2])
        }
    }

    fn request() -> LlmRequest {
        LlmRequest::text(vec![Message::user("hello")])
    }

    #[tokio::test]
    async fn test_primary_success_no_fallback() {
        let primary = MockProvider::new("primary", 1, Behavior::Succeed("answer"));
        let backup = MockProvider::new("backup", 2, Behavior::Succeed("backup answer"));
        let manager =
            ProviderManager::new(vec![primary.clone(), backup.clone()], true).unwrap();

        let resp = manager.invoke_with_fallback(&request()).await.unwrap();
        assert_eq!(resp.provider, "primary");
        assert_eq!(backup.calls(), 0);
        assert_eq!(manager.get_manager_stats().fallback_count, 0);
    }

    #[tokio::test]
    async fn test_fallback_to_next_provider_increments_counter() {
        let primary = MockProvider::new("primary", 1, Behavior::FailQuota);
        let backup = MockProvider::new("backup", 2, Behavior::Succeed("from backup"));
        let manager =
            ProviderManager::new(vec![primary.clone(), backup.clone()], true).unwrap();

        let resp = manager.invoke_with_fallback(&request()).await.unwrap();
        assert_eq!(resp.provider, "backup");
        assert!(matches!(resp.payload, Payload::Text(ref t) if t == "from backup"));
        assert_eq!(manager.get_manager_stats().fallback_count, 1);
    }

    #[tokio::test]
    async fn test_two_failures_then_third_succeeds() {
        let p1 = MockProvider::new("p1", 1, Behavior::FailQuota);
        let p2 = MockProvider::new("p2", 2, Behavior::FailRateLimit);
        let p3 = MockProvider::new("p3", 3, Behavior::Succeed("third"));
        let manager = ProviderManager::new(vec![p1.clone(), p2.clone(), p3.clone()], true).unwrap();

        let resp = manager.invoke_with_fallback(&request()).await.unwrap();
        assert_eq!(resp.provider, "p3");
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 1);
        assert_eq!(manager.get_manager_stats().fallback_count, 1);
    }

    #[tokio::test]
    async fn test_all_providers_fail_raises_aggregate() {
        let p1 = MockProvider::new("p1", 1, Behavior::FailQuota);
        let p2 = MockProvider::new("p2", 2, Behavior::FailUnavailable);
        let manager = ProviderManager::new(vec![p1, p2], true).unwrap();

        let err = manager.invoke_with_fallback(&request()).await.unwrap_err();
        match err {
            Error::AllProvidersFailed { count, tried, .. } => {
                assert_eq!(count, 2);
                assert!(tried.contains("p1"));
                assert!(tried.contains("p2"));
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
        assert_eq!(manager.get_manager_stats().failed_requests, 1);
    }

    #[tokio::test]
    async fn test_fallback_disabled_propagates_first_error() {
        let p1 = MockProvider::new("p1", 1, Behavior::FailRateLimit);
        let p2 = MockProvider::new("p2", 2, Behavior::Succeed("never reached"));
        let manager = ProviderManager::new(vec![p1, p2.clone()], false).unwrap();

        let err = manager.invoke_with_fallback(&request()).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
        assert_eq!(p2.calls(), 0);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_provider_entirely() {
        let p1 = MockProvider::new("p1", 1, Behavior::FailQuota);
        let p2 = MockProvider::new("p2", 2, Behavior::Succeed("served"));
        let manager = ProviderManager::new(vec![p1.clone(), p2], true).unwrap();

        // First call trips p1's breaker.
        manager.invoke_with_fallback(&request()).await.unwrap();
        assert_eq!(p1.calls(), 1);

        // Second call must not touch p1 while the circuit is open.
        let resp = manager.invoke_with_fallback(&request()).await.unwrap();
        assert_eq!(p1.calls(), 1);
        assert_eq!(resp.provider, "p2");
    }

    #[tokio::test]
    async fn test_priority_ordering_is_respected() {
        // Registered out of order; priority decides attempt order.
        let low = MockProvider::new("low", 5, Behavior::Succeed("low"));
        let high = MockProvider::new("high", 1, Behavior::Succeed("high"));
        let manager = ProviderManager::new(vec![low, high], true).unwrap();

        let resp = manager.invoke_with_fallback(&request()).await.unwrap();
        assert_eq!(resp.provider, "high");
        assert_eq!(manager.provider_names(), vec!["high", "low"]);
    }

    #[tokio::test]
    async fn test_structured_takes_precedence_over_tools() {
        let p = MockProvider::new("p", 1, Behavior::Succeed("ok"));
        let manager = ProviderManager::new(vec![p], true).unwrap();

        let schema = StructuredSchema::new("s", "test schema");
        let mut req = LlmRequest::structured(vec![Message::user("q")], schema);
        req.tools = Some(vec![ToolDefinition::new("t", "tool", serde_json::json!({}))]);

        let resp = manager.invoke_with_fallback(&req).await.unwrap();
        assert!(matches!(resp.payload, Payload::Structured(_)));
    }

    #[tokio::test]
    async fn test_generic_error_still_falls_back() {
        let p1 = MockProvider::new("p1", 1, Behavior::FailGeneric);
        let p2 = MockProvider::new("p2", 2, Behavior::Succeed("rescued"));
        let manager = ProviderManager::new(vec![p1, p2], true).unwrap();

        let resp = manager.invoke_with_fallback(&request()).await.unwrap();
        assert_eq!(resp.provider, "p2");
    }

    #[tokio::test]
    async fn test_embeddings_fallback() {
        let p1 = MockProvider::new("p1", 1, Behavior::FailUnavailable);
        let p2 = MockProvider::new("p2", 2, Behavior::Succeed("vec"));
        let manager = ProviderManager::new(vec![p1, p2], true).unwrap();

        let vector = manager.get_embeddings("text").await.unwrap();
        assert_eq!(vector.len(), 2);
    }

    #[test]
    fn test_empty_provider_list_rejected() {
        let result = ProviderManager::new(vec![], true);
        assert!(matches!(result, Err(Error::NotConfigured(_))));
    }

    #[test]
    fn test_payload_accessors() {
        let text = Payload::Text("hi".into()).into_text().unwrap();
        assert_eq!(text, "hi");
        assert!(Payload::Text("hi".into()).into_structured().is_err());
    }
}
