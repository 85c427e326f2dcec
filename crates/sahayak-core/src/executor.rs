//! Operational-data execution
//!
//! Runs a tool-calling loop against the provider manager: the model
//! picks lookups, the registry executes them, and the resulting tool
//! outputs feed the next round until the model answers in plain text
//! or the round budget runs out.

use crate::prompts::api_executor_prompt;
use sahayak_llm::{CallOptions, Message, ProviderManager};
use sahayak_tools::ToolRegistry;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Source marker recorded when operational data contributed.
pub const API_SOURCE: &str = "API Data";

const MAX_TOOL_ROUNDS: usize = 4;
const EXECUTOR_TEMPERATURE: f32 = 0.1;

/// Outcome of one executor run.
#[derive(Debug, Clone)]
pub struct ExecutorResult {
    /// Assembled answer text, when any round produced one
    pub context: Option<String>,
    /// Whether usable data was obtained
    pub success: bool,
}

/// Tool-calling executor over the banking lookups.
pub struct ApiExecutor {
    manager: Arc<ProviderManager>,
    registry: Arc<ToolRegistry>,
}

impl ApiExecutor {
    /// Create an executor over a provider manager and tool registry.
    pub fn new(manager: Arc<ProviderManager>, registry: Arc<ToolRegistry>) -> Self {
        Self { manager, registry }
    }

    /// Answer a query from operational data.
    ///
    /// Failures never propagate; an unusable run comes back as
    /// `success: false` with no context.
    #[instrument(skip(self, sub_queries))]
    pub async fn execute(&self, query: &str, sub_queries: &[String]) -> ExecutorResult {
        let mut messages = vec![Message::user(api_executor_prompt(query, sub_queries))];
        let tools = self.registry.definitions();
        let opts = CallOptions::default().with_temperature(EXECUTOR_TEMPERATURE);
        let mut tool_outputs: Vec<String> = Vec::new();

        for round in 0..MAX_TOOL_ROUNDS {
            let response = match self
                .manager
                .invoke_with_tools(messages.clone(), tools.clone(), opts)
                .await
                .and_then(|resp| resp.payload.into_tool_response())
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, round, "executor provider call failed");
                    return ExecutorResult {
                        context: None,
                        success: false,
                    };
                }
            };

            if response.tool_calls.is_empty() {
                let text = response.content.unwrap_or_default();
                if text.is_empty() {
                    return ExecutorResult {
                        context: None,
                        success: false,
                    };
                }
                info!(rounds = round, "executor answered");
                // Any successful lookup counts as partial success,
                // and so does a direct answer without tools.
                return ExecutorResult {
                    context: Some(text),
                    success: true,
                };
            }

            messages.push(Message::assistant_with_tool_calls(
                response.content.unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let args: serde_json::Value =
                    serde_json::from_str(&call.arguments).unwrap_or(serde_json::json!({}));
                let output = self.registry.execute(&call.name, args).await;
                if !output.starts_with("Error") {
                    tool_outputs.push(output.clone());
                }
                info!(tool = %call.name, "tool executed");
                messages.push(Message::tool_response(call.id.clone(), output));
            }
        }

        warn!("executor hit tool round limit without a final answer");
        // Any successful lookup still counts as partial success; hand
        // the raw tool outputs over instead of dropping them.
        if tool_outputs.is_empty() {
            ExecutorResult {
                context: None,
                success: false,
            }
        } else {
            ExecutorResult {
                context: Some(tool_outputs.join("\n\n")),
                success: true,
            }
        }
    }
}
