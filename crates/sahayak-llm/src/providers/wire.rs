//! OpenAI-compatible wire types shared by the provider backends

use crate::error::{classify_http_error, classify_transport_error, Error, Result};
use crate::message::Message;
use crate::provider::CallOptions;
use crate::schema::StructuredSchema;
use crate::tools::{ToolCall, ToolDefinition, ToolResponse};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Serialize)]
pub(crate) struct ChatTool {
    pub r#type: String,
    pub function: ChatFunction,
}

#[derive(Serialize)]
pub(crate) struct ChatFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponseMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ChatToolCall {
    pub id: String,
    #[serde(default = "function_call_type")]
    pub r#type: String,
    pub function: ChatToolCallFunction,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ChatToolCallFunction {
    pub name: String,
    pub arguments: String,
}

fn function_call_type() -> String {
    "function".to_string()
}

#[derive(Serialize)]
pub(crate) struct EmbeddingsRequest {
    pub model: String,
    pub input: String,
}

#[derive(Deserialize)]
pub(crate) struct EmbeddingsResponse {
    pub data: Vec<EmbeddingsRecord>,
}

#[derive(Deserialize)]
pub(crate) struct EmbeddingsRecord {
    pub embedding: Vec<f32>,
}

pub(crate) fn convert_message(msg: &Message) -> ChatMessage {
    let tool_calls = if msg.tool_calls.is_empty() {
        None
    } else {
        Some(
            msg.tool_calls
                .iter()
                .map(|call| ChatToolCall {
                    id: call.id.clone(),
                    r#type: "function".to_string(),
                    function: ChatToolCallFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
        )
    };
    ChatMessage {
        role: msg.role.as_str().to_string(),
        content: msg.content.clone(),
        tool_call_id: msg.tool_call_id.clone(),
        name: msg.name.clone(),
        tool_calls,
    }
}

pub(crate) fn convert_tool(tool: &ToolDefinition) -> ChatTool {
    ChatTool {
        r#type: "function".to_string(),
        function: ChatFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// Thin client over one OpenAI-compatible endpoint.
pub(crate) struct CompatClient {
    http: Client,
    base_url: String,
    api_key: String,
    /// Maps raw generic error text to a safe user-facing message.
    sanitize: fn(&str) -> String,
}

impl CompatClient {
    pub(crate) fn new(
        http: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        sanitize: fn(&str) -> String,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            sanitize,
        }
    }

    /// POST /chat/completions, classifying failures before sanitizing.
    pub(crate) async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        debug!(model = %request.model, "sending chat completion request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Classification inspects the raw body; only the generic
            // variant keeps body text, and that gets sanitized.
            return Err(match classify_http_error(status.as_u16(), &body) {
                Error::Api(raw) => Error::Api((self.sanitize)(&raw)),
                classified => classified,
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    /// POST /embeddings.
    pub(crate) async fn embeddings(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingsRequest {
            model: model.to_string(),
            input: text.to_string(),
        };

        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match classify_http_error(status.as_u16(), &body) {
                Error::Api(raw) => Error::Api((self.sanitize)(&raw)),
                classified => classified,
            });
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|r| r.embedding)
            .ok_or_else(|| Error::InvalidResponse("no embedding in response".to_string()))
    }

    /// Plain text completion.
    pub(crate) async fn complete_text(
        &self,
        model: &str,
        messages: &[Message],
        opts: CallOptions,
        default_temperature: f32,
        default_max_tokens: u32,
    ) -> Result<String> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.iter().map(convert_message).collect(),
            max_tokens: Some(opts.max_tokens.unwrap_or(default_max_tokens)),
            temperature: Some(opts.temperature.unwrap_or(default_temperature)),
            tools: None,
            tool_choice: None,
        };

        let response = self.chat(&request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("no choices in response".to_string()))?;
        Ok(choice.message.content.unwrap_or_default())
    }

    /// Completion with tools bound.
    pub(crate) async fn complete_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        opts: CallOptions,
        default_temperature: f32,
        default_max_tokens: u32,
    ) -> Result<ToolResponse> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.iter().map(convert_message).collect(),
            max_tokens: Some(opts.max_tokens.unwrap_or(default_max_tokens)),
            temperature: Some(opts.temperature.unwrap_or(default_temperature)),
            tools: Some(tools.iter().map(convert_tool).collect()),
            tool_choice: Some(serde_json::json!("auto")),
        };

        let response = self.chat(&request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("no choices in response".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ToolResponse {
            content: choice.message.content,
            tool_calls,
        })
    }

    /// Structured output via a forced function call.
    ///
    /// The schema is presented as the only tool with `tool_choice`
    /// pinned to it; the returned arguments are parsed and validated
    /// against the declared field set, with one retry on validation
    /// failure before the error surfaces to the fallback loop.
    pub(crate) async fn structured_output(
        &self,
        model: &str,
        messages: &[Message],
        schema: &StructuredSchema,
        opts: CallOptions,
        default_max_tokens: u32,
    ) -> Result<serde_json::Value> {
        let mut last_err = None;
        for attempt in 0..2 {
            match self
                .structured_output_once(model, messages, schema, opts, default_max_tokens)
                .await
            {
                Ok(value) => return Ok(value),
                Err(e @ (Error::SchemaValidation(_) | Error::InvalidResponse(_))) => {
                    debug!(attempt, error = %e, "structured output failed validation");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::InvalidResponse("structured output failed".to_string())))
    }

    async fn structured_output_once(
        &self,
        model: &str,
        messages: &[Message],
        schema: &StructuredSchema,
        opts: CallOptions,
        default_max_tokens: u32,
    ) -> Result<serde_json::Value> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.iter().map(convert_message).collect(),
            max_tokens: Some(opts.max_tokens.unwrap_or(default_max_tokens)),
            // Classification calls are deterministic unless overridden.
            temperature: Some(opts.temperature.unwrap_or(0.0)),
            tools: Some(vec![ChatTool {
                r#type: "function".to_string(),
                function: ChatFunction {
                    name: schema.name.clone(),
                    description: schema.description.clone(),
                    parameters: schema.to_json_schema(),
                },
            }]),
            tool_choice: Some(serde_json::json!({
                "type": "function",
                "function": {"name": schema.name}
            })),
        };

        let response = self.chat(&request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("no choices in response".to_string()))?;

        let call = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::InvalidResponse("model did not produce the requested function call".to_string())
            })?;

        let value: serde_json::Value = serde_json::from_str(&call.function.arguments)
            .map_err(|e| Error::InvalidResponse(format!("malformed arguments: {e}")))?;

        schema.validate(&value)?;
        Ok(value)
    }
}
