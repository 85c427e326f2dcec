//! Query routing

use crate::prompts::ROUTER_SYSTEM_PROMPT;
use crate::state::{Datasource, RouteDecision};
use sahayak_llm::{
    CallOptions, FieldKind, Message, ProviderManager, SchemaField, StructuredSchema,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Classifies queries into api / rag / hybrid via structured output.
pub struct QueryRouter {
    manager: Arc<ProviderManager>,
}

fn route_schema() -> StructuredSchema {
    StructuredSchema::new(
        "route_query",
        "Classify a banking query to the datasource that should answer it",
    )
    .with_field(
        SchemaField::required(
            "datasource",
            FieldKind::String,
            "The datasource to use for answering the query",
        )
        .with_allowed_values(&["api", "rag", "hybrid"]),
    )
    .with_field(SchemaField::required(
        "reasoning",
        FieldKind::String,
        "Brief explanation of why this datasource was chosen",
    ))
    .with_field(SchemaField::optional(
        "sub_queries",
        FieldKind::StringArray,
        "If operational data is needed, specific lookups to make \
         (e.g. 'search branches in Kolkata')",
    ))
}

fn parse_datasource(raw: &str) -> Datasource {
    match raw {
        "api" => Datasource::Api,
        "hybrid" => Datasource::Hybrid,
        _ => Datasource::Rag,
    }
}

impl QueryRouter {
    /// Create a router over a provider manager.
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self { manager }
    }

    /// Classify a query. Any failure defaults to `rag` with the
    /// error recorded in the reasoning, so routing never blocks a
    /// query from being answered.
    #[instrument(skip(self))]
    pub async fn route(&self, query: &str) -> RouteDecision {
        let messages = vec![
            Message::system(ROUTER_SYSTEM_PROMPT),
            Message::user(query),
        ];
        // Temperature 0 keeps classification deterministic.
        let opts = CallOptions::default().with_temperature(0.0);

        let outcome = self
            .manager
            .get_structured_output(messages, route_schema(), opts)
            .await
            .and_then(|resp| resp.payload.into_structured());

        match outcome {
            Ok(value) => {
                let datasource = value
                    .get("datasource")
                    .and_then(serde_json::Value::as_str)
                    .map(parse_datasource)
                    .unwrap_or(Datasource::Rag);
                let reasoning = value
                    .get("reasoning")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let sub_queries = value
                    .get("sub_queries")
                    .and_then(serde_json::Value::as_array)
                    .map(|arr| {
                        arr.iter()
                            .filter_map(serde_json::Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();

                info!(datasource = datasource.as_str(), "query routed");
                RouteDecision {
                    datasource,
                    reasoning,
                    sub_queries,
                    defaulted: false,
                }
            }
            Err(e) => {
                warn!(error = %e, "routing failed, defaulting to rag");
                RouteDecision {
                    datasource: Datasource::Rag,
                    reasoning: format!("routing failed, defaulted to rag: {e}"),
                    sub_queries: Vec::new(),
                    defaulted: true,
                }
            }
        }
    }
}
