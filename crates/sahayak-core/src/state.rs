//! Per-query conversation state
//!
//! One [`ConversationState`] is created at the start of each query,
//! threaded through every stage, and folded into a [`QueryResponse`]
//! at the end. It is never shared across concurrent queries.

use sahayak_retrieval::RetrievedDocument;
use serde::{Deserialize, Serialize};

/// Stage names recorded in `execution_path`.
pub mod stage {
    /// Router classified the query
    pub const ROUTER: &str = "router";
    /// Router call failed, defaulted to rag
    pub const ROUTER_ERROR: &str = "router_error";
    /// Operational-data executor ran and succeeded
    pub const API_CALL: &str = "api_call";
    /// Operational-data executor ran and produced nothing
    pub const API_CALL_FAILED: &str = "api_call_failed";
    /// Answer produced directly from operational data
    pub const API_ANSWER: &str = "api_answer";
    /// Knowledge-base retrieval ran
    pub const RETRIEVE: &str = "retrieve";
    /// Per-document relevancy check ran
    pub const CHECK_RELEVANCY: &str = "check_relevancy";
    /// Relevancy check ran with nothing to check
    pub const CHECK_RELEVANCY_NO_DOCS: &str = "check_relevancy_no_docs";
    /// Relevancy check itself errored
    pub const CHECK_RELEVANCY_ERROR: &str = "check_relevancy_error";
    /// Query was rewritten for another retrieval attempt
    pub const REFORM_QUERY: &str = "reform_query";
    /// Rewrite failed; retry still consumed
    pub const REFORM_QUERY_ERROR: &str = "reform_query_error";
    /// Grounded answer was generated
    pub const GENERATE_ANSWER: &str = "generate_answer";
    /// Generation failed; apology emitted
    pub const GENERATE_ANSWER_ERROR: &str = "generate_answer_error";
    /// Retry budget exhausted; fallback message emitted
    pub const FALLBACK: &str = "fallback";
    /// Hybrid fetch of operational data plus retrieval
    pub const HYBRID_FETCH: &str = "hybrid_fetch";
    /// Operational and knowledge-base context merged
    pub const CONTEXT_MERGER: &str = "context_merger";
    /// Unforeseen failure caught at the orchestrator
    pub const ERROR: &str = "error";
}

/// Which answering pipeline a query was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datasource {
    /// Operational-data lookups only
    Api,
    /// Knowledge-base retrieval only
    Rag,
    /// Both, merged before generation
    Hybrid,
    /// Orchestrator-level failure result
    Error,
}

impl Datasource {
    /// String form used in responses and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Rag => "rag",
            Self::Hybrid => "hybrid",
            Self::Error => "error",
        }
    }
}

/// Output of the query router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Chosen pipeline
    pub datasource: Datasource,
    /// Why the router chose it (or the error that forced the default)
    pub reasoning: String,
    /// Specific operational lookups for api/hybrid routes
    #[serde(default)]
    pub sub_queries: Vec<String>,
    /// Set when classification failed and the safe default was used
    #[serde(skip)]
    pub defaulted: bool,
}

/// Speaker of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The human asking questions
    User,
    /// The assistant's answers
    Assistant,
}

/// One turn of session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who spoke
    pub role: ChatRole,
    /// What they said
    pub content: String,
}

impl ChatTurn {
    /// A user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// An assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Mutable state threaded through one query's execution.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Original query text
    pub user_query: String,
    /// Latest reformulation, if any
    pub reformulated_query: Option<String>,
    /// Router output
    pub route: Option<RouteDecision>,
    /// Context text from operational-data lookups
    pub api_context: Option<String>,
    /// Whether the operational-data executor got usable data
    pub api_success: bool,
    /// All chunks from the last retrieval
    pub retrieved_documents: Vec<RetrievedDocument>,
    /// Subset marked relevant by the classifier
    pub relevant_documents: Vec<RetrievedDocument>,
    /// Reformulation retries consumed
    pub retry_count: u32,
    /// Whether at least one document was marked relevant
    pub is_relevant: bool,
    /// Final answer once a terminal stage has run
    pub final_answer: Option<String>,
    /// Session history, appended to at terminal stages
    pub messages: Vec<ChatTurn>,
    /// Deduplicated source identifiers used in the answer
    pub sources_used: Vec<String>,
    /// Ordered stage names, for diagnostics
    pub execution_path: Vec<String>,
    /// Session identifier linking to prior turns
    pub session_id: String,
}

impl ConversationState {
    /// Fresh state for one query.
    #[must_use]
    pub fn new(user_query: impl Into<String>, session_id: impl Into<String>, messages: Vec<ChatTurn>) -> Self {
        Self {
            user_query: user_query.into(),
            reformulated_query: None,
            route: None,
            api_context: None,
            api_success: false,
            retrieved_documents: Vec::new(),
            relevant_documents: Vec::new(),
            retry_count: 0,
            is_relevant: false,
            final_answer: None,
            messages,
            sources_used: Vec::new(),
            execution_path: Vec::new(),
            session_id: session_id.into(),
        }
    }

    /// The query the pipeline should currently search with.
    #[must_use]
    pub fn active_query(&self) -> &str {
        self.reformulated_query.as_deref().unwrap_or(&self.user_query)
    }

    /// Record a completed stage.
    pub fn record_stage(&mut self, name: &str) {
        self.execution_path.push(name.to_string());
    }

    /// Append the user/assistant turn for a terminal answer.
    pub fn push_turn(&mut self, answer: &str) {
        self.messages.push(ChatTurn::user(self.user_query.clone()));
        self.messages.push(ChatTurn::assistant(answer));
    }
}

/// Result returned by [`crate::Agent::query`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Natural-language answer
    pub answer: String,
    /// Pipeline that produced the answer
    pub datasource: Datasource,
    /// Router's reasoning
    pub routing_reasoning: String,
    /// Source identifiers used, deduplicated in order
    pub sources: Vec<String>,
    /// Ordered stage names executed
    pub execution_path: Vec<String>,
    /// Reformulation retries consumed
    pub retry_count: u32,
    /// Session identifier
    pub session_id: String,
    /// Number of chunks in the last retrieval
    pub num_retrieved: usize,
    /// Number of chunks marked relevant
    pub num_relevant: usize,
    /// Whether operational data contributed
    pub api_used: bool,
    /// Updated session history
    pub chat_history: Vec<ChatTurn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_query_prefers_reformulation() {
        let mut state = ConversationState::new("FD rates?", "s1", vec![]);
        assert_eq!(state.active_query(), "FD rates?");
        state.reformulated_query = Some("Fixed Deposit interest rates".to_string());
        assert_eq!(state.active_query(), "Fixed Deposit interest rates");
    }

    #[test]
    fn test_push_turn_appends_in_order() {
        let mut state = ConversationState::new("q", "s1", vec![ChatTurn::user("earlier")]);
        state.push_turn("the answer");
        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.messages[1].role, ChatRole::User);
        assert_eq!(state.messages[2].content, "the answer");
    }

    #[test]
    fn test_datasource_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Datasource::Hybrid).unwrap(), "\"hybrid\"");
        assert_eq!(Datasource::Api.as_str(), "api");
    }
}
