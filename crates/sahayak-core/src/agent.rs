//! Orchestrator
//!
//! `Agent::query` is the single entry point consumed by the HTTP and
//! CLI front ends. It routes the query, runs the matching pipeline,
//! and folds the conversation state into a `QueryResponse`. Nothing
//! below this point raises to the caller; the orchestrator is the
//! final catch-all and converts anything unforeseen into a soft
//! "error" result.

use crate::config::Settings;
use crate::executor::{ApiExecutor, API_SOURCE};
use crate::rag::RagLoop;
use crate::router::QueryRouter;
use crate::state::{stage, ChatTurn, ConversationState, Datasource, QueryResponse, RouteDecision};
use sahayak_llm::ProviderManager;
use sahayak_retrieval::RetrievalGateway;
use sahayak_tools::ToolRegistry;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const ORCHESTRATOR_ERROR_MESSAGE: &str = "I apologize, but I encountered an error \
     processing your query. Please try again.";

/// The integrated query-answering agent.
pub struct Agent {
    router: QueryRouter,
    executor: ApiExecutor,
    rag: RagLoop,
}

impl Agent {
    /// Assemble an agent from its collaborators.
    pub fn new(
        manager: Arc<ProviderManager>,
        gateway: Arc<RetrievalGateway>,
        registry: Arc<ToolRegistry>,
        settings: Settings,
    ) -> Self {
        Self {
            router: QueryRouter::new(manager.clone()),
            executor: ApiExecutor::new(manager.clone(), registry),
            rag: RagLoop::new(manager, gateway, settings),
        }
    }

    /// Answer one query.
    ///
    /// `session_id` defaults to a fresh UUID; `chat_history` carries
    /// prior turns of the same session.
    #[instrument(skip(self, chat_history))]
    pub async fn query(
        &self,
        text: &str,
        session_id: Option<String>,
        chat_history: Vec<ChatTurn>,
    ) -> QueryResponse {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut state = ConversationState::new(text, session_id.clone(), chat_history);

        let decision = self.router.route(text).await;
        state.record_stage(if decision.defaulted {
            stage::ROUTER_ERROR
        } else {
            stage::ROUTER
        });
        info!(
            datasource = decision.datasource.as_str(),
            "executing pipeline"
        );
        state.route = Some(decision.clone());

        match decision.datasource {
            Datasource::Api => self.run_api(&mut state, &decision).await,
            Datasource::Rag | Datasource::Error => self.rag.run(&mut state).await,
            Datasource::Hybrid => self.run_hybrid(&mut state, &decision).await,
        }

        self.finish(state)
    }

    /// API-only path: executor answers directly, fallback otherwise.
    async fn run_api(&self, state: &mut ConversationState, decision: &RouteDecision) {
        let result = self
            .executor
            .execute(&state.user_query, &decision.sub_queries)
            .await;

        if result.success {
            state.api_success = true;
            state.api_context = result.context.clone();
            state.sources_used.push(API_SOURCE.to_string());
            state.record_stage(stage::API_CALL);

            let answer = result.context.unwrap_or_default();
            state.record_stage(stage::API_ANSWER);
            state.push_turn(&answer);
            state.final_answer = Some(answer);
        } else {
            warn!("operational-data lookup produced nothing");
            state.record_stage(stage::API_CALL_FAILED);
            self.rag.fallback(state);
        }
    }

    /// Hybrid path: fetch both sources, merge, then answer through
    /// the shared relevancy/generation stages. When neither source
    /// produced anything, fall back to a plain retrieval retry loop.
    async fn run_hybrid(&self, state: &mut ConversationState, decision: &RouteDecision) {
        let result = self
            .executor
            .execute(&state.user_query, &decision.sub_queries)
            .await;
        if result.success {
            state.api_success = true;
            state.api_context = result.context;
            state.sources_used.push(API_SOURCE.to_string());
            state.record_stage(stage::API_CALL);
        } else {
            state.record_stage(stage::API_CALL_FAILED);
        }

        self.rag.retrieve(state).await;
        state.record_stage(stage::HYBRID_FETCH);

        if !state.api_success && state.retrieved_documents.is_empty() {
            info!("no data from either source, retrying retrieval");
            self.rag.run(state).await;
            return;
        }

        state.record_stage(stage::CONTEXT_MERGER);
        self.rag.check_relevancy(state).await;

        // One source producing something is enough to generate.
        if state.is_relevant || state.api_success {
            self.rag.generate_answer(state).await;
        } else {
            self.rag.drive(state).await;
        }
    }

    /// Fold terminal state into the response shape.
    fn finish(&self, state: ConversationState) -> QueryResponse {
        let datasource = state
            .route
            .as_ref()
            .map(|r| r.datasource)
            .unwrap_or(Datasource::Error);
        let routing_reasoning = state
            .route
            .as_ref()
            .map(|r| r.reasoning.clone())
            .unwrap_or_default();

        // A missing answer here means a stage contract was violated;
        // degrade to the soft error result instead of panicking.
        let answer = match state.final_answer {
            Some(answer) => answer,
            None => {
                warn!("pipeline finished without an answer");
                return QueryResponse {
                    answer: ORCHESTRATOR_ERROR_MESSAGE.to_string(),
                    datasource: Datasource::Error,
                    routing_reasoning,
                    sources: Vec::new(),
                    execution_path: {
                        let mut path = state.execution_path;
                        path.push(stage::ERROR.to_string());
                        path
                    },
                    retry_count: state.retry_count,
                    session_id: state.session_id,
                    num_retrieved: 0,
                    num_relevant: 0,
                    api_used: false,
                    chat_history: state.messages,
                };
            }
        };

        info!(
            datasource = datasource.as_str(),
            path = state.execution_path.join(" -> "),
            "query completed"
        );

        QueryResponse {
            answer,
            datasource,
            routing_reasoning,
            sources: state.sources_used,
            execution_path: state.execution_path,
            retry_count: state.retry_count,
            session_id: state.session_id,
            num_retrieved: state.retrieved_documents.len(),
            num_relevant: state.relevant_documents.len(),
            api_used: state.api_success,
            chat_history: state.messages,
        }
    }
}
