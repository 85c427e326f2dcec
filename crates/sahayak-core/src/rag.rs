//! Retrieval-augmented answering with bounded retries
//!
//! The cycle retrieve -> check_relevancy -> {generate_answer |
//! reform_query -> retrieve | fallback} is driven by an explicit
//! loop over the retry budget rather than a graph structure; the
//! retry counter is the only loop variable and is incremented even
//! when reformulation itself fails, so termination is unconditional.

use crate::config::Settings;
use crate::context::{
    extract_sources, format_chat_history, format_context_from_documents, merge_contexts,
    truncate_document_content,
};
use crate::prompts;
use crate::state::{stage, ConversationState};
use sahayak_llm::{CallOptions, Message, ProviderManager};
use sahayak_retrieval::RetrievalGateway;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const REFORMULATION_TEMPERATURE: f32 = 0.7;

const GENERATION_ERROR_MESSAGE: &str = "I apologize, but I encountered an error while \
     generating the answer. Please try asking your question again.";

/// The RAG retry loop over one conversation state.
pub struct RagLoop {
    manager: Arc<ProviderManager>,
    gateway: Arc<RetrievalGateway>,
    settings: Settings,
}

impl RagLoop {
    /// Create a loop over a provider manager and retrieval gateway.
    pub fn new(
        manager: Arc<ProviderManager>,
        gateway: Arc<RetrievalGateway>,
        settings: Settings,
    ) -> Self {
        Self {
            manager,
            gateway,
            settings,
        }
    }

    /// Run the full loop to a terminal answer.
    #[instrument(skip_all, fields(session = %state.session_id))]
    pub async fn run(&self, state: &mut ConversationState) {
        self.retrieve(state).await;
        self.check_relevancy(state).await;
        self.drive(state).await;
    }

    /// Decision loop entered after an initial relevancy check.
    pub async fn drive(&self, state: &mut ConversationState) {
        loop {
            if state.is_relevant {
                self.generate_answer(state).await;
                return;
            }
            if state.retry_count >= self.settings.max_retries {
                warn!(
                    retries = state.retry_count,
                    "retry budget exhausted, falling back"
                );
                self.fallback(state);
                return;
            }
            self.reform_query(state).await;
            self.retrieve(state).await;
            self.check_relevancy(state).await;
        }
    }

    /// Fetch top-K chunks for the active query and reset per-attempt
    /// relevancy bookkeeping.
    pub async fn retrieve(&self, state: &mut ConversationState) {
        let docs = self
            .gateway
            .retrieve_k(state.active_query(), self.settings.top_k)
            .await;
        info!(retrieved = docs.len(), query = state.active_query(), "retrieval complete");
        state.retrieved_documents = docs;
        state.relevant_documents.clear();
        state.is_relevant = false;
        state.record_stage(stage::RETRIEVE);
    }

    /// Classify each retrieved document independently. A document is
    /// relevant when the response contains "RELEVANT" and not
    /// "NOT RELEVANT".
    pub async fn check_relevancy(&self, state: &mut ConversationState) {
        if state.retrieved_documents.is_empty() {
            state.is_relevant = false;
            state.record_stage(stage::CHECK_RELEVANCY_NO_DOCS);
            return;
        }

        let query = state.active_query().to_string();
        let mut docs = std::mem::take(&mut state.retrieved_documents);
        let mut relevant = Vec::new();

        for doc in &mut docs {
            let prompt = prompts::relevancy_check_prompt(
                &query,
                &truncate_document_content(&doc.content),
                &doc.source,
                &doc.category,
            );
            let verdict = self
                .manager
                .invoke(vec![Message::user(prompt)], CallOptions::default())
                .await
                .and_then(|resp| resp.payload.into_text());

            match verdict {
                Ok(text) => {
                    let upper = text.trim().to_uppercase();
                    let relevant_verdict =
                        upper.contains("RELEVANT") && !upper.contains("NOT RELEVANT");
                    doc.set_relevant(relevant_verdict);
                    if relevant_verdict {
                        relevant.push(doc.clone());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "relevancy check failed");
                    state.retrieved_documents = docs;
                    state.relevant_documents.clear();
                    state.is_relevant = false;
                    state.record_stage(stage::CHECK_RELEVANCY_ERROR);
                    return;
                }
            }
        }

        info!(
            relevant = relevant.len(),
            checked = docs.len(),
            "relevancy check complete"
        );
        state.retrieved_documents = docs;
        state.is_relevant = !relevant.is_empty();
        state.relevant_documents = relevant;
        state.record_stage(stage::CHECK_RELEVANCY);
    }

    /// Rewrite the query for another retrieval attempt. The retry is
    /// consumed whether or not the rewrite succeeded.
    pub async fn reform_query(&self, state: &mut ConversationState) {
        let attempt = state.retry_count + 1;
        let prompt = prompts::reformulation_prompt(
            &state.user_query,
            state.reformulated_query.as_deref(),
            attempt,
            self.settings.max_retries,
        );
        let opts = CallOptions::default().with_temperature(REFORMULATION_TEMPERATURE);

        match self
            .manager
            .invoke(vec![Message::user(prompt)], opts)
            .await
            .and_then(|resp| resp.payload.into_text())
        {
            Ok(rewritten) => {
                let cleaned = rewritten.trim().trim_matches(['"', '\'']).to_string();
                info!(reformulated = %cleaned, "query reformulated");
                state.reformulated_query = Some(cleaned);
                state.record_stage(stage::REFORM_QUERY);
            }
            Err(e) => {
                warn!(error = %e, "reformulation failed, retry still consumed");
                state.record_stage(stage::REFORM_QUERY_ERROR);
            }
        }
        state.retry_count += 1;
    }

    /// Generate the final answer from relevant documents (and, for
    /// hybrid queries, the operational-data context) plus recent
    /// history. History is appended even when generation fails.
    pub async fn generate_answer(&self, state: &mut ConversationState) {
        let context = if state.api_context.is_some() {
            merge_contexts(state.api_context.as_deref(), &state.relevant_documents)
                .unwrap_or_default()
        } else {
            format_context_from_documents(&state.relevant_documents)
        };
        let history = prompts::chat_history_block(&format_chat_history(
            &state.messages,
            self.settings.history_window,
        ));
        let prompt = prompts::answer_generation_prompt(&history, &state.user_query, &context);

        match self
            .manager
            .invoke(vec![Message::user(prompt)], CallOptions::default())
            .await
            .and_then(|resp| resp.payload.into_text())
        {
            Ok(answer) => {
                let answer = answer.trim().to_string();
                for source in extract_sources(&state.relevant_documents) {
                    if !state.sources_used.contains(&source) {
                        state.sources_used.push(source);
                    }
                }
                state.record_stage(stage::GENERATE_ANSWER);
                state.push_turn(&answer);
                state.final_answer = Some(answer);
                info!("answer generated");
            }
            Err(e) => {
                warn!(error = %e, "answer generation failed");
                state.record_stage(stage::GENERATE_ANSWER_ERROR);
                state.push_turn(GENERATION_ERROR_MESSAGE);
                state.final_answer = Some(GENERATION_ERROR_MESSAGE.to_string());
            }
        }
    }

    /// Terminal fallback once the retry budget is exhausted.
    pub fn fallback(&self, state: &mut ConversationState) {
        let message = prompts::fallback_message(&state.user_query);
        state.record_stage(stage::FALLBACK);
        state.push_turn(&message);
        state.final_answer = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sahayak_llm::{
        Error, LlmProvider, Result as LlmResult, StructuredSchema, ToolDefinition, ToolResponse,
    };
    use sahayak_retrieval::{InMemoryIndex, VectorSearch};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that marks everything relevant and answers from context.
    struct AgreeableProvider;

    #[async_trait]
    impl LlmProvider for AgreeableProvider {
        fn name(&self) -> &str {
            "agreeable"
        }
        fn model(&self) -> &str {
            "agreeable-model"
        }
        fn priority(&self) -> u8 {
            1
        }
        async fn invoke(&self, messages: &[Message], _o: CallOptions) -> LlmResult<String> {
            let prompt = &messages[0].content;
            if prompt.contains("RELEVANT") {
                Ok("RELEVANT".to_string())
            } else if prompt.contains("Reformulated Query") {
                Ok("rewritten query".to_string())
            } else {
                Ok("You need an Aadhaar card and a PAN card.".to_string())
            }
        }
        async fn invoke_with_tools(
            &self,
            _m: &[Message],
            _t: &[ToolDefinition],
            _o: CallOptions,
        ) -> LlmResult<ToolResponse> {
            Err(Error::NotSupported {
                provider: "agreeable".into(),
                capability: "tools".into(),
            })
        }
        async fn get_structured_output(
            &self,
            _m: &[Message],
            _s: &StructuredSchema,
            _o: CallOptions,
        ) -> LlmResult<serde_json::Value> {
            Err(Error::NotSupported {
                provider: "agreeable".into(),
                capability: "structured".into(),
            })
        }
        async fn get_embeddings(&self, _text: &str) -> LlmResult<Vec<f32>> {
            Err(Error::NotSupported {
                provider: "agreeable".into(),
                capability: "embeddings".into(),
            })
        }
    }

    /// Provider that always says NOT RELEVANT and counts rewrites.
    struct DismissiveProvider {
        rewrites: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for DismissiveProvider {
        fn name(&self) -> &str {
            "dismissive"
        }
        fn model(&self) -> &str {
            "dismissive-model"
        }
        fn priority(&self) -> u8 {
            1
        }
        async fn invoke(&self, messages: &[Message], _o: CallOptions) -> LlmResult<String> {
            let prompt = &messages[0].content;
            if prompt.contains("Reformulated Query") {
                let n = self.rewrites.fetch_add(1, Ordering::Relaxed) + 1;
                Ok(format!("rewrite number {n}"))
            } else {
                Ok("NOT RELEVANT".to_string())
            }
        }
        async fn invoke_with_tools(
            &self,
            _m: &[Message],
            _t: &[ToolDefinition],
            _o: CallOptions,
        ) -> LlmResult<ToolResponse> {
            Err(Error::NotSupported {
                provider: "dismissive".into(),
                capability: "tools".into(),
            })
        }
        async fn get_structured_output(
            &self,
            _m: &[Message],
            _s: &StructuredSchema,
            _o: CallOptions,
        ) -> LlmResult<serde_json::Value> {
            Err(Error::NotSupported {
                provider: "dismissive".into(),
                capability: "structured".into(),
            })
        }
        async fn get_embeddings(&self, _text: &str) -> LlmResult<Vec<f32>> {
            Err(Error::NotSupported {
                provider: "dismissive".into(),
                capability: "embeddings".into(),
            })
        }
    }

    fn populated_gateway() -> Arc<RetrievalGateway> {
        let mut index = InMemoryIndex::new();
        index.add(
            "To open a savings account you need an Aadhaar card, a PAN card, and two photographs.",
            "account_manual.pdf",
            "general_banking",
        );
        Arc::new(RetrievalGateway::new(Arc::new(index), 5))
    }

    fn empty_gateway() -> Arc<RetrievalGateway> {
        Arc::new(RetrievalGateway::new(Arc::new(InMemoryIndex::new()), 5))
    }

    fn rag_loop(
        provider: Arc<dyn LlmProvider>,
        gateway: Arc<RetrievalGateway>,
    ) -> RagLoop {
        let manager = Arc::new(ProviderManager::new(vec![provider], true).unwrap());
        RagLoop::new(manager, gateway, Settings::default())
    }

    #[tokio::test]
    async fn test_happy_path_generates_on_first_attempt() {
        let rag = rag_loop(Arc::new(AgreeableProvider), populated_gateway());
        let mut state = ConversationState::new(
            "What documents are needed to open an account?",
            "s1",
            vec![],
        );

        rag.run(&mut state).await;

        assert_eq!(
            state.execution_path,
            vec!["retrieve", "check_relevancy", "generate_answer"]
        );
        assert_eq!(state.retry_count, 0);
        assert!(state.final_answer.as_deref().unwrap().contains("Aadhaar"));
        assert_eq!(state.sources_used, vec!["account_manual.pdf"]);
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_index_exhausts_retries_then_falls_back() {
        let rag = rag_loop(
            Arc::new(DismissiveProvider {
                rewrites: AtomicUsize::new(0),
            }),
            empty_gateway(),
        );
        let mut state = ConversationState::new("What is the meaning of life?", "s2", vec![]);

        rag.run(&mut state).await;

        assert_eq!(state.retry_count, 3);
        assert_eq!(state.execution_path.last().map(String::as_str), Some("fallback"));
        let answer = state.final_answer.unwrap();
        assert!(answer.contains("What is the meaning of life?"));
        assert_eq!(
            state
                .execution_path
                .iter()
                .filter(|s| s.as_str() == "reform_query")
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_irrelevant_documents_trigger_reformulation() {
        let rag = rag_loop(
            Arc::new(DismissiveProvider {
                rewrites: AtomicUsize::new(0),
            }),
            populated_gateway(),
        );
        let mut state = ConversationState::new("savings account documents", "s3", vec![]);

        rag.run(&mut state).await;

        // Every attempt found documents but none survived the check.
        assert!(state.execution_path.contains(&"reform_query".to_string()));
        assert_eq!(state.execution_path.last().map(String::as_str), Some("fallback"));
        assert_eq!(state.reformulated_query.as_deref(), Some("rewrite number 3"));
    }

    #[tokio::test]
    async fn test_relevant_subset_invariant() {
        let rag = rag_loop(Arc::new(AgreeableProvider), populated_gateway());
        let mut state = ConversationState::new("account opening documents", "s4", vec![]);

        rag.retrieve(&mut state).await;
        rag.check_relevancy(&mut state).await;

        assert!(state.relevant_documents.len() <= state.retrieved_documents.len());
        assert!(state.is_relevant);
        for doc in &state.retrieved_documents {
            assert!(doc.is_relevant.is_some());
        }
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_history() {
        struct GenerationFails;

        #[async_trait]
        impl LlmProvider for GenerationFails {
            fn name(&self) -> &str {
                "genfail"
            }
            fn model(&self) -> &str {
                "genfail-model"
            }
            fn priority(&self) -> u8 {
                1
            }
            async fn invoke(&self, messages: &[Message], _o: CallOptions) -> LlmResult<String> {
                let prompt = &messages[0].content;
                if prompt.contains("RELEVANT") {
                    Ok("RELEVANT".to_string())
                } else {
                    Err(Error::Api("model crashed".into()))
                }
            }
            async fn invoke_with_tools(
                &self,
                _m: &[Message],
                _t: &[ToolDefinition],
                _o: CallOptions,
            ) -> LlmResult<ToolResponse> {
                Err(Error::Api("no".into()))
            }
            async fn get_structured_output(
                &self,
                _m: &[Message],
                _s: &StructuredSchema,
                _o: CallOptions,
            ) -> LlmResult<serde_json::Value> {
                Err(Error::Api("no".into()))
            }
            async fn get_embeddings(&self, _t: &str) -> LlmResult<Vec<f32>> {
                Err(Error::Api("no".into()))
            }
        }

        let rag = rag_loop(Arc::new(GenerationFails), populated_gateway());
        let mut state = ConversationState::new("account opening documents", "s5", vec![]);

        rag.run(&mut state).await;

        assert_eq!(
            state.execution_path.last().map(String::as_str),
            Some("generate_answer_error")
        );
        assert!(state.final_answer.as_deref().unwrap().contains("apologize"));
        // Conversation continuity survives the model error.
        assert_eq!(state.messages.len(), 2);
    }

    struct BrokenBackend;

    #[async_trait]
    impl VectorSearch for BrokenBackend {
        async fn search(
            &self,
            _q: &str,
            _k: usize,
        ) -> sahayak_retrieval::Result<Vec<sahayak_retrieval::SearchHit>> {
            Err(sahayak_retrieval::Error::Backend("outage".to_string()))
        }
    }

    #[tokio::test]
    async fn test_backend_outage_flows_to_fallback() {
        let gateway = Arc::new(RetrievalGateway::new(Arc::new(BrokenBackend), 5));
        let rag = rag_loop(
            Arc::new(DismissiveProvider {
                rewrites: AtomicUsize::new(0),
            }),
            gateway,
        );
        let mut state = ConversationState::new("anything", "s6", vec![]);

        rag.run(&mut state).await;

        assert_eq!(state.execution_path.last().map(String::as_str), Some("fallback"));
        assert!(state
            .execution_path
            .contains(&"check_relevancy_no_docs".to_string()));
    }
}
