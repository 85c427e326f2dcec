//! Environment-driven assembly of the answering stack

use anyhow::{bail, Context, Result};
use sahayak_core::{Agent, Settings};
use sahayak_llm::{
    groq_cooldowns, CooldownPolicy, GeminiConfig, GeminiProvider, GroqConfig, GroqProvider,
    LlmProvider, OpenAiConfig, OpenAiProvider, ProviderManager,
};
use sahayak_retrieval::{InMemoryIndex, RetrievalGateway};
use sahayak_tools::{register_banking_tools, BankingApiClient, ToolRegistry};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the provider manager from whichever vendor keys are set.
///
/// Missing keys just exclude a provider; zero configured providers is
/// a startup failure, not a per-query one.
pub fn build_manager(settings: &Settings) -> Result<Arc<ProviderManager>> {
    let mut providers: Vec<(Arc<dyn LlmProvider>, CooldownPolicy)> = Vec::new();

    match OpenAiConfig::from_env() {
        Ok(config) => {
            let provider =
                OpenAiProvider::new(config).context("building OpenAI provider")?;
            providers.push((Arc::new(provider), CooldownPolicy::default()));
        }
        Err(e) => info!(reason = %e, "OpenAI provider not configured"),
    }

    match GroqConfig::from_env() {
        Ok(config) => {
            let provider = GroqProvider::new(config).context("building Groq provider")?;
            providers.push((Arc::new(provider), groq_cooldowns()));
        }
        Err(e) => info!(reason = %e, "Groq provider not configured"),
    }

    match GeminiConfig::from_env() {
        Ok(config) => {
            let provider = GeminiProvider::new(config).context("building Gemini provider")?;
            providers.push((Arc::new(provider), CooldownPolicy::default()));
        }
        Err(e) => info!(reason = %e, "Gemini provider not configured"),
    }

    if providers.is_empty() {
        bail!(
            "no LLM provider configured; set at least one of \
             OPENAI_API_KEY, GROQ_API_KEY, GEMINI_API_KEY"
        );
    }

    let manager = ProviderManager::with_cooldowns(providers, settings.enable_fallback)?;
    Ok(Arc::new(manager))
}

/// Knowledge base for the demo CLI: a small built-in index standing
/// in for the real vector store.
pub fn build_gateway(settings: &Settings) -> Arc<RetrievalGateway> {
    let mut index = InMemoryIndex::new();
    index.add(
        "To open a savings account you need an Aadhaar card, a PAN card, two \
         passport-size photographs, and an initial deposit of at least \u{20b9}500.",
        "account_manual.pdf",
        "general_banking",
    );
    index.add(
        "Fixed Deposit schemes offer interest rates from 6.5% to 7.5% per annum \
         depending on tenure. Minimum tenure is 6 months, maximum 10 years. \
         Premature withdrawal attracts a 1% penalty on the applicable rate.",
        "deposit_manual.pdf",
        "deposit_schemes",
    );
    index.add(
        "Loan applications require proof of identity, proof of address, income \
         documents for the last six months, and two guarantors who are existing \
         members. Processing takes 7 to 10 working days.",
        "loan_manual.pdf",
        "loan_schemes",
    );
    index.add(
        "Recurring Deposit accounts accept monthly installments starting from \
         \u{20b9}100. Missing an installment attracts a small penalty; three \
         consecutive missed installments close the account.",
        "deposit_manual.pdf",
        "deposit_schemes",
    );
    Arc::new(RetrievalGateway::new(Arc::new(index), settings.top_k))
}

/// Tool registry over the banking API, empty when unconfigured.
pub fn build_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    match BankingApiClient::from_env() {
        Ok(client) => register_banking_tools(&mut registry, client),
        Err(e) => warn!(reason = %e, "banking API tools disabled"),
    }
    Arc::new(registry)
}

/// Assemble the full agent.
pub fn build_agent(settings: &Settings) -> Result<(Agent, Arc<ProviderManager>)> {
    let manager = build_manager(settings)?;
    let gateway = build_gateway(settings);
    let registry = build_registry();
    let agent = Agent::new(manager.clone(), gateway, registry, settings.clone());
    Ok((agent, manager))
}
