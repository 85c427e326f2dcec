//! Prompt templates
//!
//! Every prompt used by the pipeline lives here so wording changes
//! never touch control flow.

/// System instruction for the three-way routing decision.
pub const ROUTER_SYSTEM_PROMPT: &str = "\
You are a query router for a co-operative bank assistant. Classify the \
user's query into exactly one datasource:

- \"api\": the query needs current, live operational data (branch \
listings, running schemes, interest rates in effect today, account \
balances). Signals: \"current\", \"live\", \"available\", \"list\", \
\"show me\".
- \"rag\": the query needs conceptual or procedural knowledge from the \
bank's documentation. Signals: \"how to\", \"what is\", \"explain\", \
\"difference between\", \"what documents\".
- \"hybrid\": the query needs both, e.g. explaining a scheme AND \
showing its current rates.

Also produce a brief reasoning for the choice and, when the datasource \
is \"api\" or \"hybrid\", a list of specific sub-queries to run against \
the operational data (e.g. \"search branches in Kolkata\").";

/// Binary relevancy classification for one retrieved document.
#[must_use]
pub fn relevancy_check_prompt(query: &str, content: &str, source: &str, category: &str) -> String {
    format!(
        "You are a helpful AI assistant for a co-operative bank.\n\n\
         Your task is to determine if the given document contains relevant \
         information to answer the user's query.\n\n\
         User Query: {query}\n\n\
         Document to Check:\n---\n{content}\n---\n\n\
         Document Metadata:\n- Source: {source}\n- Category: {category}\n\n\
         Instructions:\n\
         1. Carefully read the user's query and understand what they're asking\n\
         2. Review the document content\n\
         3. Determine if this document contains ANY information that could help answer the query\n\
         4. Be generous - even partial matches or related information counts as relevant\n\n\
         Response Format:\n\
         - Reply with ONLY \"RELEVANT\" or \"NOT RELEVANT\"\n\
         - Do not provide explanations or additional text\n\n\
         Your Response:"
    )
}

/// Query rewrite prompt used after a failed relevancy check.
#[must_use]
pub fn reformulation_prompt(
    original_query: &str,
    previous_reformulation: Option<&str>,
    attempt: u32,
    max_attempts: u32,
) -> String {
    let previous = match previous_reformulation {
        Some(prev) => format!("Previous Reformulation: {prev}\n"),
        None => String::new(),
    };
    format!(
        "You are helping bank staff find information in the knowledge base.\n\n\
         The user's query did not return relevant results. Your task is to \
         reformulate the query to improve search results.\n\n\
         Original Query: {original_query}\n\
         {previous}\
         Attempt: {attempt} of {max_attempts}\n\n\
         Context:\n\
         - The knowledge base covers the bank's schemes (deposits, loans), \
           membership, branches, and transactions\n\
         - It includes the banking application user manual with procedures and steps\n\n\
         Guidelines for Reformulation:\n\
         1. Keep the core intent of the question\n\
         2. Simplify complex queries\n\
         3. Expand abbreviations (e.g., \"FD\" -> \"Fixed Deposit\")\n\
         4. Add context if missing (e.g., \"user\" -> \"user account in the banking app\")\n\
         5. Use simpler, more common terms\n\
         6. Focus on the main action or information needed\n\n\
         Examples:\n\
         - \"How to add user?\" -> \"How to add a new user account in the banking app?\"\n\
         - \"FD rates?\" -> \"What are the Fixed Deposit interest rates?\"\n\
         - \"Delete member\" -> \"How to delete or remove a member account?\"\n\n\
         Reformulated Query (one line only):"
    )
}

/// Grounded answer generation from retrieved context and history.
#[must_use]
pub fn answer_generation_prompt(chat_history: &str, query: &str, context: &str) -> String {
    format!(
        "You are a helpful AI assistant for co-operative bank staff.\n\n\
         Your Role:\n\
         - Help staff understand organizational information\n\
         - Guide them on using the banking application\n\
         - Explain procedures, schemes, and policies clearly\n\
         - Use simple, non-technical language suitable for all staff members\n\n\
         {chat_history}\
         User Question: {query}\n\n\
         Relevant Information:\n{context}\n\n\
         Instructions:\n\
         1. Answer based ONLY on the provided information above\n\
         2. Be clear, concise, and helpful\n\
         3. Use simple language - avoid technical jargon\n\
         4. If the information mentions specific steps, list them clearly with numbers\n\
         5. If rates, amounts, or percentages are mentioned, include them accurately\n\
         6. Be friendly and professional in tone\n\n\
         Important:\n\
         - Do NOT make up information not present in the context\n\
         - Do NOT mention that you're looking at documents or a knowledge base\n\
         - Respond naturally as if you know this information\n\
         - If something is unclear from the context, acknowledge it\n\n\
         Your Answer:"
    )
}

/// Deterministic fallback when no relevant information was found.
#[must_use]
pub fn fallback_message(query: &str) -> String {
    format!(
        "I apologize, but I couldn't find relevant information in our \
         knowledge base to answer your question:\n\n\
         \"{query}\"\n\n\
         This could be because:\n\
         \u{2022} The information might not be available in the current system\n\
         \u{2022} The question might need to be rephrased differently\n\
         \u{2022} This might be a specialized query requiring human assistance\n\n\
         Please try:\n\
         1. Rephrasing your question with different keywords\n\
         2. Breaking down complex questions into simpler parts\n\
         3. Asking about specific features or procedures\n\n\
         Examples of questions I can help with:\n\
         \u{2022} \"What are the Fixed Deposit interest rates?\"\n\
         \u{2022} \"How to create a savings account?\"\n\
         \u{2022} \"What is the process for loan application?\"\n\n\
         Is there anything else I can help you with?"
    )
}

/// Header wrapping formatted conversation history in a prompt.
#[must_use]
pub fn chat_history_block(formatted_history: &str) -> String {
    if formatted_history.is_empty() {
        return String::new();
    }
    format!("Previous Conversation:\n{formatted_history}\n\n")
}

/// Instruction for the tool-calling executor.
#[must_use]
pub fn api_executor_prompt(query: &str, sub_queries: &[String]) -> String {
    let specifics = if sub_queries.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = sub_queries.iter().map(|q| format!("- {q}")).collect();
        format!("Specific lookups to make:\n{}\n\n", lines.join("\n"))
    };
    format!(
        "Answer the following query using the available tools.\n\n\
         User Query: {query}\n\n\
         {specifics}\
         Use the appropriate tools to fetch the required data and provide a \
         comprehensive answer.\n\n\
         IMPORTANT: This is an Indian banking system. All monetary amounts \
         should be displayed in INR (Indian Rupees) using the \u{20b9} symbol, \
         not in dollars ($)."
    )
}
