//! Context assembly helpers

use crate::state::{ChatRole, ChatTurn};
use sahayak_retrieval::RetrievedDocument;

const DOCUMENT_CHAR_CAP: usize = 2000;

/// Format the most recent turns as "User:"/"Assistant:" lines.
#[must_use]
pub fn format_chat_history(turns: &[ChatTurn], max_turns: usize) -> String {
    let start = turns.len().saturating_sub(max_turns);
    turns[start..]
        .iter()
        .map(|turn| match turn.role {
            ChatRole::User => format!("User: {}", turn.content),
            ChatRole::Assistant => format!("Assistant: {}", turn.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cap document content to keep prompts inside token limits.
#[must_use]
pub fn truncate_document_content(content: &str) -> String {
    if content.chars().count() <= DOCUMENT_CHAR_CAP {
        return content.to_string();
    }
    let head: String = content.chars().take(DOCUMENT_CHAR_CAP).collect();
    format!("{head}\n\n[Content truncated for brevity...]")
}

/// Format relevant documents into a numbered context block.
#[must_use]
pub fn format_context_from_documents(documents: &[RetrievedDocument]) -> String {
    let mut parts = Vec::new();
    for (i, doc) in documents.iter().enumerate() {
        parts.push(format!("[Document {}]", i + 1));
        parts.push(format!("Source: {} | Category: {}", doc.source, doc.category));
        parts.push(doc.content.clone());
        parts.push(String::new());
    }
    parts.join("\n")
}

/// Source identifiers from documents, deduplicated preserving order.
#[must_use]
pub fn extract_sources(documents: &[RetrievedDocument]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    documents
        .iter()
        .map(|doc| doc.source.clone())
        .filter(|source| seen.insert(source.clone()))
        .collect()
}

/// Labeled merge of operational-data context and retrieved documents.
///
/// Returns `None` when neither source contributed anything.
#[must_use]
pub fn merge_contexts(
    api_context: Option<&str>,
    documents: &[RetrievedDocument],
) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(api) = api_context.filter(|text| !text.is_empty()) {
        parts.push("=== Real-time Data ===".to_string());
        parts.push(api.to_string());
        parts.push(String::new());
    }

    if !documents.is_empty() {
        parts.push("=== Knowledge Base Information ===".to_string());
        for (i, doc) in documents.iter().enumerate() {
            parts.push(format!("\nDocument {}:", i + 1));
            parts.push(doc.content.clone());
            parts.push(format!("Source: {}", doc.source));
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahayak_retrieval::SearchHit;
    use serde_json::json;

    fn doc(content: &str, source: &str) -> RetrievedDocument {
        RetrievedDocument::from_hit(SearchHit {
            content: content.to_string(),
            metadata: [("source".to_string(), json!(source))].into_iter().collect(),
            score: 0.9,
        })
    }

    #[test]
    fn test_format_chat_history_windows_recent_turns() {
        let turns = vec![
            ChatTurn::user("one"),
            ChatTurn::assistant("two"),
            ChatTurn::user("three"),
        ];
        let formatted = format_chat_history(&turns, 2);
        assert!(!formatted.contains("one"));
        assert!(formatted.contains("Assistant: two"));
        assert!(formatted.contains("User: three"));
    }

    #[test]
    fn test_truncate_long_document() {
        let long = "x".repeat(3000);
        let truncated = truncate_document_content(&long);
        assert!(truncated.contains("[Content truncated for brevity...]"));
        let short = truncate_document_content("short");
        assert_eq!(short, "short");
    }

    #[test]
    fn test_context_includes_metadata() {
        let context = format_context_from_documents(&[doc("rates info", "manual.pdf")]);
        assert!(context.contains("[Document 1]"));
        assert!(context.contains("Source: manual.pdf"));
        assert!(context.contains("rates info"));
    }

    #[test]
    fn test_extract_sources_dedupes_in_order() {
        let docs = vec![doc("a", "first.pdf"), doc("b", "second.pdf"), doc("c", "first.pdf")];
        assert_eq!(extract_sources(&docs), vec!["first.pdf", "second.pdf"]);
    }

    #[test]
    fn test_merge_contexts_labels_sections() {
        let merged = merge_contexts(Some("branch list"), &[doc("scheme info", "manual.pdf")]).unwrap();
        assert!(merged.contains("=== Real-time Data ==="));
        assert!(merged.contains("=== Knowledge Base Information ==="));
        assert!(merged.contains("branch list"));
        assert!(merged.contains("scheme info"));
    }

    #[test]
    fn test_merge_contexts_empty_sources() {
        assert!(merge_contexts(None, &[]).is_none());
        assert!(merge_contexts(Some(""), &[]).is_none());
        let api_only = merge_contexts(Some("data"), &[]).unwrap();
        assert!(!api_only.contains("Knowledge Base"));
    }
}
