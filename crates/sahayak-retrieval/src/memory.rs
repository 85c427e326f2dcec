//! In-memory search index
//!
//! Token-overlap scoring over a fixed document set. Used by the demo
//! CLI and tests in place of a real vector store.

use crate::document::SearchHit;
use crate::error::Result;
use crate::gateway::VectorSearch;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;

/// A document registered with the in-memory index.
#[derive(Debug, Clone)]
struct IndexedDoc {
    content: String,
    source: String,
    category: String,
}

/// Naive in-memory index scored by token overlap with the query.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    docs: Vec<IndexedDoc>,
}

impl InMemoryIndex {
    /// Empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document chunk.
    pub fn add(&mut self, content: impl Into<String>, source: impl Into<String>, category: impl Into<String>) {
        self.docs.push(IndexedDoc {
            content: content.into(),
            source: source.into(),
            category: category.into(),
        });
    }

    /// Number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the index holds no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

fn overlap_score(query: &HashSet<String>, doc: &HashSet<String>) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let shared = query.intersection(doc).count();
    shared as f32 / query.len() as f32
}

#[async_trait]
impl VectorSearch for InMemoryIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_tokens = tokenize(query);
        let mut scored: Vec<(f32, &IndexedDoc)> = self
            .docs
            .iter()
            .map(|doc| (overlap_score(&query_tokens, &tokenize(&doc.content)), doc))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, doc)| SearchHit {
                content: doc.content.clone(),
                metadata: [
                    ("source".to_string(), json!(doc.source)),
                    ("category".to_string(), json!(doc.category)),
                ]
                .into_iter()
                .collect(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> InMemoryIndex {
        let mut index = InMemoryIndex::new();
        index.add(
            "To open a savings account you need an Aadhaar card, a PAN card, and two photographs.",
            "account_manual.pdf",
            "general_banking",
        );
        index.add(
            "Fixed deposit schemes offer interest from 6.5% for tenures above one year.",
            "deposit_manual.pdf",
            "deposit_schemes",
        );
        index
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap() {
        let index = sample_index();
        let hits = index.search("documents needed to open account", 5).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].content.contains("savings account"));
    }

    #[tokio::test]
    async fn test_search_no_match_is_empty() {
        let index = sample_index();
        let hits = index.search("zzz qqq xyzzy", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_respects_k() {
        let index = sample_index();
        let hits = index.search("account deposit schemes interest", 1).await.unwrap();
        assert!(hits.len() <= 1);
    }
}
