//! Document model for retrieval results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A raw hit from the vector search backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Chunk text
    pub content: String,
    /// Backend metadata (source, category, ingestion details)
    pub metadata: HashMap<String, Value>,
    /// Similarity score, higher is more similar
    pub score: f32,
}

/// A ranked document chunk produced by the retrieval gateway.
///
/// Mutated only to set `is_relevant` once the relevancy check has
/// run; all other fields are fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Chunk text
    pub content: String,
    /// Source identifier (document name, URL, or collection key)
    pub source: String,
    /// Category tag (e.g. "deposit_schemes", "general_banking")
    pub category: String,
    /// Similarity score from the backend
    pub relevance_score: f32,
    /// Tri-state relevancy: unknown until checked
    pub is_relevant: Option<bool>,
}

impl RetrievedDocument {
    /// Build a document from a raw search hit, pulling source and
    /// category out of the backend metadata.
    #[must_use]
    pub fn from_hit(hit: SearchHit) -> Self {
        let source = metadata_str(&hit.metadata, "source")
            .or_else(|| metadata_str(&hit.metadata, "source_type"))
            .unwrap_or_else(|| "unknown".to_string());
        let category = metadata_str(&hit.metadata, "category")
            .unwrap_or_else(|| "general".to_string());
        Self {
            content: hit.content,
            source,
            category,
            relevance_score: hit.score,
            is_relevant: None,
        }
    }

    /// Mark the outcome of the relevancy check.
    pub fn set_relevant(&mut self, relevant: bool) {
        self.is_relevant = Some(relevant);
    }
}

fn metadata_str(metadata: &HashMap<String, Value>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}
