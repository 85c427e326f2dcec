//! Gateway over a vector search backend

use crate::document::{RetrievedDocument, SearchHit};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Vector similarity search contract.
///
/// `search` returns hits ordered by descending similarity. Backends
/// may fail; the [`RetrievalGateway`] absorbs those failures.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Return the top `k` hits for `query`, best first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

/// Absorbing wrapper around a [`VectorSearch`] backend.
///
/// A backend outage yields an empty result set instead of an error,
/// so the retry loop falls through to reformulation or fallback
/// naturally instead of aborting mid-query.
pub struct RetrievalGateway {
    backend: Arc<dyn VectorSearch>,
    top_k: usize,
}

impl RetrievalGateway {
    /// Wrap a backend with the given default result count.
    pub fn new(backend: Arc<dyn VectorSearch>, top_k: usize) -> Self {
        Self { backend, top_k }
    }

    /// Default number of chunks per retrieval.
    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve ranked document chunks for a query.
    #[instrument(skip(self), fields(k = self.top_k))]
    pub async fn retrieve(&self, query: &str) -> Vec<RetrievedDocument> {
        self.retrieve_k(query, self.top_k).await
    }

    /// Retrieve with an explicit result count.
    pub async fn retrieve_k(&self, query: &str, k: usize) -> Vec<RetrievedDocument> {
        match self.backend.search(query, k).await {
            Ok(hits) => {
                debug!(hits = hits.len(), "retrieval complete");
                hits.into_iter().map(RetrievedDocument::from_hit).collect()
            }
            Err(e) => {
                warn!(error = %e, "search backend failed, returning empty result set");
                Vec::new()
            }
        }
    }
}
