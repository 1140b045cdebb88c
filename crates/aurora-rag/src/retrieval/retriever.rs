//! Nearest-chunk retrieval bound to one index

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorIndex};
use crate::types::ScoredChunk;

/// Embeds a query and returns the `k` nearest chunks from the bound index
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    k: usize,
}

impl Retriever {
    /// Chunks returned per query unless configured otherwise
    pub const DEFAULT_K: usize = 2;

    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>, k: usize) -> Self {
        Self { embedder, index, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Top-k chunks for `query`, most similar first
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| Error::index(format!("failed to embed query: {}", e)))?;

        let hits = self.index.query(&vector, self.k).await.map_err(|e| match e {
            Error::Index(_) => e,
            other => Error::index(other.to_string()),
        })?;

        tracing::debug!(
            "Retrieved {} chunks from {} (k = {})",
            hits.len(),
            self.index.name(),
            self.k
        );
        Ok(hits)
    }
}
