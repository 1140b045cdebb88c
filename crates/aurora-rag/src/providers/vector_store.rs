//! Vector index trait for storing and searching chunk embeddings

use async_trait::async_trait;
use crate::error::Result;
use crate::types::{EmbeddingRecord, ScoredChunk};

/// Trait for vector storage and similarity search
///
/// Writes are append-only: records carry fresh ids, so indexing the same
/// text twice stores it twice.
///
/// Implementations:
/// - `PineconeIndex`: hosted Pinecone index over REST
/// - `MemoryIndex`: in-process cosine search
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert records
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Nearest `top_k` chunks to `vector`, most similar first
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>>;

    /// Remove every record
    async fn clear(&self) -> Result<()>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if index is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Vector dimension accepted by the index
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
