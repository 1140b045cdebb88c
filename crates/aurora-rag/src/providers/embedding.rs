//! Embedding provider trait

use async_trait::async_trait;
use crate::error::Result;

/// Maps chunk and query text to vectors of a fixed dimension
///
/// The same provider must be used for indexing and for querying, otherwise
/// similarity scores are meaningless.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, one vector per text in input order.
    /// Calls `embed` one text at a time unless overridden.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    /// Whether the backing service answers
    async fn health_check(&self) -> Result<bool>;

    fn name(&self) -> &str;

    /// Embedding model identifier
    fn model(&self) -> &str;
}
