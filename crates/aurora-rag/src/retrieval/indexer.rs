//! Chunk embedding and index writes

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorIndex};
use crate::types::{EmbeddingRecord, TextChunk};

use super::retriever::Retriever;

/// Embeds chunks and appends them to a vector index
pub struct IndexingService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
    top_k: usize,
}

impl IndexingService {
    /// Bind an embedder to an index; their dimensions must agree
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        batch_size: usize,
        top_k: usize,
    ) -> Result<Self> {
        if embedder.dimensions() != index.dimensions() {
            return Err(Error::index(format!(
                "embedder '{}' produces {} dimensions but index '{}' expects {}",
                embedder.name(),
                embedder.dimensions(),
                index.name(),
                index.dimensions()
            )));
        }

        Ok(Self {
            embedder,
            index,
            batch_size: batch_size.max(1),
            top_k,
        })
    }

    /// Retriever over the bound index
    pub fn retriever(&self) -> Retriever {
        Retriever::new(Arc::clone(&self.embedder), Arc::clone(&self.index), self.top_k)
    }

    /// Embed and upsert every chunk.
    ///
    /// Append-only: indexing the same chunks again stores duplicates.
    pub async fn index(&self, chunks: &[TextChunk]) -> Result<Retriever> {
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| Error::index(format!("embedding failed: {}", e)))?;

            if vectors.len() != batch.len() {
                return Err(Error::index(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }

            let records: Vec<EmbeddingRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, values)| EmbeddingRecord::new(chunk, values))
                .collect();

            self.index.upsert(&records).await.map_err(|e| match e {
                Error::Index(_) => e,
                other => Error::index(other.to_string()),
            })?;
        }

        tracing::debug!("Indexed {} chunks into {}", chunks.len(), self.index.name());
        Ok(self.retriever())
    }

    /// Remove every record from the index
    pub async fn clear(&self) -> Result<()> {
        self.index.clear().await
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryIndex;
    use crate::retrieval::testing::BagOfWordsEmbedder;
    use crate::types::SourceMetadata;

    fn chunk(text: &str) -> TextChunk {
        TextChunk {
            text: text.to_string(),
            metadata: SourceMetadata::new("/work/books/yoke.pdf", 0),
            index: 0,
            char_start: 0,
        }
    }

    fn service(index: Arc<MemoryIndex>) -> IndexingService {
        IndexingService::new(Arc::new(BagOfWordsEmbedder::new()), index, 2, 2).unwrap()
    }

    #[tokio::test]
    async fn test_index_returns_top_two_retriever() {
        let index = Arc::new(MemoryIndex::new(BagOfWordsEmbedder::DIMENSIONS));
        let chunks = vec![
            chunk("Ivan Vazov wrote Under the Yoke."),
            chunk("Sofia is the capital of Bulgaria."),
            chunk("The Balkan mountains cross Bulgaria."),
        ];

        let retriever = service(Arc::clone(&index)).index(&chunks).await.unwrap();
        assert_eq!(retriever.k(), 2);
        assert_eq!(index.len().await.unwrap(), 3);

        let hits = retriever.retrieve("Who wrote Under the Yoke?").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "Ivan Vazov wrote Under the Yoke.");
    }

    #[tokio::test]
    async fn test_reindexing_duplicates_records() {
        let index = Arc::new(MemoryIndex::new(BagOfWordsEmbedder::DIMENSIONS));
        let service = service(Arc::clone(&index));
        let chunks = vec![chunk("Ivan Vazov wrote Under the Yoke.")];

        service.index(&chunks).await.unwrap();
        let retriever = service.index(&chunks).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 2);

        let hits = retriever.retrieve("Under the Yoke").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, hits[1].text);

        service.clear().await.unwrap();
        assert!(index.is_empty().await.unwrap());
    }

    #[test]
    fn test_dimension_mismatch_is_index_error() {
        let result = IndexingService::new(
            Arc::new(BagOfWordsEmbedder::new()),
            Arc::new(MemoryIndex::new(3)),
            8,
            2,
        );
        assert!(matches!(result, Err(Error::Index(_))));
    }
}
