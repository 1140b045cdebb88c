//! In-process vector index with brute-force cosine search

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::providers::vector_store::VectorIndex;
use crate::types::{EmbeddingRecord, ScoredChunk};

/// Vector index kept in memory; contents are lost on restart
pub struct MemoryIndex {
    dimensions: usize,
    records: RwLock<Vec<EmbeddingRecord>>,
}

impl MemoryIndex {
    /// Create an empty index for vectors of `dimensions`
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            records: RwLock::new(Vec::new()),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if let Some(bad) = records.iter().find(|r| r.values.len() != self.dimensions) {
            return Err(Error::index(format!(
                "vector of dimension {} does not fit index of dimension {}",
                bad.values.len(),
                self.dimensions
            )));
        }

        self.records.write().extend_from_slice(records);
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        if vector.len() != self.dimensions {
            return Err(Error::index(format!(
                "query vector of dimension {} does not fit index of dimension {}",
                vector.len(),
                self.dimensions
            )));
        }

        let records = self.records.read();
        let mut scored: Vec<ScoredChunk> = records
            .iter()
            .map(|r| ScoredChunk {
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score: cosine_similarity(vector, &r.values),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
