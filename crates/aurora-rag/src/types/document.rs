//! Page, chunk and index record types with source tracking

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Where a piece of text came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Local path of the originating file
    pub source: String,
    /// Page number (0-indexed)
    pub page: u32,
}

impl SourceMetadata {
    /// Create source metadata for a page
    pub fn new(source: impl Into<String>, page: u32) -> Self {
        Self {
            source: source.into(),
            page,
        }
    }

    /// File name component of the source path
    pub fn file_name(&self) -> &str {
        std::path::Path::new(&self.source)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.source)
    }

    /// Format source for display
    pub fn format_citation(&self) -> String {
        format!("{} (page {})", self.source, self.page + 1)
    }

    /// Flatten into index metadata
    pub fn to_metadata(&self) -> HashMap<String, serde_json::Value> {
        let mut meta = HashMap::new();
        meta.insert("source".to_string(), serde_json::json!(self.source));
        meta.insert("page".to_string(), serde_json::json!(self.page));
        meta
    }

    /// Rebuild from index metadata
    pub fn from_metadata(meta: &HashMap<String, serde_json::Value>) -> Option<Self> {
        let source = meta.get("source")?.as_str()?.to_string();
        let page = meta
            .get("page")
            .and_then(|p| p.as_u64())
            .unwrap_or(0) as u32;
        Some(Self { source, page })
    }
}

/// Text of a single page as produced by a document loader
#[derive(Debug, Clone, PartialEq)]
pub struct PageSegment {
    /// Page text
    pub text: String,
    /// Originating file and page
    pub metadata: SourceMetadata,
}

impl PageSegment {
    /// Create a new page segment
    pub fn new(text: impl Into<String>, metadata: SourceMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// A bounded span of page text, the unit of embedding and retrieval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextChunk {
    /// Text content
    pub text: String,
    /// Inherited page metadata
    pub metadata: SourceMetadata,
    /// Chunk index within its page
    pub index: u32,
    /// Character offset of the chunk within the page text
    pub char_start: usize,
}

impl TextChunk {
    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A vector with the chunk it was computed from, as stored in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Index-assigned record id
    pub id: String,
    /// Embedding vector
    pub values: Vec<f32>,
    /// Chunk text
    pub text: String,
    /// Chunk source metadata
    pub metadata: SourceMetadata,
}

impl EmbeddingRecord {
    /// Create a record with a fresh id
    pub fn new(chunk: &TextChunk, values: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            values,
            text: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
        }
    }

    /// Metadata stored alongside the vector, including the chunk text
    pub fn to_vector_metadata(&self) -> HashMap<String, serde_json::Value> {
        let mut meta = self.metadata.to_metadata();
        meta.insert("text".to_string(), serde_json::json!(self.text));
        meta
    }
}

/// A chunk returned by a similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Chunk text
    pub text: String,
    /// Chunk source metadata
    pub metadata: SourceMetadata,
    /// Similarity score (higher is more similar)
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_round_trip_through_index_fields() {
        let meta = SourceMetadata::new("/work/books/yoke.pdf", 3);
        let chunk = TextChunk {
            text: "Ivan Vazov".to_string(),
            metadata: meta.clone(),
            index: 0,
            char_start: 0,
        };
        let record = EmbeddingRecord::new(&chunk, vec![0.1, 0.2]);
        let fields = record.to_vector_metadata();

        assert_eq!(fields["text"], serde_json::json!("Ivan Vazov"));
        assert_eq!(SourceMetadata::from_metadata(&fields), Some(meta));
    }

    #[test]
    fn test_records_get_distinct_ids() {
        let chunk = TextChunk {
            text: "same".to_string(),
            metadata: SourceMetadata::new("a.pdf", 0),
            index: 0,
            char_start: 0,
        };
        let a = EmbeddingRecord::new(&chunk, vec![1.0]);
        let b = EmbeddingRecord::new(&chunk, vec![1.0]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_file_name_and_citation() {
        let meta = SourceMetadata::new("/work/books/yoke.pdf", 0);
        assert_eq!(meta.file_name(), "yoke.pdf");
        assert_eq!(meta.format_citation(), "/work/books/yoke.pdf (page 1)");
    }
}
