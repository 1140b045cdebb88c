//! Load-and-split orchestration for a single local file

use std::path::Path;
use std::sync::Arc;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::TextChunk;

use super::chunker::TextChunker;
use super::loader::{DocumentLoader, PdfLoader};

/// Turns a local document into chunks ready for indexing
#[derive(Clone)]
pub struct IngestPipeline {
    /// Document loader
    loader: Arc<dyn DocumentLoader>,
    /// Text chunker
    chunker: TextChunker,
}

impl IngestPipeline {
    /// Create a pipeline with a custom loader
    pub fn new(loader: Arc<dyn DocumentLoader>, chunker: TextChunker) -> Self {
        Self { loader, chunker }
    }

    /// PDF pipeline from chunking configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(PdfLoader::new()),
            TextChunker::from_config(config)?,
        ))
    }

    /// Whether the loader accepts this file
    pub fn supports(&self, path: &Path) -> bool {
        self.loader.supports(path)
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    /// Load a file and split its pages into chunks.
    ///
    /// Blocking; callers on the runtime should use `spawn_blocking`.
    pub fn load_and_split(&self, path: &Path) -> Result<Vec<TextChunk>> {
        if !self.supports(path) {
            return Err(Error::load(
                path.to_string_lossy(),
                "unsupported file type",
            ));
        }

        let pages = self.loader.load(path)?;
        let chunks = self.chunker.split_pages(&pages);

        tracing::debug!(
            "Split {} into {} chunks across {} pages",
            path.display(),
            chunks.len(),
            pages.len()
        );
        Ok(chunks)
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(
            Arc::new(PdfLoader::new()),
            TextChunker::default(),
        )
    }
}
