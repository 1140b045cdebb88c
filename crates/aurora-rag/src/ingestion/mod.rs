//! Document ingestion: loading, chunking and bundle extraction

pub mod archive;
mod chunker;
pub mod loader;
mod processor;

pub use chunker::TextChunker;
pub use loader::{DocumentLoader, PdfLoader};
pub use processor::IngestPipeline;
