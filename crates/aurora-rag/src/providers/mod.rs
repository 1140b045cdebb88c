//! Provider abstractions for embeddings, generation and vector indexes
//!
//! Trait-based so the pipeline can run against Ollama and Pinecone in
//! production and in-process fakes in tests.

pub mod embedding;
pub mod llm;
pub mod vector_store;
pub mod ollama;
pub mod pinecone;
pub mod memory;

pub use embedding::EmbeddingProvider;
pub use llm::Generator;
pub use memory::MemoryIndex;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaGenerator};
pub use pinecone::PineconeIndex;
pub use vector_store::VectorIndex;
