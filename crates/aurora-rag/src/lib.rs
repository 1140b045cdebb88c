//! aurora-rag: queue-driven PDF ingestion and retrieval-augmented question answering
//!
//! Document messages name PDFs (or zip archives of PDFs) in an object store
//! bucket. Each file is split into overlapping chunks, embedded and written to
//! a vector index. Question messages are answered by retrieving the closest
//! chunks and stuffing them into a single prompt for the generation model; the
//! answer goes back to the reply queue named on the message.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod messaging;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use messaging::{IngestConsumer, MessageBroker, QuestionConsumer};
pub use retrieval::{IndexingService, RetrievalQa, Retriever};
pub use types::{
    AnswerResponse, DocumentMessage, IngestReport, QaAnswer, QuestionMessage, ScoredChunk,
    SourceMetadata, TextChunk,
};
