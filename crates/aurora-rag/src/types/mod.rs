//! Core types for the service

pub mod document;
pub mod message;
pub mod response;

pub use document::{EmbeddingRecord, PageSegment, ScoredChunk, SourceMetadata, TextChunk};
pub use message::{AnswerResponse, DocumentMessage, DocumentNames, QuestionMessage};
pub use response::{FileOutcome, IngestReport, QaAnswer};
