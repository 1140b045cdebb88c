//! Indexing, retrieval and retrieval-augmented answering

mod indexer;
mod qa;
mod retriever;

#[cfg(test)]
pub(crate) mod testing;

pub use indexer::IndexingService;
pub use qa::RetrievalQa;
pub use retriever::Retriever;
