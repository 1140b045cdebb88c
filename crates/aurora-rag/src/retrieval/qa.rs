//! Retrieval-augmented question answering

use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::Generator;
use crate::types::QaAnswer;

use super::retriever::Retriever;

/// Retriever and generator bound together with "stuff" composition:
/// all retrieved chunks go verbatim into a single prompt.
#[derive(Clone)]
pub struct RetrievalQa {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
}

impl RetrievalQa {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieve, build one prompt, generate. Nothing is cached.
    ///
    /// An empty retrieval still generates from an empty context.
    pub async fn answer(&self, query: &str) -> Result<QaAnswer> {
        let start = Instant::now();
        let chunks = self.retriever.retrieve(query).await?;

        if chunks.is_empty() {
            tracing::info!("No indexed context for question, generating without it");
        }

        let prompt = PromptBuilder::build_stuff_prompt(query, &chunks);
        let answer = self.generator.generate(&prompt).await.map_err(|e| match e {
            Error::Generation(_) => e,
            other => Error::generation(other.to_string()),
        })?;

        tracing::info!(
            "Answered with {} ({} context chunks) in {}ms",
            self.generator.model(),
            chunks.len(),
            start.elapsed().as_millis()
        );

        let sources = chunks.into_iter().map(|c| c.metadata).collect();
        Ok(QaAnswer::new(answer, sources))
    }
}
