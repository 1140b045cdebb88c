//! "Stuff" prompt template: every retrieved chunk goes into one prompt

use crate::types::ScoredChunk;

/// Separator placed between chunk texts in the context block
const CHUNK_SEPARATOR: &str = "\n\n";

/// Prompt builder for retrieval QA
pub struct PromptBuilder;

impl PromptBuilder {
    /// Concatenate chunk texts verbatim, in retrieval order
    pub fn build_context(chunks: &[ScoredChunk]) -> String {
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR)
    }

    /// Build the single generation prompt from the retrieved chunks and the question
    pub fn build_stuff_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
        format!(
            "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:",
            context = Self::build_context(chunks),
            question = question.trim(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceMetadata;

    fn chunk(text: &str) -> ScoredChunk {
        ScoredChunk {
            text: text.to_string(),
            metadata: SourceMetadata::new("book.pdf", 0),
            score: 0.5,
        }
    }

    #[test]
    fn test_chunks_stuffed_verbatim_in_order() {
        let prompt = PromptBuilder::build_stuff_prompt(
            "Who wrote Under the Yoke?",
            &[chunk("Ivan Vazov wrote Under the Yoke."), chunk("  It was published in 1894.")],
        );

        let first = prompt.find("Ivan Vazov wrote Under the Yoke.").unwrap();
        let second = prompt.find("  It was published in 1894.").unwrap();
        assert!(first < second);
        assert!(prompt.ends_with("Question: Who wrote Under the Yoke?\nHelpful Answer:"));
    }

    #[test]
    fn test_empty_context_still_builds_prompt() {
        let prompt = PromptBuilder::build_stuff_prompt("What is 2+2?", &[]);
        assert!(prompt.contains("Question: What is 2+2?"));
        assert_eq!(PromptBuilder::build_context(&[]), "");
    }
}
