//! Prompt construction and summarization over the generation model

pub mod prompt;
mod summary;

pub use prompt::PromptBuilder;
pub use summary::{Summaries, Summarizer, SUMMARY_COUNT};
