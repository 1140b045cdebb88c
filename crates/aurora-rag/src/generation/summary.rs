//! Three-way summarization of free text over the generation model

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::Generator;

/// Summaries requested per text
pub const SUMMARY_COUNT: usize = 3;

/// Original text and its summaries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summaries {
    pub text: String,
    pub summaries: Vec<String>,
}

/// Asks the generator for [`SUMMARY_COUNT`] summaries of a text
#[derive(Clone)]
pub struct Summarizer {
    generator: Arc<dyn Generator>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    fn build_prompt(text: &str) -> String {
        format!(
            "You are a writer. There is text with information. Write {count} summaries about this text. \
Output should be JSON with a \"text\" property holding the original text and a \"summaries\" \
property holding an array of {count} strings.

Text:
{text}",
            count = SUMMARY_COUNT,
            text = text,
        )
    }

    /// Summarize `text`; empty text is rejected before calling the model
    pub async fn summarize(&self, text: &str) -> Result<Summaries> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::message_format("text to summarize is empty"));
        }

        let output = self
            .generator
            .generate(&Self::build_prompt(text))
            .await
            .map_err(|e| match e {
                Error::Generation(_) => e,
                other => Error::generation(other.to_string()),
            })?;

        let summaries = parse_summaries(&output);
        if summaries.is_empty() {
            return Err(Error::generation("model returned no summaries"));
        }

        tracing::info!(
            "Summarized {} bytes into {} summaries with {}",
            text.len(),
            summaries.len(),
            self.generator.model()
        );

        Ok(Summaries {
            text: text.to_string(),
            summaries,
        })
    }
}

/// Summaries from model output: the requested JSON object when the model
/// produced one, otherwise one summary per non-empty line with list markers
/// stripped. At most [`SUMMARY_COUNT`] are kept.
fn parse_summaries(output: &str) -> Vec<String> {
    let json = output
        .find('{')
        .zip(output.rfind('}'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| serde_json::from_str::<serde_json::Value>(&output[start..=end]).ok());

    let summaries: Vec<String> = match json.as_ref().and_then(|v| v["summaries"].as_array()) {
        Some(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => output
            .lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*'))
                    .trim()
                    .to_string()
            })
            .filter(|line| !line.is_empty())
            .collect(),
    };

    summaries.into_iter().take(SUMMARY_COUNT).collect()
}
