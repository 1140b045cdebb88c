//! Answer and ingestion result types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::document::SourceMetadata;

/// Result of a retrieval-QA call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaAnswer {
    /// Generated answer text
    pub answer: String,
    /// Metadata of the chunks used as context, in retrieval order
    pub sources: Vec<SourceMetadata>,
}

impl QaAnswer {
    /// Create a new answer
    pub fn new(answer: String, sources: Vec<SourceMetadata>) -> Self {
        Self { answer, sources }
    }
}

/// Prints the answer followed by its sources, once
impl fmt::Display for QaAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.answer.trim())?;
        writeln!(f)?;
        writeln!(f, "Sources:")?;
        for source in &self.sources {
            writeln!(f, "{}", source.source)?;
        }
        Ok(())
    }
}

/// Outcome for one ingested file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// File was loaded, split and indexed
    Indexed { file: String, chunks: usize },
    /// File failed at some stage
    Failed { file: String, error: String },
}

impl FileOutcome {
    /// Name of the file this outcome refers to
    pub fn file(&self) -> &str {
        match self {
            FileOutcome::Indexed { file, .. } | FileOutcome::Failed { file, .. } => file,
        }
    }
}

/// Per-message ingestion summary
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// Source bucket
    pub bucket: String,
    /// Per-file outcomes
    pub files: Vec<FileOutcome>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl IngestReport {
    /// Empty report for a bucket
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Record a successfully indexed file
    pub fn indexed(&mut self, file: impl Into<String>, chunks: usize) {
        self.files.push(FileOutcome::Indexed {
            file: file.into(),
            chunks,
        });
    }

    /// Record a failed file or object
    pub fn failed(&mut self, file: impl Into<String>, error: &crate::Error) {
        self.files.push(FileOutcome::Failed {
            file: file.into(),
            error: error.to_string(),
        });
    }

    /// Total chunks indexed
    pub fn total_chunks(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f {
                FileOutcome::Indexed { chunks, .. } => *chunks,
                FileOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    /// Number of failed files
    pub fn failure_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Failed { .. }))
            .count()
    }

    /// Every file was indexed
    pub fn is_complete_success(&self) -> bool {
        !self.files.is_empty() && self.failure_count() == 0
    }
}
