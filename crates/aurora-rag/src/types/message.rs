//! Queue message envelopes

use serde::{Deserialize, Serialize};

use super::document::SourceMetadata;
use crate::error::{Error, Result};

/// One object key or a list of keys
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DocumentNames {
    One(String),
    Many(Vec<String>),
}

impl DocumentNames {
    /// All keys, in message order
    pub fn keys(&self) -> Vec<&str> {
        match self {
            DocumentNames::One(key) => vec![key.as_str()],
            DocumentNames::Many(keys) => keys.iter().map(String::as_str).collect(),
        }
    }
}

/// Request to ingest documents from a storage bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMessage {
    #[serde(rename = "BucketName")]
    pub bucket_name: String,
    #[serde(rename = "DocumentNames")]
    pub document_names: DocumentNames,
}

impl DocumentMessage {
    /// Parse and validate a message body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let message: Self = serde_json::from_slice(body)
            .map_err(|e| Error::message_format(format!("document message: {}", e)))?;
        message.validate()?;
        Ok(message)
    }

    /// Bucket and keys must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.bucket_name.trim().is_empty() {
            return Err(Error::message_format("document message: BucketName is empty"));
        }
        let keys = self.document_names.keys();
        if keys.is_empty() {
            return Err(Error::message_format("document message: DocumentNames is empty"));
        }
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(Error::message_format(
                "document message: DocumentNames contains an empty key",
            ));
        }
        Ok(())
    }
}

/// Question payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionPayload {
    #[serde(rename = "InputQuestion")]
    pub input_question: String,
}

/// Question to answer from the indexed documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionMessage {
    #[serde(rename = "CommandName")]
    pub command_name: String,
    #[serde(rename = "Payload")]
    pub payload: QuestionPayload,
}

impl QuestionMessage {
    /// Create a question message
    pub fn new(command_name: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            command_name: command_name.into(),
            payload: QuestionPayload {
                input_question: question.into(),
            },
        }
    }

    /// Parse a message body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let message: Self = serde_json::from_slice(body)
            .map_err(|e| Error::message_format(format!("question message: {}", e)))?;
        if message.payload.input_question.trim().is_empty() {
            return Err(Error::message_format("question message: InputQuestion is empty"));
        }
        Ok(message)
    }
}

/// Answer payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerPayload {
    #[serde(rename = "InputQuestion")]
    pub input_question: String,
    #[serde(rename = "Answer")]
    pub answer: String,
    #[serde(rename = "Sources", default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceMetadata>,
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply published for every question message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResponse {
    #[serde(rename = "CommandName")]
    pub command_name: String,
    #[serde(rename = "Payload")]
    pub payload: AnswerPayload,
}

impl AnswerResponse {
    /// Successful answer echoing the original command and question
    pub fn answered(
        question: &QuestionMessage,
        answer: String,
        sources: Vec<SourceMetadata>,
    ) -> Self {
        Self {
            command_name: question.command_name.clone(),
            payload: AnswerPayload {
                input_question: question.payload.input_question.clone(),
                answer,
                sources,
                error: None,
            },
        }
    }

    /// Error-flagged reply
    pub fn failed(
        command_name: impl Into<String>,
        input_question: impl Into<String>,
        error: &Error,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            payload: AnswerPayload {
                input_question: input_question.into(),
                answer: String::new(),
                sources: Vec::new(),
                error: Some(format!("{}: {}", error.kind(), error)),
            },
        }
    }

    /// Whether this reply carries an error
    pub fn is_error(&self) -> bool {
        self.payload.error.is_some()
    }

    /// Serialize for publishing
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_names_single_or_list() {
        let single = DocumentMessage::from_slice(
            br#"{"BucketName":"books","DocumentNames":"yoke.zip"}"#,
        )
        .unwrap();
        assert_eq!(single.document_names.keys(), vec!["yoke.zip"]);

        let many = DocumentMessage::from_slice(
            br#"{"BucketName":"books","DocumentNames":["a.pdf","b.zip"]}"#,
        )
        .unwrap();
        assert_eq!(many.document_names.keys(), vec!["a.pdf", "b.zip"]);
    }

    #[test]
    fn test_document_message_missing_bucket() {
        let err = DocumentMessage::from_slice(br#"{"DocumentNames":"a.pdf"}"#).unwrap_err();
        assert!(matches!(err, Error::MessageFormat(_)));

        let err = DocumentMessage::from_slice(br#"{"BucketName":" ","DocumentNames":"a.pdf"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MessageFormat(_)));

        let err = DocumentMessage::from_slice(br#"{"BucketName":"b","DocumentNames":[]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MessageFormat(_)));
    }

    #[test]
    fn test_question_message_parse() {
        let msg = QuestionMessage::from_slice(
            br#"{"CommandName":"ask","Payload":{"InputQuestion":"What is 2+2?"}}"#,
        )
        .unwrap();
        assert_eq!(msg.command_name, "ask");
        assert_eq!(msg.payload.input_question, "What is 2+2?");

        assert!(matches!(
            QuestionMessage::from_slice(br#"{"CommandName":"ask","Payload":{}}"#),
            Err(Error::MessageFormat(_))
        ));
        assert!(matches!(
            QuestionMessage::from_slice(b"not json"),
            Err(Error::MessageFormat(_))
        ));
    }

    #[test]
    fn test_answer_response_wire_format() {
        let question = QuestionMessage::new("ask", "Who wrote Under the Yoke?");
        let reply = AnswerResponse::answered(&question, "Ivan Vazov".to_string(), Vec::new());
        let json: serde_json::Value = serde_json::from_slice(&reply.to_vec().unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "CommandName": "ask",
                "Payload": {
                    "InputQuestion": "Who wrote Under the Yoke?",
                    "Answer": "Ivan Vazov"
                }
            })
        );
    }

    #[test]
    fn test_failed_reply_is_flagged() {
        let reply = AnswerResponse::failed("ask", "q", &Error::generation("model crashed"));
        assert!(reply.is_error());
        assert!(reply.payload.answer.is_empty());
        assert!(reply.payload.error.unwrap().starts_with("generation_error"));
    }
}
