//! Error types for the ingestion and question-answering service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or unreadable document
    #[error("Failed to load '{path}': {message}")]
    Load { path: String, message: String },

    /// Bad chunking or settings parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector store unavailable or misconfigured
    #[error("Vector index error: {0}")]
    Index(String),

    /// Generation model could not be resolved or loaded
    #[error("Failed to load model '{model}': {message}")]
    ModelLoad { model: String, message: String },

    /// Inference failure
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Malformed inbound message
    #[error("Malformed message: {0}")]
    MessageFormat(String),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Archive extraction error
    #[error("Archive error: {0}")]
    Archive(String),

    /// Operation exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a load error
    pub fn load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Create a model load error
    pub fn model_load(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create a message format error
    pub fn message_format(message: impl Into<String>) -> Self {
        Self::MessageFormat(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable kind, used in logs and error replies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Load { .. } => "load_error",
            Error::Config(_) => "config_error",
            Error::Index(_) => "index_error",
            Error::ModelLoad { .. } => "model_load_error",
            Error::Generation(_) => "generation_error",
            Error::MessageFormat(_) => "message_format_error",
            Error::Storage(_) => "storage_error",
            Error::Archive(_) => "archive_error",
            Error::Timeout(_) => "timeout",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Index(_) | Error::Storage(_) | Error::Http(_) | Error::Io(_) | Error::Timeout(_)
        )
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Archive(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Config(_) | Error::MessageFormat(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Load { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Index(_) | Error::ModelLoad { .. } | Error::Generation(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::Http(_) | Error::Storage(_) => StatusCode::BAD_GATEWAY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Archive(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::load("a.pdf", "missing").kind(), "load_error");
        assert_eq!(Error::message_format("no BucketName").kind(), "message_format_error");
        assert_eq!(Error::model_load("llama3.2:3b", "not found").kind(), "model_load_error");
    }

    #[test]
    fn test_transient_errors() {
        assert!(Error::index("unreachable").is_transient());
        assert!(Error::storage("timeout").is_transient());
        assert!(!Error::config("bad overlap").is_transient());
        assert!(!Error::generation("oom").is_transient());
    }

    #[test]
    fn test_load_error_display() {
        let err = Error::load("/tmp/book.pdf", "file does not exist");
        assert_eq!(err.to_string(), "Failed to load '/tmp/book.pdf': file does not exist");
    }
}
