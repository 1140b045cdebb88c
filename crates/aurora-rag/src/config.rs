//! Configuration for the ingestion and question-answering service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::retrieval::Retriever;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// HTTP front configuration
    pub server: ServerConfig,
    /// Queue names and capacities
    pub broker: BrokerConfig,
    /// Object storage configuration
    pub storage: StorageConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Generation model configuration
    pub llm: LlmConfig,
    /// Ingestion processing configuration
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = Settings::load(path)?;
        Self::from_settings(&settings)
    }

    /// Build configuration from an already-parsed settings view
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut config = toml::Value::try_into::<RagConfig>(settings.value.clone())
            .map_err(|e| Error::config(format!("Invalid configuration: {}", e)))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Credentials are usually injected through the environment rather than the file
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("PINECONE_API_KEY") {
            if !key.trim().is_empty() {
                self.vector_db.api_key = Some(key);
            }
        }
        if let Ok(key_id) = std::env::var("AWS_ACCESS_KEY_ID") {
            self.storage.access_key_id.get_or_insert(key_id);
        }
        if let Ok(secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key.get_or_insert(secret);
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.embeddings.dimensions == 0 {
            return Err(Error::config("embeddings.dimensions must be greater than zero"));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be greater than zero"));
        }
        if self.vector_db.top_k != Retriever::DEFAULT_K {
            return Err(Error::config(format!(
                "vector_db.top_k must be {} (got {})",
                Retriever::DEFAULT_K,
                self.vector_db.top_k
            )));
        }
        if self.vector_db.index_name.trim().is_empty() {
            return Err(Error::config("vector_db.index_name must not be empty"));
        }
        if self.vector_db.backend == VectorBackend::Pinecone && self.vector_db.api_key.is_none() {
            return Err(Error::config(
                "vector_db.api_key (or PINECONE_API_KEY) is required for the pinecone backend",
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(Error::config("llm.model must not be empty"));
        }
        if self.broker.queue_capacity == 0 {
            return Err(Error::config("broker.queue_capacity must be greater than zero"));
        }
        if self.broker.document_queue == self.broker.question_queue {
            return Err(Error::config("document and question queues must differ"));
        }
        if self.storage.backend == StorageBackend::Local && self.storage.root.is_none() {
            return Err(Error::config("storage.root is required for the local storage backend"));
        }

        Ok(())
    }
}

/// Named lookups over the raw configuration file
///
/// Keys are dotted paths, e.g. `vector_db.index_name`.
#[derive(Debug, Clone)]
pub struct Settings {
    value: toml::Value,
}

impl Settings {
    /// Read and parse a TOML settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse settings from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let value: toml::Value = toml::from_str(raw)
            .map_err(|e| Error::config(format!("Invalid TOML: {}", e)))?;
        Ok(Self { value })
    }

    fn lookup(&self, key: &str) -> Option<&toml::Value> {
        key.split('.')
            .try_fold(&self.value, |value, part| value.get(part))
    }

    /// String value at `key`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.lookup(key).and_then(|v| v.as_str())
    }

    /// Numeric value at `key` (integers are widened)
    pub fn get_number(&self, key: &str) -> Option<f64> {
        match self.lookup(key)? {
            toml::Value::Integer(i) => Some(*i as f64),
            toml::Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String value at `key`, failing with a config error when absent
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)
            .ok_or_else(|| Error::config(format!("Missing setting '{}'", key)))
    }
}

/// HTTP front configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// How long a question request waits for its reply
    pub reply_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            reply_timeout_secs: 300,
        }
    }
}

/// Queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Queue carrying document messages
    pub document_queue: String,
    /// Queue carrying question messages
    pub question_queue: String,
    /// Buffered messages per queue
    pub queue_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            document_queue: "documents".to_string(),
            question_queue: "questions".to_string(),
            queue_capacity: 256,
        }
    }
}

/// Object storage backend
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Buckets are directories under `storage.root`
    Local,
    /// S3-compatible object storage
    #[default]
    S3,
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend
    pub backend: StorageBackend,
    /// Root directory holding one directory per bucket (local backend)
    pub root: Option<PathBuf>,
    /// Region (s3 backend)
    pub region: String,
    /// Custom endpoint, e.g. a MinIO server (s3 backend)
    pub endpoint: Option<String>,
    /// Access key id (s3 backend)
    pub access_key_id: Option<String>,
    /// Secret access key (s3 backend)
    pub secret_access_key: Option<String>,
    /// Local working directory for downloaded and unpacked documents
    pub work_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            root: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            work_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("aurora-rag")
                .join("documents"),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Size and overlap must both be positive and overlap must be smaller than size
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than zero"));
        }
        if self.chunk_overlap == 0 {
            return Err(Error::config("chunk_overlap must be greater than zero"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama base URL serving the embedding model
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions (must match the vector index)
    pub dimensions: usize,
    /// Chunks embedded per batch
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Vector index backend
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Hosted Pinecone index
    #[default]
    Pinecone,
    /// In-process index (not persisted)
    Memory,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Backend
    pub backend: VectorBackend,
    /// API key
    pub api_key: Option<String>,
    /// Expected environment or region of the index (checked when set)
    pub environment: Option<String>,
    /// Index name; the index must already exist
    pub index_name: String,
    /// Control plane base URL
    pub controller_url: String,
    /// Namespace inside the index
    pub namespace: String,
    /// Nearest chunks returned per query; only 2 is accepted
    pub top_k: usize,
    /// Vectors per upsert request
    pub upsert_batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Pinecone,
            api_key: None,
            environment: None,
            index_name: "docuaurora".to_string(),
            controller_url: "https://api.pinecone.io".to_string(),
            namespace: String::new(),
            top_k: Retriever::DEFAULT_K,
            upsert_batch_size: 100,
            timeout_secs: 30,
        }
    }
}

/// Generation model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Pull the model at startup when it is not present locally
    pub pull_if_missing: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            temperature: 0.1,
            timeout_secs: 300,
            max_retries: 2,
            pull_if_missing: false,
        }
    }
}

/// Ingestion processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Retries for downloads and index writes
    pub max_retries: u32,
    /// Base backoff between retries in milliseconds (doubled per attempt)
    pub retry_backoff_ms: u64,
    /// Timeout for loading, splitting and indexing one file
    pub file_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 500,
            file_timeout_secs: 600,
        }
    }
}
