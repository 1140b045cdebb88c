//! Ollama-backed embedding and generation providers with retry logic

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::Generator;

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL, without trailing slash
    base_url: String,
    /// Maximum retries
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ModelRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct PullResponse {
    status: String,
}

/// Subset of `/api/show` output logged at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub parameter_size: Option<String>,
    #[serde(default)]
    pub quantization_level: Option<String>,
}

#[derive(Deserialize)]
struct ShowResponse {
    #[serde(default)]
    details: ModelDetails,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(base_url: &str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    /// Base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Ollama request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("retry loop ran zero attempts")))
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Describe a local model; `None` when the server does not have it
    pub async fn show(&self, model: &str) -> Result<Option<ModelDetails>> {
        let url = format!("{}/api/show", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ModelRequest {
                name: model,
                stream: None,
            })
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::internal(format!("show failed: HTTP {} - {}", status, body)));
        }

        let show: ShowResponse = response.json().await?;
        Ok(Some(show.details))
    }

    /// Download a model into the server's local store
    pub async fn pull(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        tracing::info!("Pulling model '{}' from the Ollama registry", model);

        let response = self
            .client
            .post(&url)
            .json(&ModelRequest {
                name: model,
                stream: Some(false),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::internal(format!("pull failed: HTTP {} - {}", status, body)));
        }

        let pull: PullResponse = response.json().await?;
        if pull.status != "success" {
            return Err(Error::internal(format!("pull ended with status '{}'", pull.status)));
        }
        Ok(())
    }

    /// Generate an embedding with retry
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let (url, client) = (url.as_str(), &self.client);

        self.retry_request(|| async move {
            let response = client
                .post(url)
                .json(&EmbedRequest {
                    model,
                    prompt: text,
                })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(Error::internal(format!(
                    "Embedding failed: HTTP {}",
                    response.status()
                )));
            }

            let embed_response: EmbedResponse = response.json().await?;
            Ok(embed_response.embedding)
        })
        .await
    }

    /// Non-streaming generation with retry
    pub async fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let (url, client) = (url.as_str(), &self.client);

        self.retry_request(|| async move {
            let response = client
                .post(url)
                .json(&GenerateRequest {
                    model,
                    prompt,
                    stream: false,
                    options: GenerateOptions { temperature },
                })
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::internal(format!(
                    "Generation failed: HTTP {} - {}",
                    status, body
                )));
            }

            let generate_response: GenerateResponse = response.json().await?;
            Ok(generate_response.response)
        })
        .await
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
    model: String,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = OllamaClient::new(&config.base_url, config.timeout_secs, config.max_retries)?;
        Ok(Self::from_client(Arc::new(client), config.dimensions, config.model.clone()))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize, model: String) -> Self {
        Self {
            client,
            dimensions,
            model,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(&self.model, text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Ollama generation provider; construct with [`OllamaGenerator::load`]
pub struct OllamaGenerator {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    /// Resolve the model on the server, pulling it first when configured to
    pub async fn load(config: &LlmConfig) -> Result<Self> {
        let client = OllamaClient::new(&config.base_url, config.timeout_secs, config.max_retries)
            .map_err(|e| Error::model_load(&config.model, e.to_string()))?;
        let model_err = |e: Error| Error::model_load(&config.model, e.to_string());

        let mut details = client.show(&config.model).await.map_err(model_err)?;

        if details.is_none() && config.pull_if_missing {
            client.pull(&config.model).await.map_err(model_err)?;
            details = client.show(&config.model).await.map_err(model_err)?;
        }

        let details = details.ok_or_else(|| {
            Error::model_load(
                &config.model,
                format!("model is not available on {}", client.base_url()),
            )
        })?;

        tracing::info!(
            "Loaded generation model '{}' (family: {}, size: {})",
            config.model,
            details.family.as_deref().unwrap_or("unknown"),
            details.parameter_size.as_deref().unwrap_or("unknown")
        );

        Ok(Self {
            client: Arc::new(client),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!("Generating with model: {}", self.model);
        self.client
            .generate(&self.model, prompt, self.temperature)
            .await
            .map_err(|e| match e {
                Error::Generation(_) => e,
                other => Error::generation(other.to_string()),
            })
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
