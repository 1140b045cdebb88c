//! Pinecone vector index over its REST API
//!
//! The control plane is asked once, at connect time, whether the index exists
//! and matches the embedder; data-plane calls then go straight to the index host.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::providers::vector_store::VectorIndex;
use crate::types::{EmbeddingRecord, ScoredChunk, SourceMetadata};

const API_VERSION: &str = "2024-07";

/// Connected Pinecone index
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    /// Data-plane base URL, e.g. `https://books-abc123.svc.us-east1-gcp.pinecone.io`
    host: String,
    index_name: String,
    namespace: String,
    dimensions: usize,
    upsert_batch_size: usize,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    name: String,
    dimension: usize,
    host: String,
    #[serde(default)]
    spec: IndexSpec,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct IndexSpec {
    #[serde(default)]
    pod: Option<PodSpec>,
    #[serde(default)]
    serverless: Option<ServerlessSpec>,
}

#[derive(Debug, Deserialize)]
struct PodSpec {
    environment: String,
}

#[derive(Debug, Deserialize)]
struct ServerlessSpec {
    region: String,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

impl IndexDescription {
    /// Pod environment or serverless region
    fn location(&self) -> Option<&str> {
        self.spec
            .pod
            .as_ref()
            .map(|p| p.environment.as_str())
            .or_else(|| self.spec.serverless.as_ref().map(|s| s.region.as_str()))
    }

    /// Fail unless the index can take vectors of `dimensions` in the expected location
    fn check(&self, expected_environment: Option<&str>, dimensions: usize) -> Result<()> {
        if self.dimension != dimensions {
            return Err(Error::index(format!(
                "index '{}' has dimension {} but the embedder produces {}",
                self.name, self.dimension, dimensions
            )));
        }

        if let Some(expected) = expected_environment {
            match self.location() {
                Some(actual) if actual == expected => {}
                actual => {
                    return Err(Error::index(format!(
                        "index '{}' is in '{}', expected '{}'",
                        self.name,
                        actual.unwrap_or("unknown"),
                        expected
                    )));
                }
            }
        }

        if matches!(self.status, Some(IndexStatus { ready: false })) {
            tracing::warn!("Pinecone index '{}' reports it is not ready yet", self.name);
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
    namespace: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct Match {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: usize,
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: usize,
}

impl PineconeIndex {
    /// Connect to an existing index and verify it accepts `dimensions`-sized vectors
    pub async fn connect(config: &VectorDbConfig, dimensions: usize) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::index("no Pinecone API key configured"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::index(format!("Failed to create HTTP client: {}", e)))?;

        let url = format!(
            "{}/indexes/{}",
            config.controller_url.trim_end_matches('/'),
            config.index_name
        );

        let response = client
            .get(&url)
            .header("Api-Key", &api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| Error::index(format!("Pinecone is unreachable: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(Error::index(format!(
                    "index '{}' does not exist",
                    config.index_name
                )));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::index("Pinecone rejected the API key"));
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::index(format!(
                    "describe index failed ({}): {}",
                    status, body
                )));
            }
            _ => {}
        }

        let description: IndexDescription = response
            .json()
            .await
            .map_err(|e| Error::index(format!("Failed to parse index description: {}", e)))?;
        description.check(config.environment.as_deref(), dimensions)?;

        let host = if description.host.starts_with("http") {
            description.host.clone()
        } else {
            format!("https://{}", description.host)
        };

        tracing::info!(
            "Connected to Pinecone index '{}' at {} (dimension {})",
            description.name,
            host,
            description.dimension
        );

        Ok(Self {
            client,
            api_key,
            host,
            index_name: description.name,
            namespace: config.namespace.clone(),
            dimensions,
            upsert_batch_size: config.upsert_batch_size.max(1),
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        let response = self
            .post(path)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::index(format!("Pinecone {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::index(format!(
                "Pinecone {} failed ({}): {}",
                path, status, body
            )));
        }
        Ok(response)
    }
}

/// Rebuild a scored chunk from stored metadata
fn match_to_chunk(m: Match) -> ScoredChunk {
    let text = m
        .metadata
        .get("text")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();
    let metadata =
        SourceMetadata::from_metadata(&m.metadata).unwrap_or_else(|| SourceMetadata::new("", 0));

    ScoredChunk {
        text,
        metadata,
        score: m.score,
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        for batch in records.chunks(self.upsert_batch_size) {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|r| PineconeVector {
                        id: &r.id,
                        values: &r.values,
                        metadata: r.to_vector_metadata(),
                    })
                    .collect(),
                namespace: &self.namespace,
            };
            self.send("/vectors/upsert", &request).await?;
        }

        tracing::debug!("Upserted {} vectors into '{}'", records.len(), self.index_name);
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: &self.namespace,
        };

        let response: QueryResponse = self
            .send("/query", &request)
            .await?
            .json()
            .await
            .map_err(|e| Error::index(format!("Failed to parse query response: {}", e)))?;

        Ok(response.matches.into_iter().map(match_to_chunk).collect())
    }

    async fn clear(&self) -> Result<()> {
        let request = DeleteRequest {
            delete_all: true,
            namespace: &self.namespace,
        };

        match self.post("/vectors/delete").json(&request).send().await {
            // an empty namespace answers 404
            Ok(r) if r.status().is_success() || r.status() == StatusCode::NOT_FOUND => {
                tracing::info!("Cleared Pinecone index '{}'", self.index_name);
                Ok(())
            }
            Ok(r) => Err(Error::index(format!("Pinecone delete failed ({})", r.status()))),
            Err(e) => Err(Error::index(format!("Pinecone delete failed: {}", e))),
        }
    }

    async fn len(&self) -> Result<usize> {
        let stats: StatsResponse = self
            .send("/describe_index_stats", &serde_json::json!({}))
            .await?
            .json()
            .await
            .map_err(|e| Error::index(format!("Failed to parse index stats: {}", e)))?;

        if self.namespace.is_empty() {
            return Ok(stats.total_vector_count);
        }
        Ok(stats
            .namespaces
            .get(&self.namespace)
            .map(|ns| ns.vector_count)
            .unwrap_or(0))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.len().await.is_ok())
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(json: &str) -> IndexDescription {
        serde_json::from_str(json).unwrap()
    }

    const POD_INDEX: &str = r#"{
        "name": "docuaurora",
        "dimension": 768,
        "metric": "cosine",
        "host": "docuaurora-abc123.svc.gcp-starter.pinecone.io",
        "spec": {"pod": {"environment": "gcp-starter", "pod_type": "starter"}},
        "status": {"ready": true, "state": "Ready"}
    }"#;

    #[test]
    fn test_description_accepts_matching_index() {
        let desc = describe(POD_INDEX);
        assert_eq!(desc.location(), Some("gcp-starter"));
        assert!(desc.check(Some("gcp-starter"), 768).is_ok());
        assert!(desc.check(None, 768).is_ok());
    }

    #[test]
    fn test_description_rejects_dimension_mismatch() {
        let err = describe(POD_INDEX).check(None, 384).unwrap_err();
        assert!(matches!(err, Error::Index(_)));
        assert!(err.to_string().contains("384"));
    }

    #[test]
    fn test_description_rejects_wrong_environment() {
        let serverless = describe(
            r#"{"name":"books","dimension":768,"host":"books.pinecone.io",
                "spec":{"serverless":{"cloud":"aws","region":"us-east-1"}}}"#,
        );
        assert_eq!(serverless.location(), Some("us-east-1"));
        assert!(matches!(
            serverless.check(Some("gcp-starter"), 768),
            Err(Error::Index(_))
        ));
    }

    #[test]
    fn test_match_restores_text_and_source() {
        let m: Match = serde_json::from_str(
            r#"{"id":"1","score":0.92,"metadata":{"text":"Ivan Vazov","source":"/w/yoke.pdf","page":0}}"#,
        )
        .unwrap();
        let chunk = match_to_chunk(m);
        assert_eq!(chunk.text, "Ivan Vazov");
        assert_eq!(chunk.metadata, SourceMetadata::new("/w/yoke.pdf", 0));
        assert!((chunk.score - 0.92).abs() < f32::EPSILON);
    }

    #[test]
    fn test_query_request_uses_camel_case() {
        let body = serde_json::to_value(QueryRequest {
            vector: &[0.1, 0.2],
            top_k: 2,
            include_metadata: true,
            namespace: "",
        })
        .unwrap();
        assert_eq!(body["topK"], 2);
        assert_eq!(body["includeMetadata"], true);
    }

    #[tokio::test]
    async fn test_connect_unreachable_is_index_error() {
        let config = VectorDbConfig {
            api_key: Some("test".to_string()),
            controller_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let err = PineconeIndex::connect(&config, 768).await.err().unwrap();
        assert!(matches!(err, Error::Index(_)));
    }
}
