//! Application state shared by the HTTP front and the consumers

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::{RagConfig, VectorBackend};
use crate::error::Result;
use crate::generation::Summarizer;
use crate::ingestion::IngestPipeline;
use crate::messaging::{run_consumer, IngestConsumer, MessageBroker, QuestionConsumer};
use crate::providers::{
    EmbeddingProvider, Generator, MemoryIndex, OllamaEmbedder, OllamaGenerator, PineconeIndex,
    VectorIndex,
};
use crate::retrieval::{IndexingService, RetrievalQa};
use crate::storage::{ObjectSource, ObjectStoreSource};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Queue transport
    broker: Arc<MessageBroker>,
    /// Embedding + index writes
    indexer: Arc<IndexingService>,
    /// Question answering pipeline
    qa: RetrievalQa,
    /// Text summarization over the same generator
    summarizer: Summarizer,
    /// Document message consumer
    ingest_consumer: Arc<IngestConsumer>,
    /// Question message consumer
    question_consumer: Arc<QuestionConsumer>,
    /// Providers probed by readiness checks
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    /// Startup time
    started_at: DateTime<Utc>,
    /// Ready state
    ready: RwLock<bool>,
}

/// Health of one external dependency
#[derive(Debug, Clone, Serialize)]
pub struct DependencyStatus {
    pub component: &'static str,
    pub provider: String,
    pub healthy: bool,
}

/// The external services the pipeline is built from
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub generator: Arc<dyn Generator>,
    pub source: Arc<dyn ObjectSource>,
}

impl Providers {
    /// Connect every provider named by the configuration
    pub async fn connect(config: &RagConfig) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(&config.embeddings)?);
        tracing::info!(
            "Embedding model: {} ({} dimensions)",
            config.embeddings.model,
            config.embeddings.dimensions
        );

        let index: Arc<dyn VectorIndex> = match config.vector_db.backend {
            VectorBackend::Pinecone => Arc::new(
                PineconeIndex::connect(&config.vector_db, embedder.dimensions()).await?,
            ),
            VectorBackend::Memory => {
                tracing::warn!("Using in-memory vector index; indexed documents are lost on restart");
                Arc::new(MemoryIndex::new(embedder.dimensions()))
            }
        };

        let generator: Arc<dyn Generator> = Arc::new(OllamaGenerator::load(&config.llm).await?);
        let source: Arc<dyn ObjectSource> = Arc::new(ObjectStoreSource::new(config.storage.clone()));
        tracing::info!("Object storage: {}", source.name());

        Ok(Self {
            embedder,
            index,
            generator,
            source,
        })
    }
}

impl AppState {
    /// Create application state, connecting to every configured service once
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");
        let providers = Providers::connect(&config).await?;
        Self::from_providers(config, providers)
    }

    /// Assemble state from already-connected providers
    pub fn from_providers(config: RagConfig, providers: Providers) -> Result<Self> {
        let broker = Arc::new(MessageBroker::new(config.broker.queue_capacity));
        broker.declare(&config.broker.document_queue)?;
        broker.declare(&config.broker.question_queue)?;

        let indexer = Arc::new(IndexingService::new(
            Arc::clone(&providers.embedder),
            Arc::clone(&providers.index),
            config.embeddings.batch_size,
            config.vector_db.top_k,
        )?);
        let qa = RetrievalQa::new(indexer.retriever(), Arc::clone(&providers.generator));
        let summarizer = Summarizer::new(Arc::clone(&providers.generator));

        let ingest_consumer = Arc::new(IngestConsumer::new(
            providers.source,
            IngestPipeline::from_config(&config.chunking)?,
            Arc::clone(&indexer),
            config.storage.work_dir.clone(),
            &config.processing,
        ));
        let question_consumer = Arc::new(QuestionConsumer::new(qa.clone(), Arc::clone(&broker)));

        tracing::info!(
            "Pipeline ready: index '{}' via {}, generator {} ({})",
            config.vector_db.index_name,
            providers.index.name(),
            providers.generator.model(),
            providers.generator.name()
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                broker,
                indexer,
                qa,
                summarizer,
                ingest_consumer,
                question_consumer,
                embedder: providers.embedder,
                index: providers.index,
                generator: providers.generator,
                started_at: Utc::now(),
                ready: RwLock::new(false),
            }),
        })
    }

    /// Subscribe both consumers to their queues and run them as tasks
    pub fn spawn_consumers(&self) -> Result<Vec<JoinHandle<()>>> {
        let broker = &self.inner.broker;
        let queues = &self.inner.config.broker;

        let documents = broker.subscribe(&queues.document_queue)?;
        let questions = broker.subscribe(&queues.question_queue)?;

        let handles = vec![
            tokio::spawn(run_consumer(documents, self.inner.ingest_consumer.clone())),
            tokio::spawn(run_consumer(questions, self.inner.question_consumer.clone())),
        ];

        self.set_ready(true);
        Ok(handles)
    }

    /// Stop taking work: mark not ready and close the broker so consumers drain and exit
    pub fn shutdown(&self) {
        self.set_ready(false);
        self.inner.broker.close();
    }

    /// Probe the embedding service, vector index and generator
    pub async fn dependencies(&self) -> Vec<DependencyStatus> {
        let inner = &self.inner;
        vec![
            DependencyStatus {
                component: "embeddings",
                provider: format!("{} ({})", inner.embedder.name(), inner.embedder.model()),
                healthy: probe("embeddings", inner.embedder.health_check().await),
            },
            DependencyStatus {
                component: "vector_index",
                provider: inner.index.name().to_string(),
                healthy: probe("vector_index", inner.index.health_check().await),
            },
            DependencyStatus {
                component: "generator",
                provider: format!("{} ({})", inner.generator.name(), inner.generator.model()),
                healthy: probe("generator", inner.generator.health_check().await),
            },
        ]
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the message broker
    pub fn broker(&self) -> &Arc<MessageBroker> {
        &self.inner.broker
    }

    /// Get the indexing service
    pub fn indexer(&self) -> &Arc<IndexingService> {
        &self.inner.indexer
    }

    /// Get the QA pipeline
    pub fn qa(&self) -> &RetrievalQa {
        &self.inner.qa
    }

    /// Get the summarizer
    pub fn summarizer(&self) -> &Summarizer {
        &self.inner.summarizer
    }

    /// Get the ingestion consumer
    pub fn ingest_consumer(&self) -> &Arc<IngestConsumer> {
        &self.inner.ingest_consumer
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}

fn probe(component: &str, result: Result<bool>) -> bool {
    match result {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Health check for {} failed: {}", component, e);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::{StorageBackend, StorageConfig};
    use crate::retrieval::testing::{BagOfWordsEmbedder, EchoGenerator};

    /// State over in-process fakes with a local storage root under `root`
    pub fn fake_state(root: &std::path::Path) -> AppState {
        fake_state_with(root, |_| {})
    }

    /// Like [`fake_state`], with a hook to adjust the configuration
    pub fn fake_state_with(
        root: &std::path::Path,
        configure: impl FnOnce(&mut RagConfig),
    ) -> AppState {
        let mut config = RagConfig::default();
        config.storage = StorageConfig {
            backend: StorageBackend::Local,
            root: Some(root.join("buckets")),
            work_dir: root.join("work"),
            ..Default::default()
        };
        config.vector_db.backend = VectorBackend::Memory;
        config.embeddings.dimensions = BagOfWordsEmbedder::DIMENSIONS;
        config.server.reply_timeout_secs = 5;
        configure(&mut config);

        let providers = Providers {
            embedder: Arc::new(BagOfWordsEmbedder::new()),
            index: Arc::new(MemoryIndex::new(BagOfWordsEmbedder::DIMENSIONS)),
            generator: Arc::new(EchoGenerator::new()),
            source: Arc::new(ObjectStoreSource::new(config.storage.clone())),
        };
        AppState::from_providers(config, providers).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::loader::test_pdf;

    #[tokio::test]
    async fn test_consumers_run_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = dir.path().join("buckets/books");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::write(
            bucket.join("yoke.pdf"),
            test_pdf::build(&["Ivan Vazov wrote Under the Yoke."]),
        )
        .unwrap();

        let state = testing::fake_state(dir.path());
        assert!(!state.is_ready());
        let handles = state.spawn_consumers().unwrap();
        assert!(state.is_ready());

        state
            .broker()
            .publish(
                &state.config().broker.document_queue,
                r#"{"BucketName":"books","DocumentNames":"yoke.pdf"}"#,
                None,
            )
            .await
            .unwrap();

        state.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }

        // the queued message was drained before the consumer exited
        let answer = state.qa().answer("Who wrote Under the Yoke?").await.unwrap();
        assert!(answer.answer.contains("Ivan Vazov"));
        assert_eq!(answer.sources.len(), 1);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_dependencies_report_fakes_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let state = testing::fake_state(dir.path());

        let deps = state.dependencies().await;
        let components: Vec<&str> = deps.iter().map(|d| d.component).collect();
        assert_eq!(components, vec!["embeddings", "vector_index", "generator"]);
        assert!(deps.iter().all(|d| d.healthy));
        assert_eq!(deps[1].provider, "memory");
    }
}
