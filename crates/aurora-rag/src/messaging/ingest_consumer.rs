//! Document message consumer: download, unpack, load, split and index

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};

use crate::config::ProcessingConfig;
use crate::error::{Error, Result};
use crate::ingestion::{archive, IngestPipeline};
use crate::retrieval::IndexingService;
use crate::storage::{local_path_for, ObjectSource};
use crate::types::{DocumentMessage, IngestReport};

use super::broker::Delivery;
use super::consumer::MessageHandler;

/// Message ids remembered for redelivery detection
const SEEN_CAPACITY: usize = 1024;

/// Whether the consumer is working on a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    Idle,
    Processing,
}

/// Bounded memory of processed message ids, oldest evicted first
#[derive(Default)]
struct SeenIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl SeenIds {
    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: &str) {
        if !self.ids.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());
        if self.order.len() > SEEN_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

/// Resets the consumer state when processing ends, however it ends
struct ProcessingGuard<'a>(&'a RwLock<ConsumerState>);

impl<'a> ProcessingGuard<'a> {
    fn enter(state: &'a RwLock<ConsumerState>) -> Self {
        *state.write() = ConsumerState::Processing;
        Self(state)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        *self.0.write() = ConsumerState::Idle;
    }
}

/// Consumes Document Messages and indexes every PDF they reference
pub struct IngestConsumer {
    source: Arc<dyn ObjectSource>,
    pipeline: IngestPipeline,
    indexer: Arc<IndexingService>,
    work_dir: PathBuf,
    max_retries: u32,
    retry_backoff: Duration,
    file_timeout: Duration,
    state: RwLock<ConsumerState>,
    seen: Mutex<SeenIds>,
}

impl IngestConsumer {
    /// Create a consumer downloading into `work_dir`
    pub fn new(
        source: Arc<dyn ObjectSource>,
        pipeline: IngestPipeline,
        indexer: Arc<IndexingService>,
        work_dir: PathBuf,
        processing: &ProcessingConfig,
    ) -> Self {
        Self {
            source,
            pipeline,
            indexer,
            work_dir,
            max_retries: processing.max_retries,
            retry_backoff: Duration::from_millis(processing.retry_backoff_ms),
            file_timeout: Duration::from_secs(processing.file_timeout_secs),
            state: RwLock::new(ConsumerState::Idle),
            seen: Mutex::new(SeenIds::default()),
        }
    }

    /// Current state
    pub fn state(&self) -> ConsumerState {
        *self.state.read()
    }

    /// Parse and ingest one delivery.
    ///
    /// A malformed body fails before anything is downloaded; everything after
    /// that is reported per file.
    pub async fn process(&self, delivery: &Delivery) -> Result<IngestReport> {
        let _guard = ProcessingGuard::enter(&self.state);
        let message = DocumentMessage::from_slice(&delivery.body)?;
        Ok(self.ingest(&message).await)
    }

    /// Ingest every object named by `message`
    pub async fn ingest(&self, message: &DocumentMessage) -> IngestReport {
        let start = Instant::now();
        let bucket = message.bucket_name.as_str();
        let mut report = IngestReport::new(bucket);

        for key in message.document_names.keys() {
            let local = match self.download(bucket, key).await {
                Ok(path) => path,
                Err(e) => {
                    tracing::error!("Failed to download {}/{}: {}", bucket, key, e);
                    report.failed(key, &e);
                    continue;
                }
            };

            let files = match self.expand(&local).await {
                Ok(files) => files,
                Err(e) => {
                    tracing::error!("Failed to prepare {}: {}", local.display(), e);
                    report.failed(key, &e);
                    continue;
                }
            };

            for file in files {
                let name = file.to_string_lossy().to_string();
                match self.ingest_file(&file).await {
                    Ok(chunks) => {
                        tracing::info!("Indexed {} ({} chunks)", name, chunks);
                        report.indexed(name, chunks);
                    }
                    Err(e) => {
                        tracing::error!("Failed to ingest {}: {}", name, e);
                        report.failed(name, &e);
                    }
                }
            }
        }

        report.processing_time_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Fetch `bucket/key` into the work directory, overwriting any earlier copy
    async fn download(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let target = local_path_for(&self.work_dir, bucket, key)?;
        let data = self
            .with_retry("download", move || self.source.fetch(bucket, key))
            .await?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;

        tracing::debug!(
            "Downloaded {}/{} to {} ({} bytes)",
            bucket,
            key,
            target.display(),
            data.len()
        );
        Ok(target)
    }

    /// Local files to ingest for one downloaded object
    async fn expand(&self, local: &Path) -> Result<Vec<PathBuf>> {
        if !archive::is_zip(local) {
            if !self.pipeline.supports(local) {
                return Err(Error::load(local.to_string_lossy(), "unsupported file type"));
            }
            return Ok(vec![local.to_path_buf()]);
        }

        let stem = local
            .file_stem()
            .ok_or_else(|| Error::load(local.to_string_lossy(), "archive has no file name"))?;
        let dest = local.with_file_name(stem);

        match tokio::fs::remove_dir_all(&dest).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let archive_path = local.to_path_buf();
        let pipeline = self.pipeline.clone();
        let files = tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
            archive::extract_zip(&archive_path, &dest)?;
            Ok(archive::collect_files(&dest, |p| pipeline.supports(p)))
        })
        .await
        .map_err(|e| Error::internal(format!("extraction task failed: {}", e)))??;

        if files.is_empty() {
            return Err(Error::load(
                local.to_string_lossy(),
                "archive contains no PDF documents",
            ));
        }

        tracing::info!("Extracted {} PDFs from {}", files.len(), local.display());
        Ok(files)
    }

    /// Load, split and index one file within the per-file timeout
    async fn ingest_file(&self, path: &Path) -> Result<usize> {
        let work = async {
            let pipeline = self.pipeline.clone();
            let owned = path.to_path_buf();
            let chunks = tokio::task::spawn_blocking(move || pipeline.load_and_split(&owned))
                .await
                .map_err(|e| Error::internal(format!("loader task failed: {}", e)))??;

            let batch = chunks.as_slice();
            self.with_retry("index", move || self.indexer.index(batch)).await?;
            Ok(chunks.len())
        };

        timeout(self.file_timeout, work).await.map_err(|_| {
            Error::timeout(format!(
                "processing {} timed out after {}s",
                path.display(),
                self.file_timeout.as_secs()
            ))
        })?
    }

    /// Run `operation`, retrying transient failures with exponential backoff
    async fn with_retry<T, F, Fut>(&self, what: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl MessageHandler for IngestConsumer {
    fn name(&self) -> &str {
        "ingest"
    }

    async fn handle(&self, delivery: Delivery) {
        if self.seen.lock().contains(&delivery.message_id) {
            tracing::info!("Skipping redelivered document message {}", delivery.message_id);
            return;
        }

        match self.process(&delivery).await {
            Ok(report) if report.is_complete_success() => {
                tracing::info!(
                    "Ingested {} files ({} chunks) from bucket '{}' in {}ms",
                    report.files.len(),
                    report.total_chunks(),
                    report.bucket,
                    report.processing_time_ms
                );
                self.seen.lock().insert(&delivery.message_id);
            }
            // not remembered: a redelivery retries the whole message
            Ok(report) => {
                tracing::warn!(
                    "Ingestion from bucket '{}' finished with {} of {} files failed",
                    report.bucket,
                    report.failure_count(),
                    report.files.len()
                );
            }
            Err(e) => {
                tracing::error!(
                    "Rejected document message {} ({}): {}",
                    delivery.message_id,
                    e.kind(),
                    e
                );
            }
        }
    }
}
