//! Bucket/key downloads through `object_store`

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Error, Result};

/// Source of raw document objects
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Fetch the object `key` from `bucket`
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// `object_store`-backed source; one store per bucket, created on first use
pub struct ObjectStoreSource {
    config: StorageConfig,
    stores: DashMap<String, Arc<dyn ObjectStore>>,
}

impl ObjectStoreSource {
    /// Create a new source from configuration
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            stores: DashMap::new(),
        }
    }

    fn store_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if let Some(store) = self.stores.get(bucket) {
            return Ok(Arc::clone(store.value()));
        }

        let store = create_object_store(&self.config, bucket)?;
        self.stores.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }
}

#[async_trait]
impl ObjectSource for ObjectStoreSource {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let store = self.store_for(bucket)?;
        let location = ObjectPath::parse(key)
            .map_err(|e| Error::message_format(format!("invalid object key '{}': {}", key, e)))?;

        let result = match store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(Error::load(
                    format!("{}/{}", bucket, key),
                    "object not found in storage",
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let data = result.bytes().await?;
        tracing::debug!("Fetched {}/{} ({} bytes)", bucket, key, data.len());
        Ok(data)
    }

    fn name(&self) -> &str {
        match self.config.backend {
            StorageBackend::Local => "local-filesystem",
            StorageBackend::S3 => "s3",
        }
    }
}

/// Create an object store for one bucket
fn create_object_store(config: &StorageConfig, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Local => {
            let root = config
                .root
                .as_ref()
                .ok_or_else(|| Error::config("storage.root is required for the local backend"))?;
            let bucket_dir = root.join(checked_segment(bucket)?);

            let store = object_store::local::LocalFileSystem::new_with_prefix(&bucket_dir)
                .map_err(|e| {
                    Error::storage(format!(
                        "Failed to open bucket directory {}: {}",
                        bucket_dir.display(),
                        e
                    ))
                })?;

            Ok(Arc::new(store))
        }

        StorageBackend::S3 => {
            let mut builder = object_store::aws::AmazonS3Builder::new()
                .with_bucket_name(bucket)
                .with_region(&config.region);

            if let Some(endpoint) = &config.endpoint {
                builder = builder.with_endpoint(endpoint).with_allow_http(true);
            }

            if let Some(key_id) = &config.access_key_id {
                builder = builder.with_access_key_id(key_id);
            }

            if let Some(secret) = &config.secret_access_key {
                builder = builder.with_secret_access_key(secret);
            }

            let store = builder
                .build()
                .map_err(|e| Error::storage(format!("Failed to create S3 store: {}", e)))?;

            Ok(Arc::new(store))
        }
    }
}

fn checked_segment(segment: &str) -> Result<&str> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(segment),
        _ => Err(Error::message_format(format!(
            "'{}' is not a valid bucket name",
            segment
        ))),
    }
}

/// Local download target for `bucket/key` under `work_dir`.
///
/// Key segments are joined one by one; `..`, absolute and empty segments are rejected.
pub fn local_path_for(work_dir: &Path, bucket: &str, key: &str) -> Result<PathBuf> {
    let mut path = work_dir.join(checked_segment(bucket)?);
    let mut pushed = false;

    for segment in key.split('/') {
        if segment.is_empty() {
            continue;
        }
        path.push(checked_segment(segment).map_err(|_| {
            Error::message_format(format!("object key '{}' is not a safe relative path", key))
        })?);
        pushed = true;
    }

    if !pushed {
        return Err(Error::message_format(format!("object key '{}' is empty", key)));
    }
    Ok(path)
}
