mod local;
#[cfg(feature = "s3")]
mod s3;
mod upload;

pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;
pub use upload::{
    AttachmentStore, NewUpload, StoredFile, ALLOWED_CONTENT_TYPES, MAX_FILES_PER_REQUEST,
    MAX_FILE_SIZE,
};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// Where attachment bytes live. Implementations hold opaque blobs under
/// slash-separated string keys; everything above this trait is
/// backend-agnostic.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob, replacing any previous bytes under the same key.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Fetch a blob. `StoreError::NotFound` when the key is absent.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Like [`get`](Self::get) but absence is `Ok(None)`, not an error.
    async fn get_opt(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.get(key).await {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove a blob. Absent keys succeed silently.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Keys under a prefix, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// -- Configuration --

/// Backend selection knobs, usually filled from the environment. Every
/// field is optional; [`is_s3`](Self::is_s3) decides which backend the
/// combination selects.
pub struct StoreConfig {
    /// S3-compatible endpoint, e.g. a MinIO at "http://127.0.0.1:9000".
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Base directory for the filesystem backend.
    pub local_upload_dir: Option<String>,
}

fn env_or(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .ok()
}

impl StoreConfig {
    /// Read `TASKHIVE_S3_*` variables, accepting the conventional `AWS_*`
    /// names as fallbacks, plus `TASKHIVE_UPLOAD_DIR` for the local
    /// backend.
    pub fn from_env() -> Self {
        Self {
            endpoint_url: env_or("TASKHIVE_S3_ENDPOINT", "AWS_ENDPOINT_URL"),
            region: env_or("TASKHIVE_S3_REGION", "AWS_REGION"),
            bucket: env_or("TASKHIVE_S3_BUCKET", "AWS_BUCKET_NAME"),
            access_key_id: env_or("TASKHIVE_S3_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"),
            secret_access_key: env_or("TASKHIVE_S3_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY"),
            local_upload_dir: std::env::var("TASKHIVE_UPLOAD_DIR").ok(),
        }
    }

    /// S3 needs the endpoint, the bucket, and both credential halves; any
    /// gap falls back to the filesystem backend.
    pub fn is_s3(&self) -> bool {
        let credentials = self.access_key_id.is_some() && self.secret_access_key.is_some();
        self.endpoint_url.is_some() && self.bucket.is_some() && credentials
    }
}

// -- Factory --

/// Pick and build the backend once at startup; callers only ever see the
/// trait object.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    if config.is_s3() {
        #[cfg(feature = "s3")]
        {
            Ok(Arc::new(S3Store::new(config)?))
        }
        #[cfg(not(feature = "s3"))]
        {
            Err(StoreError::Internal(
                "S3 configuration detected but the 's3' feature is not enabled".into(),
            ))
        }
    } else {
        Ok(Arc::new(LocalStore::new(config)))
    }
}
