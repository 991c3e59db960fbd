use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

use crate::{create_store, ObjectStore, StoreConfig, StoreError};

/// Largest accepted upload, in bytes (inclusive).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Most files accepted in a single create/update request.
pub const MAX_FILES_PER_REQUEST: usize = 5;

/// Content types accepted for attachment uploads.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// An upload as received from the client, before validation.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Result of accepting an upload into the backing store.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_key: String,
    pub file_url: String,
    pub file_size: i64,
}

#[derive(Clone)]
enum UrlMode {
    /// Keys are bare file names served from `/uploads/{key}`.
    Local,
    /// Keys are namespaced per owner; URLs are absolute path-style.
    S3 { endpoint: String, bucket: String },
}

/// Attachment-aware wrapper over an [`ObjectStore`]: validates uploads,
/// generates collision-resistant keys, and resolves the public URL for a
/// key. Everything above this type is backend-agnostic.
#[derive(Clone)]
pub struct AttachmentStore {
    store: Arc<dyn ObjectStore>,
    url_mode: UrlMode,
}

impl AttachmentStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let store = create_store(config)?;
        let url_mode = if config.is_s3() {
            UrlMode::S3 {
                endpoint: config
                    .endpoint_url
                    .as_deref()
                    .unwrap_or_default()
                    .trim_end_matches('/')
                    .to_string(),
                bucket: config.bucket.clone().unwrap_or_default(),
            }
        } else {
            UrlMode::Local
        };
        Ok(Self { store, url_mode })
    }

    /// Wrap an existing backend with local-style URLs.
    pub fn local(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            url_mode: UrlMode::Local,
        }
    }

    /// Validate and persist one upload. Rejections (`StoreError::Rejected`)
    /// mean the payload violated the upload policy and nothing was written.
    pub async fn save(&self, upload: &NewUpload, owner_id: &str) -> Result<StoredFile, StoreError> {
        if !ALLOWED_CONTENT_TYPES.contains(&upload.content_type.as_str()) {
            return Err(StoreError::Rejected(format!(
                "unsupported file type: {}",
                upload.content_type
            )));
        }
        if upload.data.len() > MAX_FILE_SIZE {
            return Err(StoreError::Rejected(format!(
                "{} exceeds the {} MB size limit",
                upload.file_name,
                MAX_FILE_SIZE / (1024 * 1024)
            )));
        }

        let file_key = self.generate_key(&upload.file_name, owner_id);
        self.store.put(&file_key, upload.data.clone()).await?;

        Ok(StoredFile {
            file_url: self.url_for(&file_key),
            file_size: upload.data.len() as i64,
            file_key,
        })
    }

    /// Delete the stored object for a key. Absent keys are a no-op.
    pub async fn remove(&self, file_key: &str) -> Result<(), StoreError> {
        self.store.delete(file_key).await
    }

    /// Read the stored object for a key, `None` if absent.
    pub async fn read(&self, file_key: &str) -> Result<Option<Bytes>, StoreError> {
        self.store.get_opt(file_key).await
    }

    /// Every key currently present in the backing store.
    pub async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        self.store.list("").await
    }

    /// Public URL for a stored key, per backend convention.
    pub fn url_for(&self, file_key: &str) -> String {
        match &self.url_mode {
            UrlMode::Local => format!("/uploads/{file_key}"),
            UrlMode::S3 { endpoint, bucket } => format!("{endpoint}/{bucket}/{file_key}"),
        }
    }

    fn generate_key(&self, file_name: &str, owner_id: &str) -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        let ext = extension_of(file_name);
        let name = format!("{millis}-{suffix}{ext}");
        match &self.url_mode {
            UrlMode::Local => name,
            UrlMode::S3 { .. } => format!("attachments/{owner_id}/{name}"),
        }
    }
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}
