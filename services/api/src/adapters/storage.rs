//! services/api/src/adapters/storage.rs
//!
//! Object-storage adapters for topic PDFs: an S3 implementation of the
//! `DocumentStorage` port and a local-filesystem one for development.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region},
    primitives::ByteStream,
    Client,
};
use bytes::Bytes;
use learning_progress_core::ports::{DocumentStorage, PortError, PortResult};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("S3 error: {0}")]
    S3(String),
}

impl From<StorageError> for PortError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { .. } => PortError::NotFound(e.to_string()),
            StorageError::InvalidKey(_) => PortError::InvalidInput(e.to_string()),
            _ => PortError::Unexpected(e.to_string()),
        }
    }
}

//=========================================================================================
// S3
//=========================================================================================

/// AWS S3 (or S3-compatible) storage backend.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(
        access_key_id: &str,
        secret_access_key: &str,
        region: &str,
        bucket: &str,
        endpoint: Option<&str>,
    ) -> Self {
        let creds = Credentials::new(access_key_id, secret_access_key, None, None, "learning-progress");

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(creds);
        if let Some(url) = endpoint {
            // S3-compatible servers (e.g. MinIO) address buckets by path.
            builder = builder.endpoint_url(url).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        }
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("{e}");
                if msg.contains("NoSuchKey") || msg.contains("404") {
                    StorageError::NotFound {
                        bucket: self.bucket.clone(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::S3(msg)
                }
            })?;

        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("Failed to read S3 body: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                error!("S3 upload error: {e}");
                StorageError::S3(format!("{e}"))
            })?;
        info!("Uploaded {} to bucket {}", key, self.bucket);
        Ok(())
    }
}

#[async_trait]
impl DocumentStorage for S3Storage {
    async fn put_document(&self, key: &str, data: &[u8], content_type: &str) -> PortResult<()> {
        Ok(self.upload(key, Bytes::copy_from_slice(data), content_type).await?)
    }

    async fn get_document(&self, key: &str) -> PortResult<Vec<u8>> {
        Ok(self.download(key).await?)
    }

    fn provider_name(&self) -> &str {
        "aws-s3"
    }
}

//=========================================================================================
// Local filesystem
//=========================================================================================

/// Local filesystem storage backend. Keys map to files under `base_path`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Keys must stay inside the storage directory.
    fn resolve_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl DocumentStorage for LocalStorage {
    async fn put_document(&self, key: &str, data: &[u8], _content_type: &str) -> PortResult<()> {
        let path = self.resolve_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(StorageError::from)?;
        }
        fs::write(&path, data).await.map_err(StorageError::from)?;
        Ok(())
    }

    async fn get_document(&self, key: &str) -> PortResult<Vec<u8>> {
        let path = self.resolve_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: self.base_path.display().to_string(),
                key: key.to_string(),
            }
            .into()),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}
