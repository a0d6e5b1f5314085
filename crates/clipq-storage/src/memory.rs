//! In-memory publisher for tests and dry runs.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::publisher::Publisher;

/// One recorded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub key: String,
    pub bytes: Vec<u8>,
}

/// Publisher that keeps uploads in memory.
#[derive(Debug)]
pub struct InMemoryPublisher {
    bucket: String,
    upload_error: Option<String>,
    bucket_reachable: bool,
    uploads: Mutex<Vec<Upload>>,
}

impl Default for InMemoryPublisher {
    fn default() -> Self {
        Self {
            bucket: "videos".to_string(),
            upload_error: None,
            bucket_reachable: true,
            uploads: Mutex::new(Vec::new()),
        }
    }
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every upload with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            upload_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Report the bucket as unreachable.
    pub fn unreachable() -> Self {
        Self {
            bucket_reachable: false,
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("https://storage.test/{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, local_file: &Path, key: &str) -> StorageResult<String> {
        if let Some(message) = &self.upload_error {
            return Err(StorageError::upload_failed(message.clone()));
        }

        let bytes = tokio::fs::read(local_file).await?;
        self.uploads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Upload {
                key: key.to_string(),
                bytes,
            });
        Ok(self.public_url(key))
    }

    async fn check_bucket(&self) -> StorageResult<()> {
        if self.bucket_reachable {
            Ok(())
        } else {
            Err(StorageError::bucket_unavailable(format!(
                "{} is unreachable",
                self.bucket
            )))
        }
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
