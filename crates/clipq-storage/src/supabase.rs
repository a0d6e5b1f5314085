//! Hosted storage REST backend.
//!
//! Objects live under `{base}/storage/v1/object/{bucket}/{key}` and are
//! served publicly from `{base}/storage/v1/object/public/{bucket}/{key}`.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::publisher::{encode_key, Publisher, CLIP_CONTENT_TYPE};

/// Connection settings for the hosted storage API.
#[derive(Clone)]
pub struct SupabaseStorageConfig {
    /// Project endpoint, no trailing slash
    pub base_url: String,
    /// Service credential
    pub service_key: String,
    /// Bucket name
    pub bucket: String,
    /// Upload timeout
    pub upload_timeout: Duration,
}

impl fmt::Debug for SupabaseStorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStorageConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("upload_timeout", &self.upload_timeout)
            .finish()
    }
}

impl SupabaseStorageConfig {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
            upload_timeout: Duration::from_secs(300),
        }
    }
}

/// Publisher backed by the hosted storage REST API.
#[derive(Clone)]
pub struct SupabaseStorage {
    http: Client,
    config: SupabaseStorageConfig,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseStorageConfig) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.upload_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("clipq-storage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Public URL of an object in the configured bucket.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url,
            self.config.bucket,
            encode_key(key)
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url,
            self.config.bucket,
            encode_key(key)
        )
    }

    fn list_url(&self) -> String {
        format!(
            "{}/storage/v1/object/list/{}",
            self.config.base_url, self.config.bucket
        )
    }
}

#[async_trait]
impl Publisher for SupabaseStorage {
    async fn publish(&self, local_file: &Path, key: &str) -> StorageResult<String> {
        debug!("Uploading {} to {}", local_file.display(), key);

        let body = tokio::fs::read(local_file).await?;
        let size = body.len();

        let response = self
            .http
            .post(self.object_url(key))
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .header(reqwest::header::CONTENT_TYPE, CLIP_CONTENT_TYPE)
            .header("x-upsert", "true")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::upload_failed(format!(
                "{} returned {}: {}",
                key, status, text
            )));
        }

        info!(bytes = size, "Uploaded {} to {}", local_file.display(), key);
        Ok(self.public_url(key))
    }

    async fn check_bucket(&self) -> StorageResult<()> {
        let response = self
            .http
            .post(self.list_url())
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .json(&serde_json::json!({ "prefix": "", "limit": 1 }))
            .send()
            .await
            .map_err(|e| {
                StorageError::bucket_unavailable(format!("{}: {}", self.config.bucket, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::bucket_unavailable(format!(
                "{} returned {}: {}",
                self.config.bucket, status, text
            )));
        }
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.config.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_layout() {
        let storage =
            SupabaseStorage::new(SupabaseStorageConfig::new("https://abc.supabase.co/", "k", "videos"))
                .unwrap();
        assert_eq!(
            storage.public_url("outputs/job-1/clip1.mp4"),
            "https://abc.supabase.co/storage/v1/object/public/videos/outputs/job-1/clip1.mp4"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = SupabaseStorageConfig::new("https://abc.supabase.co", "secret-key", "videos");
        assert!(!format!("{:?}", config).contains("secret-key"));
    }
}
