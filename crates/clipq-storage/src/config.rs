//! Backend selection from the environment.

use std::sync::Arc;

use crate::error::{StorageError, StorageResult};
use crate::publisher::Publisher;
use crate::s3::{S3Config, S3Storage};
use crate::supabase::{SupabaseStorage, SupabaseStorageConfig};

/// Default bucket name.
pub const DEFAULT_BUCKET: &str = "videos";

/// Which storage backend to publish through.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Hosted storage REST API
    Supabase(SupabaseStorageConfig),
    /// S3-compatible endpoint
    S3(S3Config),
}

impl StorageConfig {
    /// Create config from environment variables.
    ///
    /// The S3 backend is selected when `STORAGE_S3_ENDPOINT` is set;
    /// otherwise the hosted REST API is used with the store credentials.
    pub fn from_env() -> StorageResult<Self> {
        let bucket = env_non_empty("BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let base_url = env_non_empty("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string());

        if let Some(endpoint_url) = env_non_empty("STORAGE_S3_ENDPOINT") {
            let public_base_url = match env_non_empty("STORAGE_PUBLIC_BASE_URL") {
                Some(url) => url,
                None => {
                    let base = base_url.as_ref().ok_or_else(|| {
                        StorageError::config(
                            "STORAGE_PUBLIC_BASE_URL or SUPABASE_URL must be set for S3 storage",
                        )
                    })?;
                    format!("{}/storage/v1/object/public/{}", base, bucket)
                }
            };
            validate_url("STORAGE_PUBLIC_BASE_URL", &public_base_url)?;
            validate_url("STORAGE_S3_ENDPOINT", &endpoint_url)?;

            return Ok(Self::S3(S3Config {
                endpoint_url,
                access_key_id: env_non_empty("STORAGE_S3_ACCESS_KEY_ID").ok_or_else(|| {
                    StorageError::config("STORAGE_S3_ACCESS_KEY_ID not set")
                })?,
                secret_access_key: env_non_empty("STORAGE_S3_SECRET_ACCESS_KEY").ok_or_else(
                    || StorageError::config("STORAGE_S3_SECRET_ACCESS_KEY not set"),
                )?,
                region: env_non_empty("STORAGE_S3_REGION").unwrap_or_else(|| "auto".to_string()),
                bucket,
                public_base_url,
            }));
        }

        let base_url = base_url.ok_or_else(|| StorageError::config("SUPABASE_URL not set"))?;
        validate_url("SUPABASE_URL", &base_url)?;
        let service_key = env_non_empty("SUPABASE_SERVICE_ROLE_KEY")
            .ok_or_else(|| StorageError::config("SUPABASE_SERVICE_ROLE_KEY not set"))?;

        Ok(Self::Supabase(SupabaseStorageConfig::new(
            base_url,
            service_key,
            bucket,
        )))
    }

    pub fn bucket(&self) -> &str {
        match self {
            Self::Supabase(config) => &config.bucket,
            Self::S3(config) => &config.bucket,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Supabase(_) => "supabase",
            Self::S3(_) => "s3",
        }
    }

    /// Construct the configured publisher.
    pub fn build(self) -> StorageResult<Arc<dyn Publisher>> {
        Ok(match self {
            Self::Supabase(config) => Arc::new(SupabaseStorage::new(config)?),
            Self::S3(config) => Arc::new(S3Storage::new(config)),
        })
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn validate_url(name: &str, raw: &str) -> StorageResult<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| StorageError::config(format!("{} is not a valid URL: {}", name, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StorageError::config(format!("{} must be http(s)", name)));
    }
    Ok(())
}
