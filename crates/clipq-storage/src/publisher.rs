//! The publisher contract and key layout.

use std::path::Path;

use async_trait::async_trait;

use clipq_models::JobId;

use crate::error::StorageResult;

/// Content type of every published clip.
pub const CLIP_CONTENT_TYPE: &str = "video/mp4";

/// Pushes local artifacts to object storage.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload `local_file` under `key`, overwriting any existing object.
    /// Returns the stable public URL of the object.
    async fn publish(&self, local_file: &Path, key: &str) -> StorageResult<String>;

    /// Verify the configured bucket is reachable.
    async fn check_bucket(&self) -> StorageResult<()>;

    /// Bucket name, for startup logs.
    fn bucket(&self) -> &str;
}

/// Object key for an artifact of `job_id`: `outputs/{job_id}/{file_name}`.
pub fn destination_key(job_id: &JobId, file_name: &str) -> String {
    format!("outputs/{}/{}", job_id, file_name)
}

/// Percent-encode each segment of an object key, keeping the separators.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
