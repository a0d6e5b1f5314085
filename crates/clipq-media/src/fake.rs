//! Scripted pipeline for tests and dry runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::clip::ClipSpec;
use crate::error::{MediaError, MediaResult};
use crate::pipeline::{ArtifactPipeline, SOURCE_FILE_NAME};

/// Bytes written in place of a real video.
pub const FAKE_VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42fake";

/// Pipeline that writes canned files and can be told to fail a stage.
#[derive(Debug, Default)]
pub struct FakePipeline {
    fetch_error: Option<String>,
    transform_error: Option<String>,
    fetch_calls: AtomicUsize,
    transform_calls: AtomicUsize,
}

impl FakePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every fetch with `message`.
    pub fn failing_fetch(message: impl Into<String>) -> Self {
        Self {
            fetch_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Fail every transform with `message`.
    pub fn failing_transform(message: impl Into<String>) -> Self {
        Self {
            transform_error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn transform_calls(&self) -> usize {
        self.transform_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactPipeline for FakePipeline {
    async fn fetch(&self, _source_url: &str, scratch: &Path) -> MediaResult<PathBuf> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fetch_error {
            return Err(MediaError::download_failed(message.clone()));
        }

        let output = scratch.join(SOURCE_FILE_NAME);
        tokio::fs::write(&output, FAKE_VIDEO_BYTES).await?;
        Ok(output)
    }

    async fn transform(
        &self,
        input: &Path,
        spec: &ClipSpec,
        scratch: &Path,
    ) -> MediaResult<PathBuf> {
        self.transform_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.transform_error {
            return Err(MediaError::ffmpeg_failed(message.clone(), None, Some(1)));
        }
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let output = scratch.join(&spec.file_name);
        tokio::fs::copy(input, &output).await?;
        Ok(output)
    }
}
