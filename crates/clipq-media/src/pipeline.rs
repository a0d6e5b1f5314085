//! The two-stage artifact pipeline: fetch a source, cut a clip.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::clip::{extract_clip, ClipSpec};
use crate::command::FfmpegRunner;
use crate::download::download_video;
use crate::error::MediaResult;

/// File name of the fetched source inside the scratch dir.
pub const SOURCE_FILE_NAME: &str = "in.mp4";

/// Produces a publishable artifact from a source reference.
///
/// Each stage is one opaque external invocation. Implementations write only
/// inside the `scratch` directory they are given.
#[async_trait]
pub trait ArtifactPipeline: Send + Sync {
    /// Fetch `source_url` into `scratch`; returns the local file.
    async fn fetch(&self, source_url: &str, scratch: &Path) -> MediaResult<PathBuf>;

    /// Cut `spec` out of `input` into `scratch`; returns the clip file.
    async fn transform(&self, input: &Path, spec: &ClipSpec, scratch: &Path)
        -> MediaResult<PathBuf>;
}

/// Pipeline that shells out to yt-dlp and FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct ProcessPipeline {
    stage_timeout: Option<Duration>,
}

impl ProcessPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill a stage that runs longer than `timeout`.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout
    }
}

#[async_trait]
impl ArtifactPipeline for ProcessPipeline {
    async fn fetch(&self, source_url: &str, scratch: &Path) -> MediaResult<PathBuf> {
        let output = scratch.join(SOURCE_FILE_NAME);
        download_video(source_url, &output, self.stage_timeout).await?;
        Ok(output)
    }

    async fn transform(
        &self,
        input: &Path,
        spec: &ClipSpec,
        scratch: &Path,
    ) -> MediaResult<PathBuf> {
        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.stage_timeout {
            runner = runner.with_timeout(timeout);
        }
        extract_clip(input, spec, scratch, &runner).await
    }
}
