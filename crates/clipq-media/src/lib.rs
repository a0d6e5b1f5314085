//! Artifact pipeline for clip jobs.
//!
//! This crate provides:
//! - The [`ArtifactPipeline`] seam (fetch, then transform)
//! - A process-backed pipeline driving yt-dlp and FFmpeg
//! - A scripted fake pipeline for tests
//! - Type-safe FFmpeg command building with optional timeouts

pub mod clip;
pub mod command;
pub mod download;
pub mod error;
pub mod fake;
pub mod pipeline;

pub use clip::{extract_clip, ClipSpec};
pub use command::{check_ffmpeg, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use download::download_video;
pub use error::{MediaError, MediaResult};
pub use fake::FakePipeline;
pub use pipeline::{ArtifactPipeline, ProcessPipeline, SOURCE_FILE_NAME};
