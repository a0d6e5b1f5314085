//! Clip extraction.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// What to cut from a fetched source.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    /// Start offset in seconds
    pub start_secs: f64,
    /// Clip length in seconds
    pub duration_secs: f64,
    /// File name of the produced clip inside the scratch dir
    pub file_name: String,
    /// Label recorded next to the published URL
    pub label: String,
}

impl ClipSpec {
    /// The single clip every job produces: 5 s in, 5 s long, stream copy.
    pub fn first_clip() -> Self {
        Self {
            start_secs: 5.0,
            duration_secs: 5.0,
            file_name: "clip1.mp4".to_string(),
            label: "clip1".to_string(),
        }
    }
}

impl Default for ClipSpec {
    fn default() -> Self {
        Self::first_clip()
    }
}

/// Cut `spec` out of `input` into `output_dir` without re-encoding.
///
/// Returns the path of the produced clip.
pub async fn extract_clip(
    input: &Path,
    spec: &ClipSpec,
    output_dir: &Path,
    runner: &FfmpegRunner,
) -> MediaResult<PathBuf> {
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let output = output_dir.join(&spec.file_name);

    info!(
        "Extracting clip: {} -> {} (start: {:.2}s, duration: {:.2}s)",
        input.display(),
        output.display(),
        spec.start_secs,
        spec.duration_secs
    );

    let cmd = clip_command(input, &output, spec);
    runner.run(&cmd).await?;

    if !output.exists() {
        return Err(MediaError::ffmpeg_failed(
            format!("FFmpeg finished but {} was not created", output.display()),
            None,
            Some(0),
        ));
    }

    info!("Clip extracted: {}", output.display());
    Ok(output)
}

fn clip_command(input: &Path, output: &Path, spec: &ClipSpec) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .seek(spec.start_secs)
        .duration(spec.duration_secs)
        .codec_copy()
}
