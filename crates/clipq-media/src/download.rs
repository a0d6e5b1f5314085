//! Source download using yt-dlp.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::command::{check_ytdlp, run_process, stderr_tail};
use crate::error::{MediaError, MediaResult};

/// Download a video from `url` to `output_path` as mp4.
///
/// Fails when yt-dlp is missing, exits non-zero (the diagnostic is the
/// last stderr line), or exits cleanly without producing the file.
pub async fn download_video(
    url: &str,
    output_path: impl AsRef<Path>,
    timeout: Option<Duration>,
) -> MediaResult<()> {
    let output_path = output_path.as_ref();

    check_ytdlp()?;

    info!("Downloading video from {} to {}", url, output_path.display());

    let args = download_args(url, output_path);
    debug!("Running yt-dlp: yt-dlp {}", args.join(" "));

    let mut command = Command::new("yt-dlp");
    command.args(&args);

    let output = run_process(command, timeout).await?;

    if !output.status.success() {
        let last_line = stderr_tail(&output.stderr, 1);
        let message = if last_line.is_empty() {
            format!("yt-dlp exited with status {:?}", output.status.code())
        } else {
            last_line
        };
        return Err(MediaError::download_failed(message));
    }

    if !output_path.exists() {
        return Err(MediaError::download_failed(format!(
            "yt-dlp finished but {} was not created",
            output_path.display()
        )));
    }

    info!("Video downloaded: {}", output_path.display());
    Ok(())
}

fn download_args(url: &str, output_path: &Path) -> Vec<String> {
    vec![
        "-t".to_string(),
        "mp4".to_string(),
        "-o".to_string(),
        output_path.to_string_lossy().to_string(),
        url.to_string(),
    ]
}
