//! Image-sequence to video assembly via the FFmpeg concat demuxer.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Build the concat-demuxer playlist for a sorted image sequence.
///
/// Each image gets a display duration of `1/fps`; the final image's entry
/// is repeated without a trailing duration line so the demuxer does not
/// drop the last frame.
pub fn build_playlist(images: &[PathBuf], fps: f64) -> String {
    let spf = 1.0 / fps;
    let mut playlist = String::new();
    for image in images {
        playlist.push_str(&format!("file '{}'\n", image.display()));
        playlist.push_str(&format!("duration {}\n", spf));
    }
    if let Some(last) = images.last() {
        playlist.push_str(&format!("file '{}'\n", last.display()));
    }
    playlist
}

/// Concatenate a sorted image sequence into a single H.264 video at the
/// given frame rate, overwriting any existing output.
///
/// The playlist scratch file is written next to the output and removed on
/// every exit path, encoder failures included.
pub async fn assemble_video(
    images: &[PathBuf],
    fps: f64,
    output: &Path,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    if images.is_empty() {
        return Err(MediaError::EmptySequence(output.to_path_buf()));
    }

    let playlist_path = scratch_playlist_path(output);
    std::fs::write(&playlist_path, build_playlist(images, fps))?;

    let cmd = FfmpegCommand::new(&playlist_path, output)
        .concat_input(fps)
        .video_codec("libx264")
        .crf(17)
        .pix_fmt("yuv420p");

    let result = runner.run(&cmd).await;

    // Guaranteed cleanup regardless of how the encoder exited.
    if let Err(e) = std::fs::remove_file(&playlist_path) {
        tracing::warn!(
            "failed to remove playlist {}: {}",
            playlist_path.display(),
            e
        );
    }

    result?;
    info!(
        frames = images.len(),
        fps, output = %output.display(),
        "video assembled"
    );
    Ok(())
}

fn scratch_playlist_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str("-frames.txt");
    output.with_file_name(name)
}
