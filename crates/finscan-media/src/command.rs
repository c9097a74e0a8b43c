//! FFmpeg argument building and child-process supervision.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// One FFmpeg invocation: a single input, a single output, and the
/// arguments on either side of `-i`.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    /// Demuxer and rate options, applied before the input.
    before_input: Vec<String>,
    /// Encoder options, applied after the input.
    after_input: Vec<String>,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            before_input: Vec::new(),
            after_input: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Read the input through the concat demuxer at the given frame
    /// rate. `-safe 0` permits absolute paths inside the playlist.
    pub fn concat_input(mut self, fps: f64) -> Self {
        for arg in ["-f", "concat", "-safe", "0", "-r"] {
            self.before_input.push(arg.to_string());
        }
        self.before_input.push(fps.to_string());
        self
    }

    /// Encode with the given video codec.
    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.after_input.push("-c:v".to_string());
        self.after_input.push(codec.into());
        self
    }

    /// Constant-rate-factor quality setting.
    pub fn crf(mut self, crf: u8) -> Self {
        self.after_input.push("-crf".to_string());
        self.after_input.push(crf.to_string());
        self
    }

    /// Output pixel format.
    pub fn pix_fmt(mut self, fmt: impl Into<String>) -> Self {
        self.after_input.push("-pix_fmt".to_string());
        self.after_input.push(fmt.into());
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Full argument vector, output overwritten unconditionally.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), self.log_level.clone()];
        args.extend(self.before_input.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.after_input.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Supervises FFmpeg child processes: optional wall-clock timeout and
/// cooperative cancellation, both of which kill the child.
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout_secs: None,
        }
    }

    /// Kill the child when the watch flag turns true.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Kill the child after this many seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command to completion, capturing stderr for error
    /// reporting.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!(args = %args.join(" "), "spawning ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr concurrently so a chatty encoder cannot fill the
        // pipe and deadlock against child.wait().
        let mut stderr_pipe = child.stderr.take();
        let capture = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancelled(self.cancel_rx.clone()) => {
                warn!("ffmpeg cancelled, killing process");
                let _ = child.kill().await;
                return Err(MediaError::Cancelled);
            }
            _ = expired(self.timeout_secs) => {
                let secs = self.timeout_secs.unwrap_or_default();
                warn!(secs, "ffmpeg timed out, killing process");
                let _ = child.kill().await;
                return Err(MediaError::Timeout(secs));
            }
        };

        let stderr = capture.await.unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr),
                status.code(),
            ))
        }
    }
}

/// Resolves when the cancellation flag turns true; pends forever when no
/// receiver is attached or the sender is gone.
async fn cancelled(rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = rx else {
        return std::future::pending().await;
    };
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

/// Resolves when the timeout elapses; pends forever when none is set.
async fn expired(timeout_secs: Option<u64>) {
    match timeout_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => std::future::pending().await,
    }
}

/// Locate the ffmpeg executable on PATH.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}
