//! Error types for detection.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for detection operations.
pub type DetectResult<T> = Result<T, DetectError>;

/// Errors that can occur while running the detector.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("no images found in {0}")]
    EmptySequence(PathBuf),

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("frame {path} is {got_w}x{got_h}, expected {want_w}x{want_h}")]
    DimensionMismatch {
        path: PathBuf,
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
