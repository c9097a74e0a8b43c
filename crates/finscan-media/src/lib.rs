//! FFmpeg CLI wrapper for video assembly and overlay rendering.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - An async runner with timeout and cancellation
//! - Concat-demuxer assembly of image sequences into videos
//! - Bounding-box overlay rendering and thumbnail export

pub mod command;
pub mod concat;
pub mod error;
pub mod overlay;
pub mod thumbnail;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use concat::assemble_video;
pub use error::{MediaError, MediaResult};
pub use overlay::render_overlay_frames;
pub use thumbnail::export_thumbnail;
