//! Adaptive background-subtraction fish detector.
//!
//! This crate provides:
//! - A per-pixel Gaussian-mixture background model with an exponentially
//!   decaying online update
//! - Foreground mask denoising and size-filtered bounding-box extraction
//! - A frame-sequence driver over a directory of captured images
//!
//! The `finscan-detect` binary wraps the driver as a standalone process so
//! the ingestion pipeline can isolate detector crashes per camera segment.

pub mod background;
pub mod blob;
pub mod detector;
pub mod error;

pub use background::{BackgroundModel, MogParams};
pub use blob::BlobExtractor;
pub use detector::{DetectorConfig, FrameSource};
pub use error::{DetectError, DetectResult};
