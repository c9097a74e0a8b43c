//! Shared data models for the finscan pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Detection bounding boxes and the per-frame results document the
//!   detector process writes
//! - Analysis run status
//! - Analysis method configuration files
//! - Frame-index timestamp formatting for CSV export

pub mod detection;
pub mod method;
pub mod timestamp;

// Re-export common types
pub use detection::{AnalysisResults, BoundingBox, FrameDetections, SizeBounds};
pub use method::{AnalysisStatus, MethodConfig};
pub use timestamp::format_frame_time;
