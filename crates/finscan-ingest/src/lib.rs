//! Deployment scanner and ingestion orchestrator.
//!
//! Walks a deployment's day/time/camera directory tree, assembles frame
//! sequences into videos, runs the detector per camera segment in an
//! isolated child process, and persists detections, videos, and analysis
//! runs into day-scoped databases alongside CSV exports and overlay
//! videos.

pub mod config;
pub mod csv;
pub mod detector_process;
pub mod error;
pub mod orchestrator;
pub mod scanner;

pub use config::IngestConfig;
pub use error::{IngestError, IngestResult};
pub use orchestrator::{Orchestrator, RunSummary};
pub use scanner::{CameraSegment, DayDir};
