//! Detection bounding boxes and the detector results document.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in pixel coordinates.
///
/// Field names match the detector wire format exactly:
/// `{"x1":..,"y1":..,"x2":..,"y2":..}` with `x2 > x1` and `y2 > y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Create a new bounding box from its corners.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Check that the corners are properly ordered.
    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }
}

/// Width/height admission bounds for candidate detections.
///
/// Both bounds are exclusive on both sides: a blob of width exactly
/// `min_w` is rejected, `min_w + 1` is admitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SizeBounds {
    pub min_w: i32,
    pub max_w: i32,
    pub min_h: i32,
    pub max_h: i32,
}

impl SizeBounds {
    pub fn admits(&self, w: i32, h: i32) -> bool {
        w > self.min_w && w < self.max_w && h > self.min_h && h < self.max_h
    }
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self {
            min_w: 5,
            max_w: 400,
            min_h: 5,
            max_h: 400,
        }
    }
}

/// All detections found in one frame of a camera segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frameindex: usize,
    pub detections: Vec<BoundingBox>,
}

/// The JSON document the detector process writes on success:
/// `{"frames": [{"frameindex": .., "detections": [..]}, ..]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub frames: Vec<FrameDetections>,
}

impl AnalysisResults {
    /// Total number of detections across all frames.
    pub fn detection_count(&self) -> usize {
        self.frames.iter().map(|f| f.detections.len()).sum()
    }

    /// Frames sorted by ascending frame index.
    pub fn sorted_frames(&self) -> Vec<&FrameDetections> {
        let mut frames: Vec<&FrameDetections> = self.frames.iter().collect();
        frames.sort_by_key(|f| f.frameindex);
        frames
    }
}
