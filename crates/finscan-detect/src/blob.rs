//! Foreground mask denoising and bounding-box extraction.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use finscan_models::{BoundingBox, SizeBounds};

/// Default structuring element, matching an inscribed 9x6 ellipse.
///
/// Larger elements suppress more noise but cost more compute and tend to
/// merge adjacent objects.
pub const DEFAULT_KERNEL: (u32, u32) = (9, 6);

/// Extracts size-filtered bounding boxes from a binary foreground mask.
///
/// The mask is first opened with an elliptical structuring element to
/// remove isolated noise pixels, then externally connected regions are
/// labelled and their minimal axis-aligned boxes emitted in label order.
/// Overlapping boxes for one physical object are not merged.
pub struct BlobExtractor {
    bounds: SizeBounds,
    kernel: Vec<(i32, i32)>,
}

impl BlobExtractor {
    pub fn new(bounds: SizeBounds) -> Self {
        Self::with_kernel(bounds, DEFAULT_KERNEL.0, DEFAULT_KERNEL.1)
    }

    /// Use a custom structuring element size.
    pub fn with_kernel(bounds: SizeBounds, kernel_w: u32, kernel_h: u32) -> Self {
        Self {
            bounds,
            kernel: ellipse_offsets(kernel_w, kernel_h),
        }
    }

    /// Denoise the mask and extract candidate detections.
    pub fn extract(&self, mask: &GrayImage) -> Vec<BoundingBox> {
        let opened = self.open(mask);
        let labels = connected_components(&opened, Connectivity::Eight, Luma([0u8]));

        // Minimal enclosing box per label; labels start at 1.
        let mut boxes: Vec<Option<(u32, u32, u32, u32)>> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if boxes.len() < label {
                boxes.resize(label, None);
            }
            let entry = &mut boxes[label - 1];
            match entry {
                None => *entry = Some((x, y, x, y)),
                Some((min_x, min_y, max_x, max_y)) => {
                    *min_x = (*min_x).min(x);
                    *min_y = (*min_y).min(y);
                    *max_x = (*max_x).max(x);
                    *max_y = (*max_y).max(y);
                }
            }
        }

        boxes
            .into_iter()
            .flatten()
            .map(|(min_x, min_y, max_x, max_y)| {
                BoundingBox::new(
                    min_x as i32,
                    min_y as i32,
                    max_x as i32 + 1,
                    max_y as i32 + 1,
                )
            })
            .filter(|b| self.bounds.admits(b.width(), b.height()))
            .collect()
    }

    /// Morphological opening (erosion then dilation).
    fn open(&self, mask: &GrayImage) -> GrayImage {
        self.dilate(&self.erode(mask))
    }

    fn erode(&self, mask: &GrayImage) -> GrayImage {
        let (w, h) = mask.dimensions();
        let mut out = GrayImage::new(w, h);
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                // Out-of-bounds samples count as foreground so the image
                // border does not erode inward.
                let all_set = self.kernel.iter().all(|&(dx, dy)| {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        true
                    } else {
                        mask.get_pixel(nx as u32, ny as u32)[0] != 0
                    }
                });
                if all_set {
                    out.put_pixel(x as u32, y as u32, Luma([255]));
                }
            }
        }
        out
    }

    fn dilate(&self, mask: &GrayImage) -> GrayImage {
        let (w, h) = mask.dimensions();
        let mut out = GrayImage::new(w, h);
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                let any_set = self.kernel.iter().any(|&(dx, dy)| {
                    let (nx, ny) = (x - dx, y - dy);
                    nx >= 0
                        && ny >= 0
                        && nx < w as i32
                        && ny < h as i32
                        && mask.get_pixel(nx as u32, ny as u32)[0] != 0
                });
                if any_set {
                    out.put_pixel(x as u32, y as u32, Luma([255]));
                }
            }
        }
        out
    }
}

/// Offsets of the points inside an inscribed ellipse of the given
/// kernel size, relative to the kernel center.
fn ellipse_offsets(kernel_w: u32, kernel_h: u32) -> Vec<(i32, i32)> {
    let cx = (kernel_w as f32 - 1.0) / 2.0;
    let cy = (kernel_h as f32 - 1.0) / 2.0;
    // Radii run through the outer cell edges so the element spans the
    // full requested width and height.
    let rx = kernel_w as f32 / 2.0;
    let ry = kernel_h as f32 / 2.0;
    let mut offsets = Vec::new();
    for ky in 0..kernel_h {
        for kx in 0..kernel_w {
            let nx = (kx as f32 - cx) / rx;
            let ny = (ky as f32 - cy) / ry;
            if nx * nx + ny * ny <= 1.0 {
                offsets.push((kx as i32 - (kernel_w / 2) as i32, ky as i32 - (kernel_h / 2) as i32));
            }
        }
    }
    offsets
}
