//! Bounding-box overlay rendering.

use std::path::{Path, PathBuf};

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

use finscan_models::AnalysisResults;

use crate::error::{MediaError, MediaResult};

/// Box color, red.
const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Render annotated copies of the source frames into `scratch_dir`.
///
/// Every frame of the segment is written (file names preserved) so the
/// overlay video has the full frame count; frames with detections get
/// their boxes drawn. Returns the written paths in frame order.
pub fn render_overlay_frames(
    images: &[PathBuf],
    results: &AnalysisResults,
    scratch_dir: &Path,
) -> MediaResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(images.len());
    for frame in results.sorted_frames() {
        let Some(source) = images.get(frame.frameindex) else {
            return Err(MediaError::FileNotFound(PathBuf::from(format!(
                "frame index {} out of range",
                frame.frameindex
            ))));
        };
        let file_name = source
            .file_name()
            .ok_or_else(|| MediaError::FileNotFound(source.clone()))?;
        let target = scratch_dir.join(file_name);

        let mut img = image::open(source)?.to_rgb8();
        for det in &frame.detections {
            let rect = Rect::at(det.x1, det.y1)
                .of_size(det.width().max(1) as u32, det.height().max(1) as u32);
            draw_hollow_rect_mut(&mut img, rect, BOX_COLOR);
        }
        img.save(&target)?;
        debug!(
            frame = frame.frameindex,
            boxes = frame.detections.len(),
            "overlay frame rendered"
        );
        written.push(target);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finscan_models::{BoundingBox, FrameDetections};
    use image::GrayImage;
    use tempfile::TempDir;

    fn write_frames(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("frame_{:04}.jpg", i));
                GrayImage::from_pixel(32, 32, image::Luma([60])).save(&path).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn renders_every_frame_and_draws_boxes() {
        let src = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let images = write_frames(src.path(), 3);

        let results = AnalysisResults {
            frames: vec![
                FrameDetections {
                    frameindex: 0,
                    detections: vec![],
                },
                FrameDetections {
                    frameindex: 1,
                    detections: vec![BoundingBox::new(5, 5, 15, 20)],
                },
                FrameDetections {
                    frameindex: 2,
                    detections: vec![],
                },
            ],
        };

        let written = render_overlay_frames(&images, &results, scratch.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));

        // The annotated frame has red box pixels, the clean one does not.
        let annotated = image::open(&written[1]).unwrap().to_rgb8();
        let p = annotated.get_pixel(5, 5);
        assert!(p[0] > p[1].saturating_add(50), "expected red channel to dominate: {:?}", p);
        let clean = image::open(&written[0]).unwrap().to_rgb8();
        assert_eq!(clean.get_pixel(5, 5), clean.get_pixel(20, 20));
    }

    #[test]
    fn out_of_range_frame_index_is_an_error() {
        let src = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let images = write_frames(src.path(), 1);
        let results = AnalysisResults {
            frames: vec![FrameDetections {
                frameindex: 5,
                detections: vec![],
            }],
        };
        assert!(render_overlay_frames(&images, &results, scratch.path()).is_err());
    }
}
