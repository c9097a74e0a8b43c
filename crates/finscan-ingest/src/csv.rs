//! CSV export of per-video detections.

use std::io::Write;
use std::path::Path;

use finscan_models::{format_frame_time, AnalysisResults};

use crate::error::IngestResult;

/// Write one video's detections as CSV: header `time,x,y,w,h,method`,
/// one row per detection, frames in ascending index order, time computed
/// from `frameindex / fps`.
///
/// A failed run still gets a header-only file; its presence is what marks
/// the segment as processed.
pub fn write_detections_csv(
    path: &Path,
    results: &AnalysisResults,
    fps: f64,
    method: &str,
) -> IngestResult<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, "time,x,y,w,h,method")?;
    for frame in results.sorted_frames() {
        for det in &frame.detections {
            writeln!(
                file,
                "{},{},{},{},{},{}",
                format_frame_time(frame.frameindex, fps),
                det.x1,
                det.y1,
                det.width(),
                det.height(),
                method
            )?;
        }
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finscan_models::{BoundingBox, FrameDetections};
    use tempfile::TempDir;

    #[test]
    fn writes_header_and_rows_in_frame_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seg_Cam1.csv");
        let results = AnalysisResults {
            frames: vec![
                FrameDetections {
                    frameindex: 15,
                    detections: vec![BoundingBox::new(8, 9, 20, 21)],
                },
                FrameDetections {
                    frameindex: 5,
                    detections: vec![
                        BoundingBox::new(10, 20, 40, 50),
                        BoundingBox::new(1, 2, 11, 12),
                    ],
                },
            ],
        };

        write_detections_csv(&path, &results, 10.0, "bgmog2").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "time,x,y,w,h,method");
        assert_eq!(lines[1], "00:00:00.500000,10,20,30,30,bgmog2");
        assert_eq!(lines[2], "00:00:00.500000,1,2,10,10,bgmog2");
        assert_eq!(lines[3], "00:00:01.500000,8,9,12,12,bgmog2");
    }

    #[test]
    fn empty_results_produce_a_header_only_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seg_Cam2.csv");
        write_detections_csv(&path, &AnalysisResults::default(), 10.0, "bgmog2").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "time,x,y,w,h,method\n"
        );
    }
}
