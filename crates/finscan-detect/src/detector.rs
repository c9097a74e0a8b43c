//! Frame-sequence driver: background model + blob extraction over one
//! camera segment's image directory.

use std::path::{Path, PathBuf};

use image::GrayImage;
use serde::Deserialize;
use tracing::{debug, info};

use finscan_models::{AnalysisResults, FrameDetections, SizeBounds};

use crate::background::{BackgroundModel, MogParams};
use crate::blob::BlobExtractor;
use crate::error::{DetectError, DetectResult};

/// Detector configuration, loadable from the algorithm's method file.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub mog: MogParams,
    pub bounds: SizeBounds,
    /// Steady-state learning rate applied to every frame after seeding.
    pub learning_rate: f32,
    /// Maximum number of frames averaged into the seed image.
    pub seed_frames: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            mog: MogParams::default(),
            bounds: SizeBounds::default(),
            learning_rate: 0.05,
            seed_frames: 10,
        }
    }
}

/// The flat tuning keys of the method configuration file. The file also
/// carries the `name` and `script` entries the ingester consumes; those
/// and any other unknown keys are ignored here, and absent keys keep
/// their defaults.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct MethodParams {
    #[serde(rename = "nMixtures")]
    n_mixtures: usize,
    #[serde(rename = "backgroundRatio")]
    background_ratio: f32,
    #[serde(rename = "complexityReductionThreshold")]
    complexity_reduction: f32,
    #[serde(rename = "varThreshold")]
    var_threshold: f32,
    #[serde(rename = "varThresholdGen")]
    var_threshold_gen: f32,
    #[serde(rename = "varInit")]
    var_init: f32,
    #[serde(rename = "varMin")]
    var_min: f32,
    #[serde(rename = "varMax")]
    var_max: f32,
    minw: i32,
    maxw: i32,
    minh: i32,
    maxh: i32,
    #[serde(rename = "learningRate")]
    learning_rate: f32,
    #[serde(rename = "seedFrames")]
    seed_frames: usize,
}

impl Default for MethodParams {
    fn default() -> Self {
        let config = DetectorConfig::default();
        Self {
            n_mixtures: config.mog.n_mixtures,
            background_ratio: config.mog.background_ratio,
            complexity_reduction: config.mog.complexity_reduction,
            var_threshold: config.mog.var_threshold,
            var_threshold_gen: config.mog.var_threshold_gen,
            var_init: config.mog.var_init,
            var_min: config.mog.var_min,
            var_max: config.mog.var_max,
            minw: config.bounds.min_w,
            maxw: config.bounds.max_w,
            minh: config.bounds.min_h,
            maxh: config.bounds.max_h,
            learning_rate: config.learning_rate,
            seed_frames: config.seed_frames,
        }
    }
}

impl DetectorConfig {
    /// Parse the method configuration document (the `<name>.json` file
    /// the ingester forwards via `--params`).
    pub fn from_method_json(json: &str) -> serde_json::Result<Self> {
        let p: MethodParams = serde_json::from_str(json)?;
        Ok(Self {
            mog: MogParams {
                n_mixtures: p.n_mixtures,
                background_ratio: p.background_ratio,
                complexity_reduction: p.complexity_reduction,
                var_threshold: p.var_threshold,
                var_threshold_gen: p.var_threshold_gen,
                var_init: p.var_init,
                var_min: p.var_min,
                var_max: p.var_max,
            },
            bounds: SizeBounds {
                min_w: p.minw,
                max_w: p.maxw,
                min_h: p.minh,
                max_h: p.maxh,
            },
            learning_rate: p.learning_rate,
            seed_frames: p.seed_frames,
        })
    }
}

/// A restartable, finite lazy sequence of grayscale frames over the
/// chronologically sorted image files of one directory.
pub struct FrameSource {
    paths: Vec<PathBuf>,
}

impl FrameSource {
    /// Enumerate `*.jpg` files in the directory, sorted by file name.
    pub fn from_dir(dir: &Path) -> DetectResult<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("jpg"))
            })
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(DetectError::EmptySequence(dir.to_path_buf()));
        }
        Ok(Self { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn path(&self, index: usize) -> &Path {
        &self.paths[index]
    }

    /// Iterate the sequence from the first frame. Color sources are
    /// converted to grayscale on decode.
    pub fn frames(&self) -> impl Iterator<Item = DetectResult<GrayImage>> + '_ {
        self.paths.iter().map(|path| decode_gray(path))
    }
}

fn decode_gray(path: &Path) -> DetectResult<GrayImage> {
    let img = image::open(path).map_err(|source| DetectError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_luma8())
}

/// Run the detector over one image directory, producing per-frame
/// detection lists keyed by frame index.
pub fn run(image_dir: &Path, config: &DetectorConfig) -> DetectResult<AnalysisResults> {
    let source = FrameSource::from_dir(image_dir)?;
    info!(
        dir = %image_dir.display(),
        frames = source.len(),
        "starting detection"
    );

    // Seed the model with the mean of the first frames, then rewind and
    // classify the full sequence.
    let seed_count = config.seed_frames.min(source.len());
    let mut seed_frames = Vec::with_capacity(seed_count);
    for frame in source.frames().take(seed_count) {
        seed_frames.push(frame?);
    }
    let (width, height) = seed_frames[0].dimensions();
    for (i, frame) in seed_frames.iter().enumerate() {
        check_dimensions(frame, width, height, source.path(i))?;
    }

    let mut model = BackgroundModel::new(width, height, config.mog);
    model.seed(&seed_frames);
    drop(seed_frames);

    let extractor = BlobExtractor::new(config.bounds);
    let mut results = AnalysisResults::default();
    for (index, frame) in source.frames().enumerate() {
        let frame = frame?;
        check_dimensions(&frame, width, height, source.path(index))?;
        let mask = model.apply(&frame, config.learning_rate);
        let detections = extractor.extract(&mask);
        debug!(frame = index, blobs = detections.len(), "frame processed");
        results.frames.push(FrameDetections {
            frameindex: index,
            detections,
        });
    }

    info!(
        frames = results.frames.len(),
        detections = results.detection_count(),
        "detection finished"
    );
    Ok(results)
}

fn check_dimensions(frame: &GrayImage, width: u32, height: u32, path: &Path) -> DetectResult<()> {
    let (got_w, got_h) = frame.dimensions();
    if (got_w, got_h) != (width, height) {
        return Err(DetectError::DimensionMismatch {
            path: path.to_path_buf(),
            got_w,
            got_h,
            want_w: width,
            want_h: height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use tempfile::TempDir;

    const BG: u8 = 60;
    // Spaced so consecutive object intensities never match a previously
    // admitted mixture component.
    const OBJECT_VALUES: [u8; 8] = [100, 120, 140, 160, 180, 200, 220, 240];

    fn write_frame(dir: &Path, index: usize, square: Option<(u32, u32, u32)>) {
        let mut frame = GrayImage::from_pixel(64, 64, Luma([BG]));
        if let Some((x0, y0, size)) = square {
            let value = OBJECT_VALUES[index % OBJECT_VALUES.len()];
            for y in y0..y0 + size {
                for x in x0..x0 + size {
                    frame.put_pixel(x, y, Luma([value]));
                }
            }
        }
        let path = dir.join(format!("frame_{:04}.jpg", index));
        let mut file = std::fs::File::create(path).unwrap();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut file, 95);
        frame.write_with_encoder(encoder).unwrap();
    }

    #[test]
    fn method_file_keys_override_the_defaults() {
        let raw = r#"{
            "name": "bgmog2",
            "script": "finscan-detect",
            "varThreshold": 25.0,
            "minw": 2,
            "maxw": 100,
            "learningRate": 0.1
        }"#;
        let config = DetectorConfig::from_method_json(raw).unwrap();
        assert_eq!(config.mog.var_threshold, 25.0);
        assert_eq!(config.bounds.min_w, 2);
        assert_eq!(config.bounds.max_w, 100);
        assert_eq!(config.learning_rate, 0.1);
        // Keys absent from the file keep their defaults.
        assert_eq!(config.mog.n_mixtures, 5);
        assert_eq!(config.bounds.min_h, 5);
        assert_eq!(config.seed_frames, 10);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = run(dir.path(), &DetectorConfig::default()).unwrap_err();
        assert!(matches!(err, DetectError::EmptySequence(_)));
    }

    #[test]
    fn frame_source_sorts_and_restarts() {
        let dir = TempDir::new().unwrap();
        for i in [2usize, 0, 1] {
            write_frame(dir.path(), i, None);
        }
        let source = FrameSource::from_dir(dir.path()).unwrap();
        assert_eq!(source.len(), 3);
        assert!(source.path(0).to_string_lossy().contains("frame_0000"));
        // Two full passes over the same source.
        assert_eq!(source.frames().count(), 3);
        assert_eq!(source.frames().count(), 3);
    }

    #[test]
    fn appearing_square_is_detected_from_its_first_frame() {
        let dir = TempDir::new().unwrap();
        let appear_at = 12;
        for i in 0..28 {
            let square = (i >= appear_at).then_some((20, 20, 30));
            write_frame(dir.path(), i as usize, square);
        }

        let results = run(dir.path(), &DetectorConfig::default()).unwrap();
        assert_eq!(results.frames.len(), 28);

        for frame in &results.frames {
            if frame.frameindex < appear_at as usize {
                assert!(
                    frame.detections.is_empty(),
                    "unexpected detection in frame {}",
                    frame.frameindex
                );
            } else {
                assert_eq!(frame.detections.len(), 1, "frame {}", frame.frameindex);
                let b = &frame.detections[0];
                // JPEG compression can smear the edge by a few pixels.
                assert!((b.x1 - 20).abs() <= 3 && (b.y1 - 20).abs() <= 3);
                assert!((b.x2 - 50).abs() <= 3 && (b.y2 - 50).abs() <= 3);
            }
        }
    }
}
