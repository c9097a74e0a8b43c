//! Deployment directory scanner.
//!
//! Recognizes two layouts: `day/time/Camera N/*.jpg` with day directories
//! named `YYYY_MM_DD`, and a flattened layout where the root itself is a
//! single time directory (`YYYY_MM_DD HH_MM_SS`).

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::IngestResult;

const DAY_FORMAT: &str = "%Y_%m_%d";
const TIME_FORMAT: &str = "%Y_%m_%d %H_%M_%S";

/// Cameras are numbered 1 through 4, two per settings-file pair.
pub const CAMERA_COUNT: u8 = 4;

/// One day directory of a deployment.
#[derive(Debug, Clone)]
pub struct DayDir {
    pub path: PathBuf,
    /// Directory base name, used in the day database filename.
    pub name: String,
}

/// Per-camera settings read from a pair settings file.
#[derive(Debug, Clone, Copy)]
pub struct CameraSettings {
    pub frame_rate: f64,
    /// Recorded but currently unused.
    pub auto_exposure: bool,
    /// Recorded but currently unused.
    pub auto_gain: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            frame_rate: 10.0,
            auto_exposure: true,
            auto_gain: true,
        }
    }
}

/// One camera's image sequence for one time-directory window.
#[derive(Debug, Clone)]
pub struct CameraSegment {
    pub camera: u8,
    /// Base name of the time directory, e.g. `2019_10_01 09_00_00`.
    pub time_name: String,
    pub image_dir: PathBuf,
    pub frame_rate: f64,
    /// Chronologically sorted image files; never empty.
    pub images: Vec<PathBuf>,
}

impl CameraSegment {
    /// Artifact stem shared by the video, CSV, thumbnail, and results
    /// files of this segment.
    pub fn stem(&self) -> String {
        format!("{}_Cam{}", self.time_name, self.camera)
    }

    pub fn duration_secs(&self) -> f64 {
        self.images.len() as f64 / self.frame_rate
    }
}

/// Enumerate the day directories under `root`, sorted by name.
///
/// When no `YYYY_MM_DD` directories exist but `root` contains time
/// directories, the root itself is the sole "day".
pub fn day_dirs(root: &Path) -> IngestResult<Vec<DayDir>> {
    let mut days: Vec<DayDir> = subdirs(root)?
        .into_iter()
        .filter_map(|path| {
            let name = dir_name(&path)?;
            NaiveDate::parse_from_str(&name, DAY_FORMAT).ok()?;
            Some(DayDir { path, name })
        })
        .collect();
    days.sort_by(|a, b| a.name.cmp(&b.name));

    if days.is_empty() && !time_dirs(root)?.is_empty() {
        if let Some(name) = dir_name(root) {
            debug!(root = %root.display(), "treating flattened root as a single day");
            days.push(DayDir {
                path: root.to_path_buf(),
                name,
            });
        }
    }
    Ok(days)
}

/// Enumerate the time directories of one day, sorted by name.
pub fn time_dirs(day: &Path) -> IngestResult<Vec<PathBuf>> {
    let mut times: Vec<PathBuf> = subdirs(day)?
        .into_iter()
        .filter(|path| {
            dir_name(path)
                .map(|name| NaiveDateTime::parse_from_str(&name, TIME_FORMAT).is_ok())
                .unwrap_or(false)
        })
        .collect();
    times.sort();
    Ok(times)
}

/// Enumerate the processable camera segments of one time directory.
///
/// A camera with zero recorded frame rate is treated as not recording; a
/// segment exists only if its camera subdirectory holds at least one
/// image.
pub fn segments(time_dir: &Path) -> IngestResult<Vec<CameraSegment>> {
    let Some(time_name) = dir_name(time_dir) else {
        return Ok(Vec::new());
    };
    let settings = read_pair_settings(time_dir);

    let mut segments = Vec::new();
    for camera in 1..=CAMERA_COUNT {
        let cam_settings = settings[(camera - 1) as usize];
        if cam_settings.frame_rate <= 0.0 {
            debug!(camera, time = %time_name, "camera not recording, skipped");
            continue;
        }
        let image_dir = time_dir.join(format!("Camera {camera}"));
        if !image_dir.is_dir() {
            continue;
        }
        let images = image_files(&image_dir)?;
        debug!(camera, images = images.len(), time = %time_name, "camera scanned");
        if images.is_empty() {
            continue;
        }
        segments.push(CameraSegment {
            camera,
            time_name: time_name.clone(),
            image_dir,
            frame_rate: cam_settings.frame_rate,
            images,
        });
    }
    Ok(segments)
}

/// Read the two `Camera Pair N Settings.txt` files of a time directory.
///
/// Pair 1 covers cameras 1-2, pair 2 covers cameras 3-4. A missing or
/// unparseable file falls back to the defaults.
fn read_pair_settings(time_dir: &Path) -> [CameraSettings; CAMERA_COUNT as usize] {
    let mut settings = [CameraSettings::default(); CAMERA_COUNT as usize];
    for pair in 0..2usize {
        let path = time_dir.join(format!("Camera Pair {} Settings.txt", pair + 1));
        if let Ok(contents) = std::fs::read_to_string(&path) {
            let (a, b) = parse_settings(&contents);
            settings[pair * 2] = a;
            settings[pair * 2 + 1] = b;
        }
    }
    settings
}

/// Parse one settings file, returning the pair's two camera settings.
///
/// The file is plain text with one labelled numeric field per line:
/// `Frame Rate 1 [Hz]: 10.00`, `Auto-Exposure Enabled: 1`, ...
fn parse_settings(contents: &str) -> (CameraSettings, CameraSettings) {
    let mut first = CameraSettings::default();
    let mut second = CameraSettings::default();
    for line in contents.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = label.trim();
        let value = value.trim();
        match label {
            "Frame Rate 1 [Hz]" => {
                if let Ok(v) = value.parse() {
                    first.frame_rate = v;
                }
            }
            "Frame Rate 2 [Hz]" => {
                if let Ok(v) = value.parse() {
                    second.frame_rate = v;
                }
            }
            "Auto-Exposure Enabled" => {
                let enabled = value == "1";
                first.auto_exposure = enabled;
                second.auto_exposure = enabled;
            }
            "Auto-Gain Enabled" => {
                let enabled = value == "1";
                first.auto_gain = enabled;
                second.auto_gain = enabled;
            }
            _ => {}
        }
    }
    (first, second)
}

fn image_files(dir: &Path) -> IngestResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("jpg"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn subdirs(dir: &Path) -> IngestResult<Vec<PathBuf>> {
    Ok(std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect())
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAIR1: &str = "8/1/2019, 9:54:05 AM\n\n\
        Auto-Frame Rate Enabled: 0\n\
        Frame Rate 1 [Hz]: 10.00\n\
        Frame Rate 2 [Hz]: 0.00\n\n\
        Auto-Exposure Enabled: 1\n\
        Exposure 1 [ms]: 3.28\n\
        Exposure 2 [ms]: 3.35\n\n\
        Auto-Gain Enabled: 0\n\
        Gain 1: 0.00\n\
        Gain 2: 0.00\n\
        Gamma: 0.80\n";

    fn touch_images(dir: &Path, count: usize) {
        std::fs::create_dir_all(dir).unwrap();
        for i in 0..count {
            std::fs::write(dir.join(format!("2019_10_01_09_00_{:02}.00.jpg", i)), b"x").unwrap();
        }
    }

    #[test]
    fn parses_pair_settings() {
        let (a, b) = parse_settings(PAIR1);
        assert_eq!(a.frame_rate, 10.0);
        assert_eq!(b.frame_rate, 0.0);
        assert!(a.auto_exposure);
        assert!(!a.auto_gain);
    }

    #[test]
    fn scans_day_time_camera_tree() {
        let root = TempDir::new().unwrap();
        let time = root.path().join("2019_10_01/2019_10_01 09_00_00");
        std::fs::create_dir_all(&time).unwrap();
        std::fs::write(time.join("Camera Pair 1 Settings.txt"), PAIR1).unwrap();
        touch_images(&time.join("Camera 1"), 3);
        touch_images(&time.join("Camera 2"), 3); // fps 0, must be skipped
        std::fs::create_dir_all(time.join("Camera 3")).unwrap(); // empty, skipped
        // stray non-matching directory
        std::fs::create_dir_all(root.path().join("notes")).unwrap();

        let days = day_dirs(root.path()).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].name, "2019_10_01");

        let times = time_dirs(&days[0].path).unwrap();
        assert_eq!(times.len(), 1);

        let segs = segments(&times[0]).unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].camera, 1);
        assert_eq!(segs[0].frame_rate, 10.0);
        assert_eq!(segs[0].images.len(), 3);
        assert_eq!(segs[0].stem(), "2019_10_01 09_00_00_Cam1");
    }

    #[test]
    fn missing_settings_default_to_ten_hz() {
        let root = TempDir::new().unwrap();
        let time = root.path().join("2019_10_01/2019_10_01 10_00_00");
        touch_images(&time.join("Camera 4"), 2);

        let segs = segments(&root.path().join("2019_10_01/2019_10_01 10_00_00")).unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].camera, 4);
        assert_eq!(segs[0].frame_rate, 10.0);
    }

    #[test]
    fn flattened_root_is_a_single_day() {
        let root = TempDir::new().unwrap();
        let flat = root.path().join("2019_10_01 09_00_00");
        let inner = flat.join("2019_10_01 09_00_00");
        touch_images(&inner.join("Camera 1"), 2);

        let days = day_dirs(&flat).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].path, flat);
        assert_eq!(days[0].name, "2019_10_01 09_00_00");
    }

    #[test]
    fn images_are_sorted_chronologically() {
        let dir = TempDir::new().unwrap();
        for name in ["c.jpg", "a.jpg", "b.jpg", "readme.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let files = image_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }
}
