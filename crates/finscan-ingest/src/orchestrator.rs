//! Ingestion orchestration.
//!
//! Per day directory: open or create the day database, register the
//! analysis method, then for each camera segment assemble the raw video,
//! run the detector child process, and persist the video record, CSV
//! export, overlay video, and analysis run. Segments whose CSV export
//! already exists are skipped unless forced; segment failures are
//! recorded as `FAILED` runs and never abort the run.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use finscan_media::{assemble_video, export_thumbnail, render_overlay_frames, FfmpegRunner};
use finscan_models::{AnalysisResults, AnalysisStatus, MethodConfig};
use finscan_store::{DayStore, VideoRecord};

use crate::config::IngestConfig;
use crate::csv::write_detections_csv;
use crate::detector_process::DetectorRunner;
use crate::error::{IngestError, IngestResult};
use crate::scanner::{self, CameraSegment, DayDir};

/// Totals reported at the end of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Videos produced (processed segments).
    pub videos: u64,
    /// Seconds of footage processed.
    pub seconds: f64,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn minutes(&self) -> f64 {
        self.seconds / 60.0
    }
}

/// A segment that went through video assembly and detection, waiting to
/// be ingested into the day database.
struct PendingSegment {
    segment: CameraSegment,
    video_path: PathBuf,
    csv_path: PathBuf,
    results_path: PathBuf,
    status: AnalysisStatus,
}

/// Drives the whole ingestion pipeline for one deployment.
pub struct Orchestrator {
    config: IngestConfig,
    method: MethodConfig,
    /// Normalized (compact) method configuration JSON.
    method_params: String,
    detector: DetectorRunner,
}

impl Orchestrator {
    /// Load the method configuration and resolve the detector program.
    pub fn new(config: IngestConfig) -> IngestResult<Self> {
        let method_file = config.method_config_path();
        let raw = std::fs::read_to_string(&method_file).map_err(|e| {
            IngestError::config(format!("cannot read {}: {e}", method_file.display()))
        })?;
        let method = MethodConfig::from_json(&raw).map_err(|e| {
            IngestError::config(format!("cannot parse {}: {e}", method_file.display()))
        })?;
        let method_params = method.normalized()?;

        // A script that exists next to the method configuration wins;
        // otherwise the name is resolved through PATH by the OS.
        let colocated = config.algorithms.join(&method.script);
        let program = if colocated.is_file() {
            colocated
        } else {
            PathBuf::from(&method.script)
        };
        let detector =
            DetectorRunner::new(program, config.detector_timeout_secs).with_params(method_file);

        Ok(Self {
            config,
            method,
            method_params,
            detector,
        })
    }

    /// Process every day of the deployment and report totals.
    pub async fn run(&self) -> IngestResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let days = scanner::day_dirs(&self.config.datadir)?;
        info!(days = days.len(), root = %self.config.datadir.display(), "deployment scanned");
        for day in &days {
            self.process_day(day, &mut summary).await?;
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// Run the per-day state machine.
    async fn process_day(&self, day: &DayDir, summary: &mut RunSummary) -> IngestResult<()> {
        let db_path = self
            .config
            .database_storage
            .join(format!("{}-{}.db", self.config.prefix, day.name));
        info!(day = %day.name, db = %db_path.display(), "processing day");

        let store = DayStore::open(&db_path)?;
        let mid = store.register_method(
            &self.method.name,
            &self.method_params,
            &self.config.algorithms.to_string_lossy(),
        )?;

        let mut pending = Vec::new();
        for time_dir in scanner::time_dirs(&day.path)? {
            for segment in scanner::segments(&time_dir)? {
                match self.process_segment(segment).await {
                    Ok(Some(p)) => pending.push(p),
                    Ok(None) => {}
                    Err(e) => error!(day = %day.name, "segment processing failed: {e}"),
                }
            }
        }

        for p in &pending {
            summary.videos += 1;
            summary.seconds += p.segment.duration_secs();
            if let Err(e) = self.ingest_segment(&store, mid, p).await {
                error!(stem = %p.segment.stem(), "segment ingest failed: {e}");
            }
        }
        Ok(())
    }

    /// Assemble the raw video and run the detector for one segment.
    /// Returns `None` when the segment is skipped as already processed.
    async fn process_segment(
        &self,
        segment: CameraSegment,
    ) -> IngestResult<Option<PendingSegment>> {
        let stem = segment.stem();
        let csv_path = self.config.csv_storage.join(format!("{stem}.csv"));
        if should_skip(&csv_path, self.config.force) {
            info!(stem = %stem, "already processed, skipped");
            return Ok(None);
        }

        let video_path = self.config.video_storage.join(format!("{stem}.mp4"));
        let mut assembly_failed = false;
        if !csv_path.exists() {
            info!(video = %video_path.display(), "assembling video");
            let runner = FfmpegRunner::new().with_timeout(self.config.encoder_timeout_secs);
            if let Err(e) =
                assemble_video(&segment.images, segment.frame_rate, &video_path, &runner).await
            {
                warn!(stem = %stem, "video assembly failed: {e}");
                assembly_failed = true;
            }
        }
        if let Err(e) = export_thumbnail(&segment.images, &self.config.cache, &stem) {
            warn!(stem = %stem, "thumbnail export failed: {e}");
        }

        let results_path = self.config.temporary_storage.join(format!("{stem}.json"));
        let status = if assembly_failed {
            AnalysisStatus::Failed
        } else {
            info!(stem = %stem, "finding fish");
            self.detector.run(&segment.image_dir, &results_path).await?
        };

        Ok(Some(PendingSegment {
            segment,
            video_path,
            csv_path,
            results_path,
            status,
        }))
    }

    /// Persist one processed segment: video record, CSV export, overlay
    /// video, analysis run.
    async fn ingest_segment(
        &self,
        store: &DayStore,
        mid: i64,
        p: &PendingSegment,
    ) -> IngestResult<()> {
        let stem = p.segment.stem();
        info!(stem = %stem, status = %p.status, "ingesting segment");

        let (width, height) = p
            .segment
            .images
            .first()
            .and_then(|frame| image::image_dimensions(frame).ok())
            .unwrap_or((0, 0));
        let vid = store.insert_video(&VideoRecord::new(
            p.video_path.to_string_lossy(),
            stem.clone(),
            p.segment.duration_secs(),
            p.segment.frame_rate,
            width as i64,
            height as i64,
        ))?;

        // The detector's results document, re-serialized compactly; a
        // failed run stores an empty payload.
        let (status, results) = match p.status {
            AnalysisStatus::Finished => match self.load_results(&p.results_path) {
                Ok(results) => (AnalysisStatus::Finished, results),
                Err(e) => {
                    warn!(stem = %stem, "unreadable detector results: {e}");
                    (AnalysisStatus::Failed, None)
                }
            },
            AnalysisStatus::Failed => (AnalysisStatus::Failed, None),
        };

        let parsed = results.as_ref();
        let results_json = match parsed {
            Some(r) => serde_json::to_string(&r.frames)?,
            None => String::new(),
        };

        write_detections_csv(
            &p.csv_path,
            parsed.unwrap_or(&AnalysisResults::default()),
            p.segment.frame_rate,
            &self.method.name,
        )?;

        if let Some(results) = parsed {
            if let Err(e) = self.build_overlay(&stem, &p.segment, results).await {
                warn!(stem = %stem, "overlay build failed: {e}");
            }
        }

        store.insert_analysis(mid, vid, status, &results_json)?;
        Ok(())
    }

    fn load_results(&self, path: &Path) -> IngestResult<Option<AnalysisResults>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Render annotated frames into an exclusively owned scratch
    /// directory and assemble them into the overlay video. The scratch
    /// space is removed on all exit paths when the `TempDir` drops.
    async fn build_overlay(
        &self,
        stem: &str,
        segment: &CameraSegment,
        results: &AnalysisResults,
    ) -> IngestResult<()> {
        let scratch = tempfile::TempDir::new_in(&self.config.temporary_storage)?;
        let frames = render_overlay_frames(&segment.images, results, scratch.path())?;
        let overlay_path = self
            .config
            .video_overlay_storage
            .join(format!("{stem}.mp4"));
        let runner = FfmpegRunner::new().with_timeout(self.config.encoder_timeout_secs);
        assemble_video(&frames, segment.frame_rate, &overlay_path, &runner).await?;
        Ok(())
    }
}

/// The sole incremental-processing mechanism: a segment is already
/// processed when its target CSV export exists.
fn should_skip(csv_path: &Path, force: bool) -> bool {
    csv_path.exists() && !force
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn seed_deployment(script: &str) -> TempDir {
        let root = TempDir::new().unwrap();
        let time = root.path().join("2019_10_01/2019_10_01 09_00_00");
        let cam = time.join("Camera 1");
        std::fs::create_dir_all(&cam).unwrap();
        for i in 0..3 {
            GrayImage::from_pixel(32, 32, Luma([60]))
                .save(cam.join(format!("frame_{:04}.jpg", i)))
                .unwrap();
        }

        let algs = root.path().join("_finscan/algorithms");
        std::fs::create_dir_all(&algs).unwrap();
        std::fs::write(
            algs.join("bgmog2.json"),
            format!(r#"{{"name":"bgmog2","script":"{script}","varThreshold":16.0,"minw":5}}"#),
        )
        .unwrap();
        root
    }

    fn write_script(path: &Path, body: &str) {
        std::fs::write(path, body).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Puts a stand-in `ffmpeg` on PATH that creates its last argument,
    /// the output file, and exits 0.
    fn install_fake_encoder(root: &Path) {
        let bin = root.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        write_script(
            &bin.join("ffmpeg"),
            "#!/bin/sh\nfor arg in \"$@\"; do out=\"$arg\"; done\ntouch \"$out\"\n",
        );
        let path = std::env::var("PATH").unwrap_or_default();
        std::env::set_var("PATH", format!("{}:{path}", bin.display()));
    }

    fn config_for(root: &TempDir, force: bool) -> IngestConfig {
        IngestConfig::resolve(
            root.path().to_path_buf(),
            "stereovision".into(),
            force,
            "bgmog2".into(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn skip_logic_follows_the_csv_marker() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("seg.csv");
        assert!(!should_skip(&csv, false));
        std::fs::write(&csv, "time,x,y,w,h,method\n").unwrap();
        assert!(should_skip(&csv, false));
        assert!(!should_skip(&csv, true));
    }

    #[tokio::test]
    async fn finished_segments_export_rows_and_overlay() {
        let root = seed_deployment("fakedet.sh");
        install_fake_encoder(root.path());

        // Detector stand-in colocated with its configuration. It refuses
        // to run without the forwarded method file and reports one
        // detection in frame 1.
        write_script(
            &root.path().join("_finscan/algorithms/fakedet.sh"),
            concat!(
                "#!/bin/sh\n",
                "[ \"$3\" = --params ] || exit 1\n",
                "[ -f \"$4\" ] || exit 1\n",
                "printf '%s' '{\"frames\":[{\"frameindex\":1,",
                "\"detections\":[{\"x1\":5,\"y1\":6,\"x2\":15,\"y2\":20}]}]}' > \"$2\"\n",
            ),
        );

        let config = config_for(&root, false);
        let csv_path = config.csv_storage.join("2019_10_01 09_00_00_Cam1.csv");
        let overlay_path = config
            .video_overlay_storage
            .join("2019_10_01 09_00_00_Cam1.mp4");
        let video_path = config.video_storage.join("2019_10_01 09_00_00_Cam1.mp4");
        let db_path = config
            .database_storage
            .join("stereovision-2019_10_01.db");

        let summary = Orchestrator::new(config).unwrap().run().await.unwrap();
        assert_eq!(summary.videos, 1);

        // Frame 1 at 10 Hz, a 10x14 box anchored at (5, 6).
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(
            csv.contains("00:00:00.100000,5,6,10,14,bgmog2"),
            "csv was: {csv}"
        );
        assert!(video_path.is_file());
        assert!(overlay_path.is_file());

        let store = DayStore::open(&db_path).unwrap();
        let video = store
            .video_by_filename(&video_path.to_string_lossy())
            .unwrap()
            .unwrap();
        let runs = store.analyses_for_video(video.vid).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "FINISHED");
        assert!(runs[0].results.contains("\"frameindex\":1"));

        // The method row carries the full configuration document.
        let method = store.method_by_description("bgmog2").unwrap().unwrap();
        assert!(method.parameters.contains("varThreshold"));
    }

    #[tokio::test]
    async fn failed_segments_are_recorded_and_not_reprocessed() {
        let root = seed_deployment("/nonexistent/finscan-detect");

        // First run: the detector program does not exist, so the segment
        // fails but is still fully recorded.
        let config = config_for(&root, false);
        let db_path = config
            .database_storage
            .join("stereovision-2019_10_01.db");
        let summary = Orchestrator::new(config).unwrap().run().await.unwrap();
        assert_eq!(summary.videos, 1);
        assert!((summary.seconds - 0.3).abs() < 1e-9);

        let store = DayStore::open(&db_path).unwrap();
        assert_eq!(store.video_count().unwrap(), 1);
        let video = store
            .video_by_filename(
                &config_for(&root, false)
                    .video_storage
                    .join("2019_10_01 09_00_00_Cam1.mp4")
                    .to_string_lossy(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(video.width, 32);
        assert_eq!(store.analysis_count_for_video(video.vid).unwrap(), 1);
        drop(store);

        // The CSV marker exists (header only), so a second run without
        // the force flag skips the segment entirely.
        let summary = Orchestrator::new(config_for(&root, false))
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(summary.videos, 0);

        let store = DayStore::open(&db_path).unwrap();
        assert_eq!(store.video_count().unwrap(), 1);

        // Forcing appends a second video and analysis row.
        drop(store);
        let summary = Orchestrator::new(config_for(&root, true))
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(summary.videos, 1);
        let store = DayStore::open(&db_path).unwrap();
        assert_eq!(store.video_count().unwrap(), 2);
    }
}
