//! Isolated detector child process.
//!
//! Each camera segment's detection run executes as an independent
//! process so a crash in one segment cannot corrupt the orchestrator or
//! abort other segments. The child's exit code determines the analysis
//! status; spawn failures and timeouts are failures too, recorded rather
//! than raised.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use finscan_models::AnalysisStatus;

use crate::error::IngestResult;

/// Runner for the per-segment detector process.
#[derive(Debug, Clone)]
pub struct DetectorRunner {
    program: PathBuf,
    params: Option<PathBuf>,
    timeout_secs: u64,
}

impl DetectorRunner {
    pub fn new(program: PathBuf, timeout_secs: u64) -> Self {
        Self {
            program,
            params: None,
            timeout_secs,
        }
    }

    /// Forward the method configuration file to every child via
    /// `--params <file>`, so the detector runs with the deployment's
    /// tuning instead of its built-in defaults.
    pub fn with_params(mut self, params: PathBuf) -> Self {
        self.params = Some(params);
        self
    }

    /// Invoke the detector with `(image_dir, output_json)`, plus the
    /// attached method configuration, and block to completion. Exit code
    /// 0 maps to `FINISHED`, everything else — non-zero exit, spawn
    /// failure, timeout — to `FAILED`.
    pub async fn run(&self, image_dir: &Path, output_json: &Path) -> IngestResult<AnalysisStatus> {
        debug!(
            program = %self.program.display(),
            dir = %image_dir.display(),
            "spawning detector"
        );
        let mut command = Command::new(&self.program);
        command.arg(image_dir).arg(output_json);
        if let Some(params) = &self.params {
            command.arg("--params").arg(params);
        }
        let child = command.stdin(Stdio::null()).spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    program = %self.program.display(),
                    "failed to spawn detector: {e}"
                );
                return Ok(AnalysisStatus::Failed);
            }
        };

        let wait = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            child.wait(),
        );
        match wait.await {
            Ok(Ok(status)) if status.success() => Ok(AnalysisStatus::Finished),
            Ok(Ok(status)) => {
                warn!(code = ?status.code(), dir = %image_dir.display(), "detector failed");
                Ok(AnalysisStatus::Failed)
            }
            Ok(Err(e)) => {
                warn!(dir = %image_dir.display(), "detector wait failed: {e}");
                Ok(AnalysisStatus::Failed)
            }
            Err(_) => {
                warn!(
                    timeout = self.timeout_secs,
                    dir = %image_dir.display(),
                    "detector timed out, killing process"
                );
                let _ = child.kill().await;
                Ok(AnalysisStatus::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn forwards_the_method_configuration_to_the_child() {
        let dir = TempDir::new().unwrap();
        let argv_log = dir.path().join("argv.txt");
        let script = dir.path().join("detector.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", argv_log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let params = dir.path().join("bgmog2.json");
        let runner = DetectorRunner::new(script, 5).with_params(params.clone());
        let status = tokio_test::block_on(
            runner.run(Path::new("/tmp/images"), Path::new("/tmp/out.json")),
        )
        .unwrap();
        assert_eq!(status, AnalysisStatus::Finished);

        let argv: Vec<String> = std::fs::read_to_string(&argv_log)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        assert_eq!(
            argv,
            vec![
                "/tmp/images".to_string(),
                "/tmp/out.json".to_string(),
                "--params".to_string(),
                params.to_string_lossy().into_owned(),
            ]
        );
    }

    #[test]
    fn missing_program_is_a_recorded_failure() {
        let runner = DetectorRunner::new(PathBuf::from("/nonexistent/finscan-detect"), 5);
        let status = tokio_test::block_on(
            runner.run(Path::new("/tmp/images"), Path::new("/tmp/out.json")),
        )
        .unwrap();
        assert_eq!(status, AnalysisStatus::Failed);
    }
}
