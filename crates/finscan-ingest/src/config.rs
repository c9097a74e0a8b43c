//! Ingestion configuration.
//!
//! All paths are resolved once into an explicit configuration object
//! threaded through the scanner and orchestrator; nothing changes the
//! process working directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{IngestError, IngestResult};

/// Storage roots and child-process timeouts, loadable from a JSON
/// settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database_storage: Option<PathBuf>,
    pub video_storage: Option<PathBuf>,
    pub temporary_storage: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub video_overlay_storage: Option<PathBuf>,
    pub csv_storage: Option<PathBuf>,
    pub algorithms: Option<PathBuf>,
    pub detector_timeout_secs: Option<u64>,
    pub encoder_timeout_secs: Option<u64>,
}

/// Resolved ingestion configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root of the deployment's data directories.
    pub datadir: PathBuf,
    /// Database filename prefix (`<prefix>-<day>.db`).
    pub prefix: String,
    /// Reprocess segments whose CSV export already exists.
    pub force: bool,
    /// Algorithm name; its `<name>.json` config lives in `algorithms`.
    pub algorithm: String,
    /// Directory holding algorithm configuration files.
    pub algorithms: PathBuf,
    /// Seconds before a hung detector child is killed.
    pub detector_timeout_secs: u64,
    /// Seconds before a hung encoder child is killed.
    pub encoder_timeout_secs: u64,

    pub database_storage: PathBuf,
    pub video_storage: PathBuf,
    pub temporary_storage: PathBuf,
    pub cache: PathBuf,
    pub video_overlay_storage: PathBuf,
    pub csv_storage: PathBuf,
}

impl IngestConfig {
    /// Resolve the configuration from CLI values and an optional settings
    /// file; storage roots default under `<datadir>/_finscan`. Creates
    /// the storage directories; a missing algorithms directory or method
    /// configuration file is fatal.
    pub fn resolve(
        datadir: PathBuf,
        prefix: String,
        force: bool,
        algorithm: String,
        settings_file: Option<&Path>,
    ) -> IngestResult<Self> {
        if !datadir.is_dir() {
            return Err(IngestError::config(format!(
                "invalid data dir: {}",
                datadir.display()
            )));
        }

        let settings = match settings_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    IngestError::config(format!("cannot read {}: {e}", path.display()))
                })?;
                serde_json::from_str::<StorageSettings>(&raw).map_err(|e| {
                    IngestError::config(format!("cannot parse {}: {e}", path.display()))
                })?
            }
            None => StorageSettings::default(),
        };

        let default_root = datadir.join("_finscan");
        let pick = |explicit: Option<PathBuf>, sub: &str| {
            explicit.unwrap_or_else(|| default_root.join(sub))
        };

        let config = Self {
            prefix,
            force,
            algorithm,
            algorithms: pick(settings.algorithms, "algorithms"),
            detector_timeout_secs: settings.detector_timeout_secs.unwrap_or(600),
            encoder_timeout_secs: settings.encoder_timeout_secs.unwrap_or(600),
            database_storage: pick(settings.database_storage, "db"),
            video_storage: pick(settings.video_storage, "videos"),
            temporary_storage: pick(settings.temporary_storage, "tmp"),
            cache: pick(settings.cache, "cache"),
            video_overlay_storage: pick(settings.video_overlay_storage, "overlay"),
            csv_storage: pick(settings.csv_storage, "csv"),
            datadir,
        };

        for dir in [
            &config.database_storage,
            &config.video_storage,
            &config.temporary_storage,
            &config.cache,
            &config.video_overlay_storage,
            &config.csv_storage,
        ] {
            std::fs::create_dir_all(dir)?;
        }

        if !config.algorithms.is_dir() {
            return Err(IngestError::config(format!(
                "invalid algorithm dir: {}",
                config.algorithms.display()
            )));
        }
        let method_file = config.method_config_path();
        if !method_file.is_file() {
            return Err(IngestError::config(format!(
                "missing method configuration: {}",
                method_file.display()
            )));
        }

        Ok(config)
    }

    /// Path of the `<algorithm>.json` method configuration file.
    pub fn method_config_path(&self) -> PathBuf {
        self.algorithms.join(format!("{}.json", self.algorithm))
    }
}
