//! Standalone detector process.
//!
//! Invoked by the ingestion pipeline once per camera segment:
//! `finscan-detect <IMAGE_DIR> <OUTPUT_JSON> --params <METHOD_JSON>`.
//! Writes the results
//! document on success and exits non-zero on any failure, so a crash in
//! one segment cannot take down the orchestrator.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use finscan_detect::{detector, DetectorConfig};

#[derive(Parser, Debug)]
#[command(name = "finscan-detect", about = "Background-subtraction fish detector")]
struct Args {
    /// Directory holding the segment's image files
    image_dir: PathBuf,

    /// Path of the JSON results document to write
    output: PathBuf,

    /// Method configuration file (flat JSON tuning keys)
    #[arg(long)]
    params: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("detection failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = match &args.params {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading params file {}", path.display()))?;
            DetectorConfig::from_method_json(&raw)
                .with_context(|| format!("parsing params file {}", path.display()))?
        }
        None => DetectorConfig::default(),
    };

    let results = detector::run(&args.image_dir, &config)
        .with_context(|| format!("processing {}", args.image_dir.display()))?;

    let json = serde_json::to_string(&results)?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("writing results to {}", args.output.display()))?;
    Ok(())
}
