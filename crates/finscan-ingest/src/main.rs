//! Deployment ingestion binary.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use finscan_ingest::{IngestConfig, Orchestrator};

#[derive(Debug, Parser)]
#[command(name = "finscan-ingest", about = "Scan a camera deployment and ingest detections")]
struct Args {
    /// Root directory of the deployment (day directories inside).
    #[arg(long)]
    datadir: PathBuf,

    /// Day database filename prefix.
    #[arg(long, default_value = "stereovision")]
    prefix: String,

    /// Reprocess segments even when their CSV export exists.
    #[arg(long)]
    force: bool,

    /// Optional storage settings file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detection method name; selects `<algorithm>.json` in the
    /// algorithms directory.
    #[arg(long, default_value = "bgmog2")]
    algorithm: String,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("finscan=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let args = Args::parse();
    info!("Starting finscan-ingest");

    let config = match IngestConfig::resolve(
        args.datadir,
        args.prefix,
        args.force,
        args.algorithm,
        args.config.as_deref(),
    ) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let orchestrator = match Orchestrator::new(config) {
        Ok(o) => o,
        Err(e) => {
            error!("Failed to load method configuration: {e}");
            std::process::exit(1);
        }
    };

    // Segment-level failures are logged and recorded as FAILED runs; only
    // configuration problems abort the run.
    match orchestrator.run().await {
        Ok(summary) => {
            info!(
                videos = summary.videos,
                minutes = format!("{:.1}", summary.minutes()),
                elapsed = ?summary.elapsed,
                "ingestion complete"
            );
            println!(
                "Processed {} videos ({:.1} minutes of footage) in {:.1?}",
                summary.videos,
                summary.minutes(),
                summary.elapsed
            );
        }
        Err(e) => {
            error!("Ingestion failed: {e}");
            std::process::exit(1);
        }
    }
}
