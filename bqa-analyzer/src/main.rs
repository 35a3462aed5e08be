//! bqa-analyzer - Breath QA batch analyzer
//!
//! Segments each recording into breaths, computes per-breath metrics,
//! filters implausible breaths and writes `<stem>.qa.json` per input.
//! Recordings are processed in parallel, one pipeline per recording.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bqa_analyzer::batch::process_recording_file;
use bqa_analyzer::{AnalyzerConfig, QaPipeline};
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "bqa-analyzer", version, about = "Breath segmentation and QA metrics")]
struct Args {
    /// Config file (overrides BQA_CONFIG and the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for reports (overrides the config file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the effective parameters as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Recording files in JSON hand-off format
    recordings: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config loading logs before the configured subscriber exists
    let config = bqa_common::logging::with_bootstrap_logging(|| {
        AnalyzerConfig::load(args.config.as_deref())
    })
    .context("Failed to load configuration")?;
    bqa_common::logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting bqa-analyzer");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if args.print_config {
        println!("{}", config.parameters.to_toml_string()?);
        return Ok(());
    }

    if args.recordings.is_empty() {
        bail!("No recordings given");
    }

    let output_dir = args
        .output_dir
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut tasks = JoinSet::new();
    for input in args.recordings {
        // Each recording gets its own pipeline and parameter copy
        let pipeline = QaPipeline::new(config.parameters.clone())?;
        let output_dir = output_dir.clone();
        tasks.spawn_blocking(move || {
            let result = process_recording_file(&pipeline, &input, &output_dir);
            (input, result)
        });
    }

    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        let (input, result) = joined.context("Analysis task panicked")?;
        match result {
            Ok(_) => {}
            Err(e) if e.is_structural() => {
                error!(input = %input.display(), error = %e, "Recording could not be read");
                failures += 1;
            }
            Err(e) => {
                warn!(input = %input.display(), error = %e, "Recording rejected");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} recording(s) failed", failures);
    }
    info!("All recordings processed");
    Ok(())
}
