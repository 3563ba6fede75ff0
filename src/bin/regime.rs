//! Command-line front end for the regime labelling pipeline.
//!
//! - `regime cluster`: fit a model to a dataset and write labels, centroids,
//!   event log, metrics and cluster names
//! - `regime predict`: label a new dataset against saved centroids

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use regime_rs::io::output::{read_centroids, OutputWriter};
use regime_rs::{Dataset, Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "regime")]
#[command(version)]
#[command(about = "Cluster time-ordered feature vectors into smoothed regimes and event logs")]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the configured clustering method and post-process its labels
    Cluster {
        /// TOML params file; `cluster.n_clusters` is updated in place
        #[arg(long)]
        params: PathBuf,
        /// Dataset JSON with `timestamps` and `vectors`
        #[arg(long)]
        data: PathBuf,
        /// Directory for output artifacts
        #[arg(long)]
        output: PathBuf,
        /// Do not write the realized cluster count back to the params file
        #[arg(long)]
        keep_config: bool,
    },
    /// Label a dataset by nearest saved centroid
    Predict {
        /// Centroids written by a previous `cluster` run
        #[arg(long)]
        centers: PathBuf,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Segments shorter than this are smoothed away; 0 disables
        #[arg(long, default_value_t = 0)]
        min_segment_length: usize,
        /// Case identifier for the event log; random when omitted
        #[arg(long, default_value = "")]
        case: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Cluster {
            params,
            data,
            output,
            keep_config,
        } => cluster(params, data, output, keep_config),
        Commands::Predict {
            centers,
            data,
            output,
            min_segment_length,
            case,
        } => predict(centers, data, output, min_segment_length, &case),
    }
}

fn cluster(params: PathBuf, data: PathBuf, output: PathBuf, keep_config: bool) -> Result<()> {
    let config = PipelineConfig::load(&params)
        .with_context(|| format!("failed to load params from {}", params.display()))?;
    let dataset = Dataset::load(&data)
        .with_context(|| format!("failed to load dataset from {}", data.display()))?;

    let pipeline = Pipeline::new(config)?;
    let result = pipeline.run(&dataset)?;

    let writer = OutputWriter::new(&output)?;
    result.write(&writer)?;

    if !keep_config {
        result
            .config
            .save(&params)
            .with_context(|| format!("failed to update {}", params.display()))?;
    }

    info!(
        clusters = result.realized_clusters,
        segments = result.segments.len(),
        output = %output.display(),
        "Clustering complete"
    );
    Ok(())
}

fn predict(
    centers: PathBuf,
    data: PathBuf,
    output: PathBuf,
    min_segment_length: usize,
    case: &str,
) -> Result<()> {
    let centroids = read_centroids(&centers)
        .with_context(|| format!("failed to load centroids from {}", centers.display()))?;
    let dataset = Dataset::load(&data)
        .with_context(|| format!("failed to load dataset from {}", data.display()))?;

    let prediction = Pipeline::predict(&centroids, &dataset, min_segment_length, case)?;
    prediction.write(&OutputWriter::new(&output)?)?;

    info!(
        segments = prediction.segments.len(),
        case = %prediction.events.case,
        "Prediction complete"
    );
    Ok(())
}
