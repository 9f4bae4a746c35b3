//! CoinETL CLI — snapshot ETL for CoinGecko market data.
//!
//! Commands:
//! - `extract`: fetch the ranked listing and per-coin history, write one round
//! - `transform`: reshape the latest (or a named) round into CSV row-sets
//! - `load`: merge the latest processed snapshot into SQLite
//! - `run`: extract, transform and load in order
//! - `status`: show the latest round, processed snapshot and store counts
//! - `summary`: per-coin price statistics over the stored history

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coinetl_core::domain::SnapshotId;
use coinetl_runner::{init_tracing, EtlConfig, LoadSummary, Pipeline, SummaryTable};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coinetl", version, about = "CoinETL: snapshot ETL for crypto market data")]
struct Cli {
    /// Path to a TOML config file. Defaults apply to anything it omits.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one extraction round against the API.
    Extract,
    /// Transform a complete round into processed row-sets.
    Transform {
        /// Snapshot id to transform (e.g. 20250924T131500123Z). Defaults to the latest round.
        #[arg(long)]
        snapshot: Option<String>,
    },
    /// Load the latest processed snapshot into the store.
    Load,
    /// Extract, transform and load one round.
    Run,
    /// Show pipeline state.
    Status,
    /// Per-coin price statistics from the store.
    Summary {
        /// Also write the table as CSV to this path.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EtlConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EtlConfig::default(),
    };
    let pipeline = Pipeline::new(config).context("invalid configuration")?;

    match cli.command {
        Commands::Extract => {
            let summary = pipeline.run_extract().context("extract failed")?;
            println!("{summary}");
        }
        Commands::Transform { snapshot } => {
            let snapshot = snapshot
                .as_deref()
                .map(SnapshotId::parse)
                .transpose()
                .context("invalid --snapshot")?;
            let summary = pipeline
                .run_transform(snapshot.as_ref())
                .context("transform failed")?;
            println!("{summary}");
        }
        Commands::Load => {
            let report = pipeline.run_load().context("load failed")?;
            println!("{}", LoadSummary(&report));
        }
        Commands::Run => {
            let summary = pipeline.run_all().context("pipeline run failed")?;
            println!("{}", summary.extract);
            println!("{}", summary.transform);
            println!("{}", LoadSummary(&summary.load));
        }
        Commands::Status => {
            let status = pipeline.status().context("reading status")?;
            println!("{status}");
        }
        Commands::Summary { out } => {
            let summaries = pipeline
                .run_summary(out.as_deref())
                .context("summary failed")?;
            println!("{}", SummaryTable(&summaries));
        }
    }

    Ok(())
}
