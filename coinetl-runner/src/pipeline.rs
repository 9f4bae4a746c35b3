//! Stage orchestration — builds every component from one [`EtlConfig`].
//!
//! Each stage can be run on its own (`run_extract`, `run_transform`,
//! `run_load`) or in order through `run_all`. Stages share nothing but the
//! artifact directories and the store named in the config.

use crate::config::{ConfigError, EtlConfig};
use coinetl_core::analysis::{self, CoinSummary};
use coinetl_core::artifact::ArtifactError;
use coinetl_core::data::{
    CoinGeckoClient, FetchError, MarketDataSource, RateLimitedFetcher, ReqwestTransport, Sleeper,
};
use coinetl_core::domain::{SnapshotId, SnapshotManifest};
use coinetl_core::extract::{ExtractError, LatestRound, RawArtifactStore, SnapshotExtractor};
use coinetl_core::load::{IncrementalLoader, LoadError, LoadReport};
use coinetl_core::store::{MarketStore, RowCounts, SqliteStore, StoreError};
use coinetl_core::transform::{
    ProcessedPointer, ProcessedStore, SnapshotTransformer, TransformError, TransformOutput,
};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors from any pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("http client error: {0}")]
    Http(#[from] FetchError),
    #[error("extract failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),
    #[error("load failed: {0}")]
    Load(#[from] LoadError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

// ── Summaries ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractSummary {
    pub snapshot_id: SnapshotId,
    pub coins: Vec<String>,
    pub files: usize,
}

impl From<&SnapshotManifest> for ExtractSummary {
    fn from(manifest: &SnapshotManifest) -> Self {
        Self {
            snapshot_id: manifest.snapshot_id.clone(),
            coins: manifest.coins.clone(),
            files: manifest.files.len(),
        }
    }
}

impl fmt::Display for ExtractSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extract {}: {} coins ({}), {} raw files",
            self.snapshot_id,
            self.coins.len(),
            self.coins.join(", "),
            self.files
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSummary {
    pub snapshot_id: SnapshotId,
    pub snapshot_rows: usize,
    pub history_rows: usize,
    pub coin_rows: usize,
}

impl From<&TransformOutput> for TransformSummary {
    fn from(out: &TransformOutput) -> Self {
        Self {
            snapshot_id: out.snapshot_id.clone(),
            snapshot_rows: out.snapshots.len(),
            history_rows: out.history.len(),
            coin_rows: out.coins.len(),
        }
    }
}

impl fmt::Display for TransformSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transform {}: {} snapshot rows, {} history rows, {} coins in reference",
            self.snapshot_id, self.snapshot_rows, self.history_rows, self.coin_rows
        )
    }
}

/// Display wrapper for a [`LoadReport`].
pub struct LoadSummary<'a>(pub &'a LoadReport);

impl fmt::Display for LoadSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        let sid = r
            .snapshot_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        writeln!(f, "load {sid}:")?;
        writeln!(f, "  coins inserted:            {}", r.coins_inserted)?;
        if r.snapshot_skipped {
            writeln!(f, "  market_snapshots:          skipped (already loaded)")?;
        } else {
            writeln!(f, "  market_snapshots inserted: {}", r.snapshot_rows_inserted)?;
        }
        write!(f, "  market_history inserted:   {}", r.history_inserted)?;
        for (coin, n) in &r.history_by_coin {
            write!(f, "\n    {coin:<20} {n}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub extract: ExtractSummary,
    pub transform: TransformSummary,
    pub load: LoadReport,
}

/// Snapshot of pipeline state for the `status` command.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub latest_round: Option<LatestRound>,
    pub latest_processed: Option<ProcessedPointer>,
    /// `None` when the store file does not exist yet.
    pub store_counts: Option<RowCounts>,
    pub latest_loaded: Option<SnapshotId>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.latest_round {
            Some(round) => writeln!(
                f,
                "latest raw round:       {} ({}, completed {})",
                round.snapshot_id, round.manifest, round.completed_at
            )?,
            None => writeln!(f, "latest raw round:       none")?,
        }
        match &self.latest_processed {
            Some(p) => writeln!(
                f,
                "latest processed:       {} ({} snapshot rows, {} history rows)",
                p.snapshot_id, p.snapshot_rows, p.history_rows
            )?,
            None => writeln!(f, "latest processed:       none")?,
        }
        match (&self.store_counts, &self.latest_loaded) {
            (Some(c), loaded) => {
                let loaded = loaded
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "none".to_string());
                write!(
                    f,
                    "store:                  coins={} market_snapshots={} market_history={} (latest snapshot {loaded})",
                    c.coins, c.snapshots, c.history
                )
            }
            (None, _) => write!(f, "store:                  not created"),
        }
    }
}

/// Display wrapper printing one line per coin summary.
pub struct SummaryTable<'a>(pub &'a [CoinSummary]);

impl fmt::Display for SummaryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: Option<f64>| v.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:<20} {:>6} {:>14} {:>14} {:>14} {:>14} {:>10} {:>10}  range",
            "coin", "n", "avg", "stddev", "min", "max", "growth%", "cv%"
        )?;
        for s in self.0 {
            write!(
                f,
                "\n{:<20} {:>6} {:>14.4} {:>14} {:>14.4} {:>14.4} {:>10} {:>10}  {} .. {}",
                s.coin_id,
                s.observations,
                s.avg_price,
                opt(s.stddev),
                s.min_price,
                s.max_price,
                opt(s.pct_growth),
                opt(s.rel_volatility_pct),
                s.start.format("%Y-%m-%d %H:%M"),
                s.end.format("%Y-%m-%d %H:%M"),
            )?;
        }
        Ok(())
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────

pub struct Pipeline {
    config: EtlConfig,
}

impl Pipeline {
    /// Validate `config` and build a pipeline around it.
    pub fn new(config: EtlConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn raw_store(&self) -> RawArtifactStore {
        RawArtifactStore::new(self.config.paths.raw_dir.clone())
    }

    pub fn processed_store(&self) -> ProcessedStore {
        ProcessedStore::new(self.config.paths.processed_dir.clone())
    }

    pub fn open_store(&self) -> Result<SqliteStore, StoreError> {
        SqliteStore::open(&self.config.store.path)
    }

    /// CoinGecko client over a blocking reqwest transport.
    pub fn coingecko_client(&self) -> Result<CoinGeckoClient<ReqwestTransport>, PipelineError> {
        let transport = ReqwestTransport::new(self.config.request_timeout(), &self.config.api.user_agent)?;
        let fetcher = RateLimitedFetcher::new(transport, self.config.retry_policy());
        Ok(CoinGeckoClient::new(fetcher, self.config.market_settings()))
    }

    /// Extract one round from CoinGecko.
    pub fn run_extract(&self) -> Result<ExtractSummary, PipelineError> {
        let client = self.coingecko_client()?;
        let extractor = SnapshotExtractor::new(client, self.raw_store(), self.config.extract_settings());
        let manifest = extractor.run()?;
        Ok(ExtractSummary::from(&manifest))
    }

    /// Extract one round from an arbitrary source, pausing through `sleeper`.
    pub fn run_extract_with<D: MarketDataSource, S: Sleeper>(
        &self,
        source: D,
        sleeper: S,
    ) -> Result<ExtractSummary, PipelineError> {
        info!(source = source.name(), "extracting");
        let extractor = SnapshotExtractor::with_sleeper(
            source,
            self.raw_store(),
            self.config.extract_settings(),
            sleeper,
        );
        let manifest = extractor.run()?;
        Ok(ExtractSummary::from(&manifest))
    }

    /// Transform the latest round, or the named one.
    pub fn run_transform(&self, snapshot_id: Option<&SnapshotId>) -> Result<TransformSummary, PipelineError> {
        let transformer = SnapshotTransformer::new(self.raw_store(), self.processed_store());
        let out = match snapshot_id {
            Some(id) => transformer.transform_snapshot(id)?,
            None => transformer.transform_latest()?,
        };
        Ok(TransformSummary::from(&out))
    }

    /// Load the latest processed snapshot into the configured SQLite store.
    pub fn run_load(&self) -> Result<LoadReport, PipelineError> {
        let mut store = self.open_store()?;
        self.run_load_into(&mut store)
    }

    pub fn run_load_into(&self, store: &mut dyn MarketStore) -> Result<LoadReport, PipelineError> {
        let loader = IncrementalLoader::new(self.processed_store());
        Ok(loader.load_latest(store)?)
    }

    /// Extract, transform and load, stopping at the first failing stage.
    pub fn run_all(&self) -> Result<RunSummary, PipelineError> {
        let extract = self.run_extract()?;
        self.finish_round(extract, &mut self.open_store()?)
    }

    pub fn run_all_with<D: MarketDataSource, S: Sleeper>(
        &self,
        source: D,
        sleeper: S,
        store: &mut dyn MarketStore,
    ) -> Result<RunSummary, PipelineError> {
        let extract = self.run_extract_with(source, sleeper)?;
        self.finish_round(extract, store)
    }

    fn finish_round(
        &self,
        extract: ExtractSummary,
        store: &mut dyn MarketStore,
    ) -> Result<RunSummary, PipelineError> {
        let transform = self.run_transform(Some(&extract.snapshot_id))?;
        let load = self.run_load_into(store)?;
        Ok(RunSummary {
            extract,
            transform,
            load,
        })
    }

    /// Per-coin price statistics from the configured store, optionally written as CSV.
    pub fn run_summary(&self, out: Option<&Path>) -> Result<Vec<CoinSummary>, PipelineError> {
        let store = self.open_store()?;
        self.run_summary_from(&store, out)
    }

    pub fn run_summary_from(
        &self,
        store: &dyn MarketStore,
        out: Option<&Path>,
    ) -> Result<Vec<CoinSummary>, PipelineError> {
        let summaries = analysis::summarize_store(store)?;
        if let Some(path) = out {
            analysis::write_summary_csv(path, &summaries)?;
            info!(path = %path.display(), coins = summaries.len(), "summary written");
        }
        Ok(summaries)
    }

    /// Read-only view of the latest round, processed snapshot and store.
    pub fn status(&self) -> Result<StatusReport, PipelineError> {
        let latest_round = self.raw_store().read_latest()?;
        let latest_processed = self.processed_store().read_latest_pointer()?;
        let (store_counts, latest_loaded) = if self.config.store.path.exists() {
            let store = self.open_store()?;
            (Some(store.row_counts()?), store.latest_snapshot_id()?)
        } else {
            (None, None)
        };
        Ok(StatusReport {
            latest_round,
            latest_processed,
            store_counts,
            latest_loaded,
        })
    }
}
