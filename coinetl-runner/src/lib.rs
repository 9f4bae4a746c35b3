//! CoinETL Runner — configuration, logging and stage orchestration.
//!
//! This crate builds on `coinetl-core` to provide:
//! - `EtlConfig`, loaded from TOML with per-field defaults
//! - `init_tracing`, the shared subscriber setup
//! - `Pipeline`, which wires extractor, transformer and loader from one config

pub mod config;
pub mod logging;
pub mod pipeline;

pub use config::{ApiConfig, ConfigError, EtlConfig, ExtractConfig, PathsConfig, RetryConfig, StoreConfig};
pub use logging::{init_tracing, DEFAULT_FILTER};
pub use pipeline::{
    ExtractSummary, LoadSummary, Pipeline, PipelineError, RunSummary, StatusReport,
    SummaryTable, TransformSummary,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_and_summaries_are_send_sync() {
        assert_send::<EtlConfig>();
        assert_sync::<EtlConfig>();
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
        assert_send::<StatusReport>();
        assert_sync::<StatusReport>();
    }
}
