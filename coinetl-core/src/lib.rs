//! CoinETL Core — snapshot extraction, transformation and incremental loading.
//!
//! This crate contains the whole batch pipeline:
//! - Domain types (snapshot ids, manifests, coin / snapshot / history rows)
//! - Rate-limited fetch primitive and the CoinGecko client built on it
//! - Snapshot extractor writing raw payloads plus one manifest per round
//! - Pure transformer reshaping a round into tabular artifacts
//! - Persistent store trait (SQLite and in-memory implementations)
//! - Incremental loader merging processed artifacts into the store
//! - Per-coin price statistics read back from the store
//!
//! Stages communicate only through files on disk and the persistent store.

pub mod analysis;
pub mod artifact;
pub mod data;
pub mod domain;
pub mod extract;
pub mod load;
pub mod store;
pub mod transform;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: row and manifest types cross thread boundaries.
    ///
    /// The pipeline is sequential, but a scheduler wrapping it may hand results
    /// to another thread.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::SnapshotId>();
        require_sync::<domain::SnapshotId>();
        require_send::<domain::SnapshotManifest>();
        require_sync::<domain::SnapshotManifest>();
        require_send::<domain::CoinRow>();
        require_sync::<domain::CoinRow>();
        require_send::<domain::MarketSnapshotRow>();
        require_sync::<domain::MarketSnapshotRow>();
        require_send::<domain::MarketHistoryRow>();
        require_sync::<domain::MarketHistoryRow>();
        require_send::<load::LoadReport>();
        require_sync::<load::LoadReport>();
    }

    /// The store trait is object safe so the runner can hold `Box<dyn MarketStore>`.
    #[test]
    fn market_store_is_object_safe() {
        fn _check(store: &mut dyn store::MarketStore) -> Result<store::RowCounts, store::StoreError> {
            store.row_counts()
        }
        let mut mem = store::MemoryStore::new();
        let counts = _check(&mut mem).unwrap();
        assert_eq!(counts, store::RowCounts::default());
    }
}
