//! Incremental loading of processed row-sets into a [`MarketStore`].
//!
//! [`MarketStore`]: crate::store::MarketStore

mod loader;

pub use loader::{coins_in_order, new_history_rows, IncrementalLoader, LoadError, LoadReport};
