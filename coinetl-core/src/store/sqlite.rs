//! SQLite-backed [`MarketStore`].

use super::{ts_from_millis, MarketStore, PricePoint, RowCounts, StoreError};
use crate::domain::{CoinRow, MarketHistoryRow, MarketSnapshotRow, SnapshotId};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS coins (
    coin_id TEXT PRIMARY KEY,
    symbol  TEXT NOT NULL,
    name    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS market_snapshots (
    snapshot_id  TEXT NOT NULL,
    coin_id      TEXT NOT NULL REFERENCES coins(coin_id),
    price        REAL,
    market_cap   REAL,
    volume_24h   REAL,
    rank         INTEGER,
    last_updated TEXT,
    PRIMARY KEY (snapshot_id, coin_id)
);

CREATE TABLE IF NOT EXISTS market_history (
    coin_id     TEXT NOT NULL REFERENCES coins(coin_id),
    ts          INTEGER NOT NULL,
    price       REAL,
    market_cap  REAL,
    volume_24h  REAL,
    snapshot_id TEXT NOT NULL,
    PRIMARY KEY (coin_id, ts)
);
";

/// Relational store in a single SQLite file.
///
/// History timestamps are stored as epoch milliseconds.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("sqlite schema ready");
        Ok(Self { conn })
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl MarketStore for SqliteStore {
    fn insert_coins(&mut self, rows: &[CoinRow]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO coins (coin_id, symbol, name) VALUES (?1, ?2, ?3)",
            )?;
            for row in rows {
                inserted += stmt.execute(params![row.coin_id, row.symbol, row.name])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn snapshot_exists(&self, snapshot_id: &SnapshotId) -> Result<bool, StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM market_snapshots WHERE snapshot_id = ?1)",
            [snapshot_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_snapshot_rows(&mut self, rows: &[MarketSnapshotRow]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO market_snapshots
                 (snapshot_id, coin_id, price, market_cap, volume_24h, rank, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                let last_updated = row
                    .last_updated
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true));
                inserted += stmt.execute(params![
                    row.snapshot_id.as_str(),
                    row.coin_id,
                    row.price,
                    row.market_cap,
                    row.volume_24h,
                    row.rank,
                    last_updated,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn max_history_ts(&self, coin_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let ms: Option<i64> = self.conn.query_row(
            "SELECT MAX(ts) FROM market_history WHERE coin_id = ?1",
            [coin_id],
            |row| row.get(0),
        )?;
        ms.map(|ms| ts_from_millis(coin_id, ms)).transpose()
    }

    fn insert_history_rows(&mut self, rows: &[MarketHistoryRow]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO market_history
                 (coin_id, ts, price, market_cap, volume_24h, snapshot_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                inserted += stmt.execute(params![
                    row.coin_id,
                    row.ts.timestamp_millis(),
                    row.price,
                    row.market_cap,
                    row.volume_24h,
                    row.snapshot_id.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn history_timestamps(&self, coin_id: &str) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT ts FROM market_history WHERE coin_id = ?1 ORDER BY ts")?;
        let millis = stmt
            .query_map([coin_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        millis.into_iter().map(|ms| ts_from_millis(coin_id, ms)).collect()
    }

    fn price_points(&self) -> Result<Vec<PricePoint>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT coin_id, ts, price FROM market_history
             WHERE price IS NOT NULL ORDER BY coin_id, ts",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, f64>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(coin_id, ms, price)| {
                let ts = ts_from_millis(&coin_id, ms)?;
                Ok(PricePoint { coin_id, ts, price })
            })
            .collect()
    }

    fn latest_snapshot_id(&self) -> Result<Option<SnapshotId>, StoreError> {
        let id: Option<String> = self
            .conn
            .query_row("SELECT MAX(snapshot_id) FROM market_snapshots", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(id.map(|id| SnapshotId::parse(&id)).transpose()?)
    }

    fn row_counts(&self) -> Result<RowCounts, StoreError> {
        Ok(RowCounts {
            coins: self.count("coins")?,
            snapshots: self.count("market_snapshots")?,
            history: self.count("market_history")?,
        })
    }
}
