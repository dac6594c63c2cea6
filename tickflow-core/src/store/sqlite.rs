use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{InsertOutcome, MarketStore, StoreError};
use crate::domain::{Checkpoint, MarketRecord, RawTable, RunRecord, RunStatus};

pub const MAX_PAGE_SIZE: u32 = 100;

/// SQLite-backed store for normalized records, checkpoints and the run ledger.
pub struct SqliteStore {
    conn: Connection,
}

/// Filters for the paginated record listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub page: u32,
    pub limit: u32,
    pub symbol: Option<String>,
    pub source: Option<String>,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            symbol: None,
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub data: Vec<MarketRecord>,
    pub pagination: Pagination,
}

/// Fixed-width UTC text at full precision, so lexical order is chronological
/// order and distinct instants never share a key.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(idx: usize, err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn opt_ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(_) => ts_column(row, idx).map(Some),
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(2)?;
    let records: i64 = row.get(5)?;
    Ok(RunRecord {
        id: row.get(0)?,
        source: row.get(1)?,
        status: status.parse::<RunStatus>().map_err(|e| conversion_error(2, e))?,
        start_time: ts_column(row, 3)?,
        end_time: opt_ts_column(row, 4)?,
        records_processed: u64::try_from(records).unwrap_or(0),
        error_message: row.get(6)?,
    })
}

fn checkpoint_from_row(row: &Row<'_>) -> rusqlite::Result<Checkpoint> {
    let metadata: String = row.get(2)?;
    Ok(Checkpoint {
        source_name: row.get(0)?,
        last_processed_at: ts_column(row, 1)?,
        metadata: serde_json::from_str(&metadata).map_err(|e| conversion_error(2, e))?,
        updated_at: ts_column(row, 3)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MarketRecord> {
    Ok(MarketRecord {
        symbol: row.get(0)?,
        price_usd: row.get(1)?,
        market_cap: row.get(2)?,
        volume_24h: row.get(3)?,
        recorded_at: ts_column(row, 4)?,
        source: row.get(5)?,
    })
}

const RUN_COLUMNS: &str = "id, source, status, start_time, end_time, records_processed, error_message";

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS crypto_market_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                price_usd REAL NOT NULL,
                market_cap REAL,
                volume_24h REAL,
                recorded_at TEXT NOT NULL,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL,
                CONSTRAINT uq_crypto_market_data_entry UNIQUE (symbol, recorded_at, source)
            );
            CREATE TABLE IF NOT EXISTS etl_checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_name TEXT NOT NULL UNIQUE,
                last_processed_at TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS etl_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                records_processed INTEGER NOT NULL DEFAULT 0,
                error_message TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_market_symbol ON crypto_market_data(symbol);
            CREATE INDEX IF NOT EXISTS idx_market_recorded_at ON crypto_market_data(recorded_at);
            CREATE INDEX IF NOT EXISTS idx_runs_source ON etl_runs(source);
            CREATE INDEX IF NOT EXISTS idx_runs_status ON etl_runs(status);",
        )?;

        for table in RawTable::all() {
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    origin TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    ingested_at TEXT NOT NULL
                );",
                table.table_name()
            ))?;
        }
        Ok(())
    }

    /// Cheap liveness check.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// One page of normalized records, newest observation first.
    pub fn list_records(&self, query: &RecordQuery) -> Result<RecordPage, StoreError> {
        if query.page < 1 {
            return Err(StoreError::InvalidQuery("page must be >= 1".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&query.limit) {
            return Err(StoreError::InvalidQuery(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let symbol = query.symbol.as_deref().map(str::to_uppercase);
        let source = query.source.as_deref();
        let filter = "(?1 IS NULL OR symbol = ?1) AND (?2 IS NULL OR source = ?2)";

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM crypto_market_data WHERE {filter}"),
            params![symbol, source],
            |row| row.get(0),
        )?;

        let offset = i64::from(query.page - 1) * i64::from(query.limit);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT symbol, price_usd, market_cap, volume_24h, recorded_at, source
             FROM crypto_market_data WHERE {filter}
             ORDER BY recorded_at DESC, id DESC LIMIT ?3 OFFSET ?4"
        ))?;
        let data = stmt
            .query_map(params![symbol, source, i64::from(query.limit), offset], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordPage {
            data,
            pagination: Pagination {
                page: query.page,
                limit: query.limit,
                total: u64::try_from(total).unwrap_or(0),
            },
        })
    }

    /// Number of normalized records.
    pub fn record_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM crypto_market_data", [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Number of payloads audited in `table`.
    pub fn raw_count(&self, table: RawTable) -> Result<u64, StoreError> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.table_name()),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Most recent runs first, optionally for one source.
    pub fn recent_runs(&self, limit: usize, source: Option<&str>) -> Result<Vec<RunRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM etl_runs
             WHERE (?1 IS NULL OR source = ?1)
             ORDER BY start_time DESC, id DESC LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let runs = stmt
            .query_map(params![source, limit], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// Every checkpoint, ordered by source name.
    pub fn checkpoints(&self) -> Result<Vec<Checkpoint>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_name, last_processed_at, metadata, updated_at
             FROM etl_checkpoints ORDER BY source_name",
        )?;
        let rows = stmt
            .query_map([], checkpoint_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// When the newest normalized record was written, if any.
    pub fn latest_ingested_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let latest = self
            .conn
            .query_row("SELECT MAX(created_at) FROM crypto_market_data", [], |row| {
                opt_ts_column(row, 0)
            })?;
        Ok(latest)
    }
}

impl MarketStore for SqliteStore {
    fn insert_raw(&self, table: RawTable, origin: &str, payload: &Value) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (origin, payload, ingested_at) VALUES (?1, ?2, ?3)",
                table.table_name()
            ),
            params![origin, serde_json::to_string(payload)?, ts(Utc::now())],
        )?;
        Ok(())
    }

    fn insert_record(&self, record: &MarketRecord) -> Result<InsertOutcome, StoreError> {
        let changed = self.conn.execute(
            "INSERT INTO crypto_market_data
                (symbol, price_usd, market_cap, volume_24h, recorded_at, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (symbol, recorded_at, source) DO NOTHING",
            params![
                record.symbol,
                record.price_usd,
                record.market_cap,
                record.volume_24h,
                ts(record.recorded_at),
                record.source,
                ts(Utc::now()),
            ],
        )?;
        Ok(if changed == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        })
    }

    fn checkpoint(&self, key: &str) -> Result<Option<Checkpoint>, StoreError> {
        let cp = self
            .conn
            .query_row(
                "SELECT source_name, last_processed_at, metadata, updated_at
                 FROM etl_checkpoints WHERE source_name = ?1",
                params![key],
                checkpoint_from_row,
            )
            .optional()?;
        Ok(cp)
    }

    fn upsert_checkpoint(&self, key: &str, at: DateTime<Utc>, metadata: &Value) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO etl_checkpoints (source_name, last_processed_at, metadata, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (source_name) DO UPDATE SET
                last_processed_at = excluded.last_processed_at,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at",
            params![key, ts(at), serde_json::to_string(metadata)?, ts(Utc::now())],
        )?;
        Ok(())
    }

    fn start_run(&self, source: &str, started_at: DateTime<Utc>) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO etl_runs (source, status, start_time) VALUES (?1, 'running', ?2)",
            params![source, ts(started_at)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &self,
        id: i64,
        status: RunStatus,
        ended_at: DateTime<Utc>,
        records_processed: u64,
        error_message: Option<&str>,
    ) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE etl_runs
             SET status = ?2, end_time = ?3, records_processed = ?4, error_message = ?5
             WHERE id = ?1 AND status = 'running'",
            params![
                id,
                status.as_str(),
                ts(ended_at),
                i64::try_from(records_processed).unwrap_or(i64::MAX),
                error_message,
            ],
        )?;
        Ok(changed == 1)
    }

    fn runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM etl_runs ORDER BY start_time DESC, id DESC"
        ))?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn fail_interrupted_runs(
        &self,
        started_before: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        message: &str,
    ) -> Result<usize, StoreError> {
        let count = self.conn.execute(
            "UPDATE etl_runs
             SET status = 'failed', end_time = ?1, error_message = COALESCE(error_message, '') || ?2
             WHERE status = 'running' AND start_time < ?3",
            params![ts(ended_at), message, ts(started_before)],
        )?;
        Ok(count)
    }
}
