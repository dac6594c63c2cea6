//! Persistence contract for the pipeline and its SQLite implementation.
//!
//! Deduplication is a return value, not an error: `insert_record` reports
//! `InsertOutcome::Duplicate` when the `(symbol, recorded_at, source)` key is
//! already present. The uniqueness constraint is enforced by the store itself,
//! never by a read-then-insert check.

mod sqlite;

pub use sqlite::{Pagination, RecordPage, RecordQuery, SqliteStore, MAX_PAGE_SIZE};

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Checkpoint, MarketRecord, RawTable, RunRecord, RunStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("metadata encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("run {0} was already finalized by another writer")]
    AlreadyFinalized(i64),
}

/// Outcome of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The idempotency key already existed; nothing was written.
    Duplicate,
}

pub trait MarketStore {
    /// Append a payload verbatim to an audit table.
    fn insert_raw(&self, table: RawTable, origin: &str, payload: &Value) -> Result<(), StoreError>;

    fn insert_record(&self, record: &MarketRecord) -> Result<InsertOutcome, StoreError>;

    fn checkpoint(&self, key: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Create the checkpoint, or advance an existing one in place.
    fn upsert_checkpoint(&self, key: &str, at: DateTime<Utc>, metadata: &Value) -> Result<(), StoreError>;

    /// Open a ledger entry in `running` state; returns its id.
    fn start_run(&self, source: &str, started_at: DateTime<Utc>) -> Result<i64, StoreError>;

    /// Finalize a `running` entry. Returns false if it was already finalized.
    fn finish_run(
        &self,
        id: i64,
        status: RunStatus,
        ended_at: DateTime<Utc>,
        records_processed: u64,
        error_message: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// The whole ledger, most recent first.
    fn runs(&self) -> Result<Vec<RunRecord>, StoreError>;

    /// Fail entries still `running` that started before `started_before`,
    /// appending `message` to their error text. Younger entries may belong to
    /// a pipeline that is still alive and are left alone.
    fn fail_interrupted_runs(
        &self,
        started_before: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        message: &str,
    ) -> Result<usize, StoreError>;
}
