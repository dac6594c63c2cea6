//! Source trait and its four variants.
//!
//! A `Source` knows how to fetch or read its raw payloads, how to validate one
//! of them, and which checkpoint key and policy govern it. Everything else
//! (checkpoint filtering, dedup, ledger bookkeeping) is shared and lives in
//! the runner, so adding a source never means copying the ingestion loop.

pub mod api;
pub mod coingecko;
pub mod coinpaprika;
pub mod csv_file;

pub use api::ApiSettings;
pub use coingecko::CoinGeckoSource;
pub use coinpaprika::CoinPaprikaSource;
pub use csv_file::{CsvSource, LegacyCsvSource};

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{MarketRecord, RawTable};
use crate::fetch::FetchError;
use crate::validate::ValidationError;

/// One payload as received, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Coin id for API entries, file path for CSV rows.
    pub origin: String,
    pub payload: Value,
}

/// Everything a single fetch or file read produced.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub records: Vec<RawRecord>,
    /// Observed header, for tabular sources.
    pub columns: Option<Vec<String>>,
    /// Merged into the checkpoint metadata when the run advances it.
    pub metadata: Value,
}

/// How a source's checkpoint gates later runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPolicy {
    /// Records observed at or before the mark are dropped.
    HighWaterMark,
    /// Any existing checkpoint means the whole input was already consumed.
    WholeFile,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// A market-data source pluggable into the generic ingestion loop.
pub trait Source: Send + Sync {
    /// Label recorded on the run ledger.
    fn name(&self) -> &str;

    /// Key of this source's checkpoint row.
    fn checkpoint_key(&self) -> &str;

    fn checkpoint_policy(&self) -> CheckpointPolicy;

    /// Audit table for raw payloads.
    fn raw_table(&self) -> RawTable;

    /// Declared columns, for drift detection on tabular sources.
    fn expected_columns(&self) -> Option<&'static [&'static str]> {
        None
    }

    fn load(&self) -> Result<SourceBatch, SourceError>;

    fn validate(&self, raw: &RawRecord, now: DateTime<Utc>) -> Result<MarketRecord, ValidationError>;
}
