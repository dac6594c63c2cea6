//! Domain types shared by sources, the store, and the runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical cross-source market observation.
///
/// `(symbol, recorded_at, source)` is unique in the store; it is the
/// idempotency key of the whole pipeline. Records are never mutated or
/// deleted once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    /// Upper-case ticker.
    pub symbol: String,
    pub price_usd: f64,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    /// Semantic "as-of" time of the observation.
    pub recorded_at: DateTime<Utc>,
    /// Origin pipeline label, e.g. `coingecko_api` or `legacy_csv`.
    pub source: String,
}

/// Per-source high-water mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub source_name: String,
    pub last_processed_at: DateTime<Utc>,
    /// Opaque metadata (file hash, row count, records persisted).
    pub metadata: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle of a run ledger entry. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Skipped,
}

impl RunStatus {
    /// Lowercase label as stored in the ledger's `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// True for every state a finalized run can end in.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// One pipeline execution attempt for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    /// Source label: the API source name, or the literal file path.
    pub source: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Normalized records actually persisted by this run.
    pub records_processed: u64,
    /// Failure text, plus any accumulated warnings such as drift notices.
    pub error_message: Option<String>,
}

impl RunRecord {
    /// Wall-clock duration in milliseconds, once the run has been finalized.
    pub fn duration_ms(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_microseconds().unwrap_or(0) as f64 / 1000.0)
    }
}

/// Audit tables holding payloads verbatim, one per source kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawTable {
    CoinGecko,
    CoinPaprika,
    CsvUpload,
    LegacyUpload,
}

impl RawTable {
    /// SQL table holding this source kind's verbatim payloads.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::CoinGecko => "raw_coingecko",
            Self::CoinPaprika => "raw_coinpaprika",
            Self::CsvUpload => "raw_csv_uploads",
            Self::LegacyUpload => "raw_legacy_uploads",
        }
    }

    /// Every audit table, in migration order.
    pub fn all() -> &'static [RawTable] {
        &[
            Self::CoinGecko,
            Self::CoinPaprika,
            Self::CsvUpload,
            Self::LegacyUpload,
        ]
    }
}
