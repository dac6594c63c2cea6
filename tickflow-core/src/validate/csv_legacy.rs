//! Legacy CSV exports: `Ticker, LastPrice, Vol, RecordedDate`.
//!
//! `RecordedDate` is `DD-MM-YYYY HH:MM:SS`; anything else falls back to the
//! time of validation. Market cap is not available from this source.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use super::{required_number, required_text, ValidationError};
use crate::domain::MarketRecord;

/// Value of `MarketRecord::source` for this feed.
pub const SOURCE_LABEL: &str = "legacy_csv";

/// Header the legacy export is expected to carry.
pub const EXPECTED_COLUMNS: &[&str] = &["Ticker", "LastPrice", "Vol", "RecordedDate"];

const DATE_LAYOUT: &str = "%d-%m-%Y %H:%M:%S";

/// Requires all four legacy columns with numeric `LastPrice` and `Vol`.
pub fn validate(raw: &Value, now: DateTime<Utc>) -> Result<MarketRecord, ValidationError> {
    let row = super::as_object(raw)?;

    let symbol = required_text(row, "Ticker")?.to_uppercase();
    let price = required_number(row, "LastPrice")?;
    let volume = required_number(row, "Vol")?;
    let recorded_at = NaiveDateTime::parse_from_str(required_text(row, "RecordedDate")?, DATE_LAYOUT)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);

    Ok(MarketRecord {
        symbol,
        price_usd: price,
        market_cap: None,
        volume_24h: Some(volume),
        recorded_at,
        source: SOURCE_LABEL.to_string(),
    })
}
