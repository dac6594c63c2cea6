//! Well-formed CSV exports: `symbol, price, volume, timestamp, source`.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{parse_flexible_timestamp, required_number, required_text, ValidationError};
use crate::domain::MarketRecord;

/// Value of `MarketRecord::source` for this feed.
pub const SOURCE_LABEL: &str = "csv_upload";

/// Header a well-formed export is expected to carry.
pub const EXPECTED_COLUMNS: &[&str] = &["symbol", "price", "volume", "timestamp", "source"];

/// Requires all five columns, numeric `price` and `volume`, and a parseable
/// `timestamp`. The row's own `source` column is required but the normalized
/// record is always labelled `csv_upload`.
pub fn validate(raw: &Value, _now: DateTime<Utc>) -> Result<MarketRecord, ValidationError> {
    let row = super::as_object(raw)?;

    let symbol = required_text(row, "symbol")?.to_uppercase();
    let price = required_number(row, "price")?;
    let volume = required_number(row, "volume")?;
    let ts_text = required_text(row, "timestamp")?;
    let recorded_at =
        parse_flexible_timestamp(ts_text).ok_or_else(|| ValidationError::InvalidTimestamp {
            field: "timestamp".into(),
            value: ts_text.to_string(),
        })?;
    required_text(row, "source")?;

    Ok(MarketRecord {
        symbol,
        price_usd: price,
        market_cap: None,
        volume_24h: Some(volume),
        recorded_at,
        source: SOURCE_LABEL.to_string(),
    })
}
