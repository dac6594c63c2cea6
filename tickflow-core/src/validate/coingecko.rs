//! CoinGecko `/coins/markets` entries.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::ValidationError;
use crate::domain::MarketRecord;

/// Value of `MarketRecord::source` for this feed.
pub const SOURCE_LABEL: &str = "coingecko_api";

#[derive(Debug, Deserialize)]
struct Entry {
    #[allow(dead_code)]
    id: String,
    symbol: String,
    #[allow(dead_code)]
    name: String,
    current_price: f64,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    total_volume: Option<f64>,
    #[serde(default)]
    last_updated: Option<String>,
}

/// Requires `id`, `symbol`, `name` and a numeric `current_price`. An absent
/// `last_updated` means "now"; a present but unparseable one is rejected.
pub fn validate(raw: &Value, now: DateTime<Utc>) -> Result<MarketRecord, ValidationError> {
    super::as_object(raw)?;
    let entry: Entry = serde_json::from_value(raw.clone())?;

    let recorded_at = match entry.last_updated.as_deref() {
        None => now,
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ValidationError::InvalidTimestamp {
                field: "last_updated".into(),
                value: text.to_string(),
            })?,
    };

    Ok(MarketRecord {
        symbol: entry.symbol.to_uppercase(),
        price_usd: entry.current_price,
        market_cap: entry.market_cap,
        volume_24h: entry.total_volume,
        recorded_at,
        source: SOURCE_LABEL.to_string(),
    })
}
