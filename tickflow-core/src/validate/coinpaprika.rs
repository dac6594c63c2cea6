//! CoinPaprika `/tickers` entries.
//!
//! Price, volume and market cap live in a nested per-currency quote map and
//! are read leniently: any missing or non-numeric value becomes 0.0.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::ValidationError;
use crate::domain::MarketRecord;

/// Value of `MarketRecord::source` for this feed.
pub const SOURCE_LABEL: &str = "coinpaprika_api";

const TIMESTAMP_LAYOUT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Deserialize)]
struct Entry {
    #[allow(dead_code)]
    id: String,
    symbol: String,
    #[allow(dead_code)]
    name: String,
    quotes: Map<String, Value>,
    #[serde(default)]
    last_updated: Option<String>,
}

impl Entry {
    fn usd(&self, key: &str) -> f64 {
        self.quotes
            .get("USD")
            .and_then(|quote| quote.get(key))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }

    fn timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.last_updated
            .as_deref()
            .and_then(|text| NaiveDateTime::parse_from_str(text, TIMESTAMP_LAYOUT).ok())
            .map(|naive| naive.and_utc())
            .unwrap_or(now)
    }
}

/// Requires `id`, `symbol`, `name` and a `quotes` object. USD price, volume
/// and market cap default to 0.0; `last_updated` must be
/// `YYYY-MM-DDThh:mm:ssZ` or the record is stamped with `now`.
pub fn validate(raw: &Value, now: DateTime<Utc>) -> Result<MarketRecord, ValidationError> {
    super::as_object(raw)?;
    let entry: Entry = serde_json::from_value(raw.clone())?;

    Ok(MarketRecord {
        symbol: entry.symbol.to_uppercase(),
        price_usd: entry.usd("price"),
        market_cap: Some(entry.usd("market_cap")),
        volume_24h: Some(entry.usd("volume_24h")),
        recorded_at: entry.timestamp(now),
        source: SOURCE_LABEL.to_string(),
    })
}
