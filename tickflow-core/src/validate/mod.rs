//! Per-source record validators.
//!
//! Each validator turns one raw payload (API JSON object or CSV row encoded as
//! a JSON object of header -> cell text) into a `MarketRecord`, or fails with a
//! `ValidationError`. Validation failures are per-record: the caller skips the
//! row and carries on.

pub mod coingecko;
pub mod coinpaprika;
pub mod csv_legacy;
pub mod csv_standard;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' is not a number: '{value}'")]
    InvalidNumber { field: String, value: String },

    #[error("field '{field}' is not a valid timestamp: '{value}'")]
    InvalidTimestamp { field: String, value: String },

    #[error("payload does not match schema: {0}")]
    Schema(String),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::Schema(err.to_string())
    }
}

pub(crate) fn as_object(raw: &Value) -> Result<&Map<String, Value>, ValidationError> {
    raw.as_object().ok_or(ValidationError::NotAnObject)
}

/// A required tabular cell. Absent, null and blank cells all count as missing.
pub(crate) fn required_text<'a>(
    row: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a str, ValidationError> {
    match row.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        _ => Err(ValidationError::MissingField(field.to_string())),
    }
}

/// A required numeric cell, coerced from text.
pub(crate) fn required_number(
    row: &Map<String, Value>,
    field: &str,
) -> Result<f64, ValidationError> {
    let text = required_text(row, field)?;
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ValidationError::InvalidNumber {
            field: field.to_string(),
            value: text.to_string(),
        }),
    }
}

/// Parse a timestamp in any of the layouts tabular exports commonly use.
///
/// Accepts RFC 3339, `YYYY-MM-DDThh:mm:ss[.f]`, `YYYY-MM-DD hh:mm:ss[.f]` and
/// bare dates. Naive values are taken as UTC.
pub(crate) fn parse_flexible_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
