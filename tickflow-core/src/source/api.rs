//! Shared plumbing for JSON API sources: one rate limiter and one retry
//! policy per source, wrapped around the fetch seam.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RawRecord;
use crate::fetch::{ApiRequest, FetchError, HttpFetch};
use crate::resilience::{RateLimiter, RetryPolicy};

/// Endpoint settings for one API source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    /// Top-N by market cap.
    pub per_page: u32,
    pub calls_per_second: f64,
    pub api_key: Option<String>,
}

impl ApiSettings {
    pub fn coingecko_default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".into(),
            per_page: 10,
            calls_per_second: 0.5,
            api_key: None,
        }
    }

    pub fn coinpaprika_default() -> Self {
        Self {
            base_url: "https://api.coinpaprika.com/v1".into(),
            per_page: 10,
            calls_per_second: 1.0,
            api_key: None,
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

pub(crate) struct ApiClient {
    fetcher: Arc<dyn HttpFetch>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl ApiClient {
    pub(crate) fn new(fetcher: Arc<dyn HttpFetch>, calls_per_second: f64, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            limiter: RateLimiter::new(calls_per_second),
            retry,
        }
    }

    /// Fetch a JSON array of entries. Every attempt, retries included, passes
    /// through the rate limiter first.
    pub(crate) fn fetch_entries(&self, label: &str, request: &ApiRequest) -> Result<Vec<RawRecord>, FetchError> {
        let payload = self.retry.run(label, || {
            self.limiter.acquire();
            self.fetcher.get_json(request)
        })?;

        let items = match payload {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(FetchError::Malformed(format!(
                    "expected a JSON array of entries, got {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(items
            .into_iter()
            .map(|payload| RawRecord {
                origin: payload
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                payload,
            })
            .collect())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
