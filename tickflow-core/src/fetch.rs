//! HTTP fetch seam for API sources.
//!
//! `HttpFetch` abstracts the transport so sources can be exercised against
//! scripted payloads in tests. `ReqwestFetcher` is the production
//! implementation on top of the blocking reqwest client.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::resilience::Transient;

/// Errors from a single fetch attempt, classified for retry.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("response body truncated: {0}")]
    TruncatedBody(String),

    #[error("HTTP {status} from server")]
    Http { status: u16 },

    #[error("HTTP {status} client error")]
    Client { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Connect(_)
                | FetchError::Timeout(_)
                | FetchError::TruncatedBody(_)
                | FetchError::Http { .. }
        )
    }
}

impl FetchError {
    /// Classify a non-success status: 5xx and 429 are server-side and retried,
    /// every other 4xx is the caller's fault and is not.
    pub fn from_status(status: u16) -> Self {
        if status >= 500 || status == 429 {
            FetchError::Http { status }
        } else {
            FetchError::Client { status }
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_body() || err.is_decode() {
            FetchError::TruncatedBody(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::from_status(status.as_u16())
        } else {
            FetchError::Connect(err.to_string())
        }
    }
}

/// A GET request against a JSON API.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Append one query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a header only when a value is present (e.g. an optional API key).
    pub fn header_opt(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }
}

/// Transport used by API sources. One call = one attempt; retry lives above.
pub trait HttpFetch: Send + Sync {
    fn get_json(&self, request: &ApiRequest) -> Result<Value, FetchError>;
}

/// Blocking reqwest transport.
pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tickflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Build(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    fn get_json(&self, request: &ApiRequest) -> Result<Value, FetchError> {
        let mut builder = self.client.get(&request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().map_err(FetchError::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16()));
        }

        let body = resp.text().map_err(FetchError::from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}
