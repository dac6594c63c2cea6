use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::api::{ApiClient, ApiSettings};
use super::{CheckpointPolicy, RawRecord, Source, SourceBatch, SourceError};
use crate::domain::{MarketRecord, RawTable};
use crate::fetch::{ApiRequest, HttpFetch};
use crate::resilience::RetryPolicy;
use crate::validate::{coingecko, ValidationError};

/// Top coins by market cap from CoinGecko `/coins/markets`.
pub struct CoinGeckoSource {
    settings: ApiSettings,
    client: ApiClient,
}

impl CoinGeckoSource {
    pub fn new(settings: ApiSettings, fetcher: Arc<dyn HttpFetch>, retry: RetryPolicy) -> Self {
        let client = ApiClient::new(fetcher, settings.calls_per_second, retry);
        Self { settings, client }
    }

    /// The `/coins/markets` request for one page of top coins.
    pub fn request(&self) -> ApiRequest {
        ApiRequest::get(self.settings.endpoint("coins/markets"))
            .query("vs_currency", "usd")
            .query("order", "market_cap_desc")
            .query("per_page", self.settings.per_page)
            .query("page", 1)
            .query("sparkline", "false")
            .header_opt("x-cg-demo-api-key", self.settings.api_key.as_deref())
    }
}

impl Source for CoinGeckoSource {
    fn name(&self) -> &str {
        coingecko::SOURCE_LABEL
    }

    fn checkpoint_key(&self) -> &str {
        coingecko::SOURCE_LABEL
    }

    fn checkpoint_policy(&self) -> CheckpointPolicy {
        CheckpointPolicy::HighWaterMark
    }

    fn raw_table(&self) -> RawTable {
        RawTable::CoinGecko
    }

    fn load(&self) -> Result<SourceBatch, SourceError> {
        let records = self.client.fetch_entries(self.name(), &self.request())?;
        tracing::info!(source = self.name(), count = records.len(), "fetched entries");
        Ok(SourceBatch {
            records,
            columns: None,
            metadata: json!({}),
        })
    }

    fn validate(&self, raw: &RawRecord, now: DateTime<Utc>) -> Result<MarketRecord, ValidationError> {
        coingecko::validate(&raw.payload, now)
    }
}
