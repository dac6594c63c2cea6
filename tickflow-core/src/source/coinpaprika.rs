use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::api::{ApiClient, ApiSettings};
use super::{CheckpointPolicy, RawRecord, Source, SourceBatch, SourceError};
use crate::domain::{MarketRecord, RawTable};
use crate::fetch::{ApiRequest, HttpFetch};
use crate::resilience::RetryPolicy;
use crate::validate::{coinpaprika, ValidationError};

/// Top tickers from CoinPaprika `/tickers`.
pub struct CoinPaprikaSource {
    settings: ApiSettings,
    client: ApiClient,
}

impl CoinPaprikaSource {
    pub fn new(settings: ApiSettings, fetcher: Arc<dyn HttpFetch>, retry: RetryPolicy) -> Self {
        let client = ApiClient::new(fetcher, settings.calls_per_second, retry);
        Self { settings, client }
    }

    /// The `/tickers` request, limited to the configured page size.
    pub fn request(&self) -> ApiRequest {
        ApiRequest::get(self.settings.endpoint("tickers"))
            .query("limit", self.settings.per_page)
            .header_opt("Authorization", self.settings.api_key.as_deref())
    }
}

impl Source for CoinPaprikaSource {
    fn name(&self) -> &str {
        coinpaprika::SOURCE_LABEL
    }

    fn checkpoint_key(&self) -> &str {
        coinpaprika::SOURCE_LABEL
    }

    fn checkpoint_policy(&self) -> CheckpointPolicy {
        CheckpointPolicy::HighWaterMark
    }

    fn raw_table(&self) -> RawTable {
        RawTable::CoinPaprika
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
        coinpaprika::validate(&raw.payload, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use serde_json::Value;

    struct Fixed(Value);

    impl HttpFetch for Fixed {
        fn get_json(&self, _request: &ApiRequest) -> Result<Value, FetchError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn request_uses_limit_and_authorization() {
        let mut settings = ApiSettings::coinpaprika_default();
        settings.api_key = Some("key".into());
        let src = CoinPaprikaSource::new(settings, Arc::new(Fixed(json!([]))), RetryPolicy::immediate(1));
        let req = src.request();
        assert_eq!(req.url, "https://api.coinpaprika.com/v1/tickers");
        assert_eq!(req.query, vec![("limit".to_string(), "10".to_string())]);
        assert_eq!(req.headers, vec![("Authorization".to_string(), "key".to_string())]);
    }

    #[test]
    fn empty_payload_loads_nothing() {
        let src = CoinPaprikaSource::new(
            ApiSettings::coinpaprika_default(),
            Arc::new(Fixed(json!([]))),
            RetryPolicy::immediate(1),
        );
        let batch = src.load().unwrap();
        assert!(batch.records.is_empty());
        assert!(batch.columns.is_none());
    }
}
