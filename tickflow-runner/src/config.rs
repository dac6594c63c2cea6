//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. API endpoint fields left unset fall back to the built-in
//! endpoint defaults of that source.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tickflow_core::source::ApiSettings;
use tickflow_core::RetryPolicy;

/// Environment variable overriding `database`.
pub const DATABASE_ENV: &str = "TICKFLOW_DATABASE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite database path.
    pub database: String,
    /// Minutes a `running` ledger entry may stay open before a later pipeline
    /// start fails it as interrupted.
    pub stale_run_minutes: u64,
    pub coingecko: ApiSourceConfig,
    pub coinpaprika: ApiSourceConfig,
    pub files: FileConfig,
    pub retry: RetryConfig,
    pub anomaly: AnomalyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database: "tickflow.db".into(),
            stale_run_minutes: 60,
            coingecko: ApiSourceConfig::default(),
            coinpaprika: ApiSourceConfig::default(),
            files: FileConfig::default(),
            retry: RetryConfig::default(),
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TICKFLOW_DATABASE` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(db) = std::env::var(DATABASE_ENV).ok().filter(|v| !v.is_empty()) {
            self.database = db;
        }
        self
    }

    pub fn stale_run_after(&self) -> Duration {
        Duration::from_secs(self.stale_run_minutes.saturating_mul(60))
    }

    pub fn coingecko_settings(&self) -> ApiSettings {
        self.coingecko
            .settings(ApiSettings::coingecko_default(), "COINGECKO_API_KEY")
    }

    pub fn coinpaprika_settings(&self) -> ApiSettings {
        self.coinpaprika
            .settings(ApiSettings::coinpaprika_default(), "COINPAPRIKA_API_KEY")
    }
}

/// Per-API overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSourceConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub per_page: Option<u32>,
    pub calls_per_second: Option<f64>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            per_page: None,
            calls_per_second: None,
            api_key_env: None,
            timeout_secs: 30,
        }
    }
}

impl ApiSourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn settings(&self, defaults: ApiSettings, default_key_env: &str) -> ApiSettings {
        let key_env = self.api_key_env.as_deref().unwrap_or(default_key_env);
        ApiSettings {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            per_page: self.per_page.unwrap_or(defaults.per_page),
            calls_per_second: self.calls_per_second.unwrap_or(defaults.calls_per_second),
            api_key: std::env::var(key_env).ok().filter(|k| !k.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub csv: String,
    pub legacy_csv: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            csv: "crypto_data.csv".into(),
            legacy_csv: "legacy_crypto_data.csv".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2_000,
            multiplier: 2,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.multiplier,
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Absolute change in records processed, in percent, that counts as an anomaly.
    pub threshold_percent: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            threshold_percent: 20.0,
        }
    }
}
