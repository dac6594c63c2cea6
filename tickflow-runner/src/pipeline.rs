//! Pipeline orchestrator: runs sources in sequence, one ledger entry each.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use tickflow_core::source::{CoinGeckoSource, CoinPaprikaSource, CsvSource, LegacyCsvSource};
use tickflow_core::{FetchError, HttpFetch, MarketStore, RunStatus, Source, StoreError};

use crate::config::PipelineConfig;
use crate::ingest::{ingest, IngestError, IngestOptions, IngestOutcome};
use crate::ledger::{RunGuard, RunReport};

pub const INTERRUPTED_MESSAGE: &str = "interrupted before completion";

/// A `running` entry older than this is presumed to belong to a dead process.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Which sources a pipeline invocation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    CoinGecko,
    CoinPaprika,
    Csv,
    LegacyCsv,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::CoinGecko,
        SourceKind::CoinPaprika,
        SourceKind::Csv,
        SourceKind::LegacyCsv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::CoinGecko => "coingecko",
            SourceKind::CoinPaprika => "coinpaprika",
            SourceKind::Csv => "csv",
            SourceKind::LegacyCsv => "legacy",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!("unknown source '{s}' (expected coingecko, coinpaprika, csv or legacy)")
            })
    }
}

/// Build the configured sources, in pipeline order. API sources get their own
/// transport from `connect`, built with that source's timeout.
pub fn build_sources<F>(
    config: &PipelineConfig,
    only: Option<SourceKind>,
    connect: F,
) -> Result<Vec<Box<dyn Source>>, FetchError>
where
    F: Fn(Duration) -> Result<Arc<dyn HttpFetch>, FetchError>,
{
    let wanted = |kind: SourceKind| only.map_or(true, |o| o == kind);
    let retry = config.retry.policy();
    let mut sources: Vec<Box<dyn Source>> = Vec::new();

    if wanted(SourceKind::CoinGecko) && config.coingecko.enabled {
        let fetcher = connect(config.coingecko.timeout())?;
        sources.push(Box::new(CoinGeckoSource::new(
            config.coingecko_settings(),
            fetcher,
            retry.clone(),
        )));
    }
    if wanted(SourceKind::CoinPaprika) && config.coinpaprika.enabled {
        let fetcher = connect(config.coinpaprika.timeout())?;
        sources.push(Box::new(CoinPaprikaSource::new(
            config.coinpaprika_settings(),
            fetcher,
            retry.clone(),
        )));
    }
    if wanted(SourceKind::Csv) {
        sources.push(Box::new(CsvSource::new(config.files.csv.clone())));
    }
    if wanted(SourceKind::LegacyCsv) {
        sources.push(Box::new(LegacyCsvSource::new(config.files.legacy_csv.clone())));
    }
    Ok(sources)
}

pub struct Pipeline<'a> {
    store: &'a dyn MarketStore,
    options: IngestOptions,
    stale_after: Duration,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn MarketStore) -> Self {
        Self {
            store,
            options: IngestOptions::default(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// How long a `running` entry may stay open before recovery fails it.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.stale_after)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Fail ledger entries left `running` by a process that died mid-run.
    ///
    /// Only entries older than the staleness window are touched, so a
    /// pipeline running concurrently against the same store keeps its run.
    pub fn recover_interrupted(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let count = self.store.fail_interrupted_runs(
            self.stale_cutoff(now),
            now,
            INTERRUPTED_MESSAGE,
        )?;
        if count > 0 {
            tracing::warn!(count, "failed runs interrupted by an earlier crash");
        }
        Ok(count)
    }

    /// Ingest one source under its own ledger entry.
    ///
    /// Non-fatal errors become a `failed` report. A fatal error is returned to
    /// the caller; the entry is still finalized as `failed` on the way out.
    pub fn run_source(&self, source: &dyn Source) -> Result<RunReport, IngestError> {
        let mut run = RunGuard::start(self.store, source.name())?;

        match ingest(source, self.store, &mut run, &self.options) {
            Ok(IngestOutcome::Completed) => Ok(run.finish(RunStatus::Success)?),
            Ok(IngestOutcome::Skipped) => Ok(run.finish(RunStatus::Skipped)?),
            Err(err) if err.is_fatal() => {
                tracing::error!(source = source.name(), error = %err, "fatal ingestion error");
                run.set_error(&err);
                Err(err)
            }
            Err(err) => {
                tracing::error!(source = source.name(), error = %err, "ingestion failed");
                run.set_error(&err);
                Ok(run.finish(RunStatus::Failed)?)
            }
        }
    }

    /// Run every source in order. A failed source does not stop the others;
    /// a fatal error aborts the remaining sources.
    pub fn run_all(&self, sources: &[Box<dyn Source>]) -> Result<Vec<RunReport>, IngestError> {
        self.recover_interrupted()?;
        tracing::info!(sources = sources.len(), "pipeline started");

        let mut reports = Vec::with_capacity(sources.len());
        for source in sources {
            reports.push(self.run_source(source.as_ref())?);
        }

        let failed = reports
            .iter()
            .filter(|r| r.status == RunStatus::Failed)
            .count();
        tracing::info!(runs = reports.len(), failed, "pipeline completed");
        Ok(reports)
    }
}
