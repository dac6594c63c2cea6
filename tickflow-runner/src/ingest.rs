//! The generic ingestion loop shared by every source.
//!
//! Per record: persist the raw payload, validate, drop anything at or before
//! the checkpoint, insert-if-absent, count new rows. The checkpoint is only
//! advanced after the loop, so a crash mid-loop leaves it untouched and the
//! next run replays the source, relying on the uniqueness key to no-op rows
//! that were already written.

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;

use tickflow_core::{
    CheckpointPolicy, InsertOutcome, MarketStore, SchemaDriftDetector, Source, SourceError,
    StoreError,
};

use crate::ledger::RunGuard;

pub const INJECTED_FAILURE: &str = "Simulated Failure Injection";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Injected(String),
}

impl IngestError {
    /// Fatal errors escape the per-source catch boundary; everything else
    /// becomes a `failed` run and the pipeline moves on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Injected(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestOptions {
    fail_after: Option<u64>,
}

impl IngestOptions {
    /// Raise a fatal error right after the `k`-th newly persisted record.
    pub fn fail_after(k: u64) -> Self {
        Self { fail_after: Some(k) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Completed,
    /// A whole-file source whose input was already consumed.
    Skipped,
}

pub fn ingest(
    source: &dyn Source,
    store: &dyn MarketStore,
    run: &mut RunGuard<'_>,
    options: &IngestOptions,
) -> Result<IngestOutcome, IngestError> {
    let key = source.checkpoint_key();
    let checkpoint = store.checkpoint(key)?;

    if source.checkpoint_policy() == CheckpointPolicy::WholeFile && checkpoint.is_some() {
        tracing::info!(source = key, "already processed, skipping");
        return Ok(IngestOutcome::Skipped);
    }
    let mark = checkpoint.map(|cp| cp.last_processed_at);

    let batch = source.load()?;

    if let (Some(expected), Some(observed)) = (source.expected_columns(), batch.columns.as_deref()) {
        let report = SchemaDriftDetector::default().detect(expected, observed);
        if report.drift_detected {
            tracing::warn!(
                source = key,
                missing = ?report.missing,
                extra = ?report.extra,
                "schema drift detected"
            );
            for notice in report.notices() {
                tracing::warn!(source = key, "{notice}");
                run.note(&notice);
            }
        }
    }

    if batch.records.is_empty() {
        tracing::info!(source = key, "no data");
    }

    for raw in &batch.records {
        store.insert_raw(source.raw_table(), &raw.origin, &raw.payload)?;

        let record = match source.validate(raw, Utc::now()) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(source = key, origin = %raw.origin, error = %e, "skipping invalid record");
                continue;
            }
        };

        if mark.is_some_and(|mark| record.recorded_at <= mark) {
            tracing::debug!(source = key, symbol = %record.symbol, "covered by checkpoint");
            continue;
        }

        match store.insert_record(&record)? {
            InsertOutcome::Inserted => run.record_persisted(),
            InsertOutcome::Duplicate => {
                tracing::debug!(source = key, symbol = %record.symbol, "already present");
                continue;
            }
        }

        if options.fail_after == Some(run.records_processed()) {
            return Err(IngestError::Injected(INJECTED_FAILURE.into()));
        }
    }

    let persisted = run.records_processed();
    if persisted > 0 {
        let mut metadata = match batch.metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        metadata.insert("records_persisted".into(), Value::from(persisted));
        store.upsert_checkpoint(key, Utc::now(), &Value::Object(metadata))?;
        tracing::info!(source = key, records = persisted, "checkpoint advanced");
    }

    Ok(IngestOutcome::Completed)
}
