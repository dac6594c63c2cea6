//! Run ledger guard.
//!
//! `RunGuard` opens a `running` ledger entry and guarantees it is finalized
//! exactly once: explicitly through `finish`, or as `failed` when the guard is
//! dropped on an early return or a propagating error.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tickflow_core::{MarketStore, RunStatus, StoreError};

/// Summary of a finalized run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: i64,
    pub source: String,
    pub status: RunStatus,
    pub records_processed: u64,
    pub error_message: Option<String>,
}

pub struct RunGuard<'a> {
    store: &'a dyn MarketStore,
    id: i64,
    source: String,
    started_at: DateTime<Utc>,
    records_processed: u64,
    notices: String,
    error: Option<String>,
    finished: bool,
}

impl<'a> RunGuard<'a> {
    pub fn start(store: &'a dyn MarketStore, source: &str) -> Result<Self, StoreError> {
        let started_at = Utc::now();
        let id = store.start_run(source, started_at)?;
        tracing::info!(run_id = id, source, "run started");
        Ok(Self {
            store,
            id,
            source: source.to_string(),
            started_at,
            records_processed: 0,
            notices: String::new(),
            error: None,
            finished: false,
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append a warning to the run's error text. Notices are kept even when
    /// the run succeeds.
    pub fn note(&mut self, notice: &str) {
        self.notices.push_str(notice);
        self.notices.push_str("; ");
    }

    pub fn record_persisted(&mut self) {
        self.records_processed += 1;
    }

    pub fn records_processed(&self) -> u64 {
        self.records_processed
    }

    /// Failure text recorded when the run is finalized.
    pub fn set_error(&mut self, err: impl Display) {
        self.error = Some(err.to_string());
    }

    fn error_message(&self) -> Option<String> {
        match (&self.error, self.notices.is_empty()) {
            (None, true) => None,
            (None, false) => Some(self.notices.clone()),
            (Some(err), _) => Some(format!("{}{}", self.notices, err)),
        }
    }

    /// Returns false if the entry was no longer `running`.
    fn finalize(&mut self, status: RunStatus) -> Result<bool, StoreError> {
        self.finished = true;
        let message = self.error_message();
        self.store.finish_run(
            self.id,
            status,
            Utc::now(),
            self.records_processed,
            message.as_deref(),
        )
    }

    /// Finalize with a terminal status.
    ///
    /// Fails with `StoreError::AlreadyFinalized` if another writer closed the
    /// entry first; the stored row then does not describe this run's outcome.
    pub fn finish(mut self, status: RunStatus) -> Result<RunReport, StoreError> {
        if !self.finalize(status)? {
            tracing::error!(
                run_id = self.id,
                source = %self.source,
                records = self.records_processed,
                "run was finalized by another writer"
            );
            return Err(StoreError::AlreadyFinalized(self.id));
        }
        tracing::info!(
            run_id = self.id,
            source = %self.source,
            status = %status,
            records = self.records_processed,
            "run finished"
        );
        Ok(RunReport {
            run_id: self.id,
            source: self.source.clone(),
            status,
            records_processed: self.records_processed,
            error_message: self.error_message(),
        })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.error.is_none() {
            self.error = Some("run aborted before completion".into());
        }
        tracing::error!(run_id = self.id, source = %self.source, "run aborted, marking failed");
        match self.finalize(RunStatus::Failed) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(run_id = self.id, "run was already finalized"),
            Err(e) => tracing::error!(run_id = self.id, error = %e, "failed to finalize run"),
        }
    }
}
