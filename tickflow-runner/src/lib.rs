//! TickFlow Runner: ingestion orchestration, run ledger, stats.
//!
//! This crate builds on `tickflow-core` to provide:
//! - The generic ingestion loop shared by every source
//! - A run ledger guard that finalizes every run exactly once
//! - The pipeline orchestrator and stale-run recovery
//! - Aggregate run stats and cross-run volume anomaly comparison
//! - TOML configuration

pub mod config;
pub mod ingest;
pub mod ledger;
pub mod pipeline;
pub mod stats;

pub use config::{ConfigError, PipelineConfig};
pub use ingest::{ingest, IngestError, IngestOptions, IngestOutcome, INJECTED_FAILURE};
pub use ledger::{RunGuard, RunReport};
pub use pipeline::{
    build_sources, Pipeline, SourceKind, DEFAULT_STALE_AFTER, INTERRUPTED_MESSAGE,
};
pub use stats::{compare_runs, compute_stats, ComparisonResponse, StatsReport};
