//! TickFlow Core: market records, sources, validators, drift detection, resilience, store.
//!
//! This crate contains the building blocks of the ingestion pipeline:
//! - Domain types (normalized market records, checkpoints, run ledger rows)
//! - Rate limiting and bounded exponential-backoff retry for network sources
//! - Schema drift detection for tabular sources
//! - Per-source record validators (CoinGecko, CoinPaprika, standard CSV, legacy CSV)
//! - The `Source` trait and its four variants
//! - The `MarketStore` contract and its SQLite implementation
//!
//! Orchestration (run ledger finalize, checkpoint advancement, stats) lives in
//! `tickflow-runner`.

pub mod domain;
pub mod drift;
pub mod fetch;
pub mod resilience;
pub mod source;
pub mod store;
pub mod validate;

pub use domain::{Checkpoint, MarketRecord, RawTable, RunRecord, RunStatus};
pub use drift::{ColumnMatch, DriftReport, SchemaDriftDetector};
pub use fetch::{ApiRequest, FetchError, HttpFetch, ReqwestFetcher};
pub use resilience::{RateLimiter, RetryPolicy, Transient};
pub use source::{CheckpointPolicy, RawRecord, Source, SourceBatch, SourceError};
pub use store::{InsertOutcome, MarketStore, SqliteStore, StoreError};
pub use validate::ValidationError;
