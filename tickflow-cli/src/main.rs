//! TickFlow CLI: trigger ingestion runs and inspect what they produced.
//!
//! Commands:
//! - `run`: ingest every configured source (or one, with `--source`)
//! - `stats`: aggregate run metrics and the latest run per source
//! - `compare`: volume anomalies between the last two successful runs
//! - `runs`: recent run ledger entries
//! - `data`: paginated normalized records
//! - `checkpoints`: per-source high-water marks
//! - `health`: store reachability and last ingestion time
//! - `generate`: write synthetic standard and legacy CSV files

mod generate;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;

use tickflow_core::store::RecordQuery;
use tickflow_core::{HttpFetch, MarketStore, ReqwestFetcher, RunStatus, SqliteStore};
use tickflow_runner::{
    build_sources, compare_runs, compute_stats, IngestOptions, Pipeline, PipelineConfig,
    SourceKind,
};

#[derive(Parser)]
#[command(
    name = "tickflow",
    about = "TickFlow: incremental crypto market-data ingestion"
)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config and TICKFLOW_DATABASE).
    #[arg(long, global = true)]
    database: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest all configured sources in order.
    Run {
        /// Only this source: coingecko, coinpaprika, csv or legacy.
        #[arg(long)]
        source: Option<SourceKind>,

        /// Abort with an injected failure after this many new records.
        #[arg(long, hide = true)]
        fail_after: Option<u64>,
    },
    /// Aggregate run stats across the whole ledger.
    Stats,
    /// Compare the last two successful runs of each source.
    Compare {
        /// Absolute change, in percent, flagged as an anomaly.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// List recent runs.
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Only runs for this source label.
        #[arg(long)]
        source: Option<String>,
    },
    /// List normalized records, newest first.
    Data {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        limit: u32,

        #[arg(long)]
        symbol: Option<String>,

        #[arg(long)]
        source: Option<String>,
    },
    /// Show every checkpoint.
    Checkpoints,
    /// Check the store and report the last ingestion time.
    Health,
    /// Write synthetic CSV files at the configured paths.
    Generate {
        #[arg(long, default_value_t = 100)]
        rows: usize,

        #[arg(long, default_value_t = 50)]
        legacy_rows: usize,

        /// Seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();
    if let Some(db) = cli.database {
        config.database = db;
    }

    match cli.command {
        Commands::Run { source, fail_after } => run_pipeline(&config, source, fail_after),
        Commands::Stats => print_json(&compute_stats(&open_store(&config)?.runs()?)),
        Commands::Compare { threshold } => {
            let threshold = threshold.unwrap_or(config.anomaly.threshold_percent);
            print_json(&compare_runs(&open_store(&config)?.runs()?, threshold))
        }
        Commands::Runs { limit, source } => {
            print_json(&open_store(&config)?.recent_runs(limit, source.as_deref())?)
        }
        Commands::Data {
            page,
            limit,
            symbol,
            source,
        } => {
            let query = RecordQuery {
                page,
                limit,
                symbol,
                source,
            };
            print_json(&open_store(&config)?.list_records(&query)?)
        }
        Commands::Checkpoints => print_json(&open_store(&config)?.checkpoints()?),
        Commands::Health => run_health(&config),
        Commands::Generate {
            rows,
            legacy_rows,
            seed,
        } => run_generate(&config, rows, legacy_rows, seed),
    }
}

fn open_store(config: &PipelineConfig) -> Result<SqliteStore> {
    SqliteStore::open(&config.database)
        .with_context(|| format!("opening database {}", config.database))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_pipeline(
    config: &PipelineConfig,
    only: Option<SourceKind>,
    fail_after: Option<u64>,
) -> Result<()> {
    let store = open_store(config)?;
    let sources = build_sources(config, only, |timeout| {
        let fetcher: Arc<dyn HttpFetch> = Arc::new(ReqwestFetcher::new(timeout)?);
        Ok(fetcher)
    })?;

    let options = fail_after.map(IngestOptions::fail_after).unwrap_or_default();
    let reports = Pipeline::new(&store)
        .with_options(options)
        .with_stale_after(config.stale_run_after())
        .run_all(&sources)?;

    for report in &reports {
        println!(
            "{:<8} {:<28} records={:<5} {}",
            report.status.as_str(),
            report.source,
            report.records_processed,
            report.error_message.as_deref().unwrap_or("")
        );
    }

    let failed = reports
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count();
    if failed > 0 {
        bail!("{failed} of {} source runs failed", reports.len());
    }
    Ok(())
}

fn run_health(config: &PipelineConfig) -> Result<()> {
    let (db_connection, etl_last_run) = match open_store(config) {
        Ok(store) => match store.ping() {
            Ok(()) => (true, store.latest_ingested_at()?),
            Err(e) => {
                tracing::error!(error = %e, "store ping failed");
                (false, None)
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "store unavailable");
            (false, None)
        }
    };

    print_json(&json!({
        "status": if db_connection { "healthy" } else { "unhealthy" },
        "db_connection": db_connection,
        "etl_last_run": etl_last_run,
    }))
}

fn run_generate(
    config: &PipelineConfig,
    rows: usize,
    legacy_rows: usize,
    seed: Option<u64>,
) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let standard = PathBuf::from(&config.files.csv);
    let legacy = PathBuf::from(&config.files.legacy_csv);
    generate::write_standard(&standard, rows, &mut rng)?;
    generate::write_legacy(&legacy, legacy_rows, &mut rng)?;
    println!("Generated {} ({rows} rows)", standard.display());
    println!("Generated {} ({legacy_rows} rows)", legacy.display());
    Ok(())
}
