//! Synthetic CSV fixtures for local runs: one well-formed export and one in
//! the legacy layout.

use std::path::Path;

use anyhow::Result;
use chrono::{Duration, NaiveDateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

const STANDARD_SYMBOLS: &[&str] = &["BTC", "ETH", "SOL", "ADA", "DOGE"];
const LEGACY_SYMBOLS: &[&str] = &["DOT", "AVAX", "LTC", "LINK", "XLM"];

/// Random minute offset within roughly the last week.
fn random_time<R: Rng>(rng: &mut R, start: NaiveDateTime) -> NaiveDateTime {
    start + Duration::minutes(rng.gen_range(0..=10_000))
}

fn pick<'a, R: Rng>(rng: &mut R, symbols: &[&'a str]) -> &'a str {
    symbols.choose(rng).copied().unwrap_or("BTC")
}

pub fn write_standard<R: Rng>(path: &Path, rows: usize, rng: &mut R) -> Result<()> {
    let start = (Utc::now() - Duration::days(7)).naive_utc();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["symbol", "price", "volume", "timestamp", "source"])?;
    for _ in 0..rows {
        writer.write_record([
            pick(rng, STANDARD_SYMBOLS).to_string(),
            format!("{:.2}", rng.gen_range(10.0..50_000.0)),
            format!("{:.2}", rng.gen_range(1_000.0..1_000_000.0)),
            random_time(rng, start).format("%Y-%m-%dT%H:%M:%S").to_string(),
            "synthetic_exchange".to_string(),
        ])?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows, "generated standard CSV");
    Ok(())
}

pub fn write_legacy<R: Rng>(path: &Path, rows: usize, rng: &mut R) -> Result<()> {
    let start = (Utc::now() - Duration::days(7)).naive_utc();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Ticker", "LastPrice", "Vol", "RecordedDate"])?;
    for _ in 0..rows {
        writer.write_record([
            pick(rng, LEGACY_SYMBOLS).to_string(),
            format!("{:.2}", rng.gen_range(5.0..500.0)),
            format!("{:.2}", rng.gen_range(5_000.0..500_000.0)),
            random_time(rng, start).format("%d-%m-%Y %H:%M:%S").to_string(),
        ])?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows, "generated legacy CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tickflow_core::source::{CsvSource, LegacyCsvSource};
    use tickflow_core::Source;

    #[test]
    fn generated_files_validate_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let standard = dir.path().join("crypto_data.csv");
        write_standard(&standard, 100, &mut rng).unwrap();
        let source = CsvSource::new(standard.to_str().unwrap());
        let batch = source.load().unwrap();
        assert_eq!(batch.records.len(), 100);
        for raw in &batch.records {
            let record = source.validate(raw, Utc::now()).unwrap();
            assert!(STANDARD_SYMBOLS.contains(&record.symbol.as_str()));
        }

        let legacy = dir.path().join("legacy_crypto_data.csv");
        write_legacy(&legacy, 50, &mut rng).unwrap();
        let source = LegacyCsvSource::new(legacy.to_str().unwrap());
        let batch = source.load().unwrap();
        assert_eq!(batch.records.len(), 50);
        let sentinel = Utc::now() + Duration::days(365);
        for raw in &batch.records {
            // Parsed dates never fall back to "now"
            let record = source.validate(raw, sentinel).unwrap();
            assert!(record.recorded_at < sentinel);
        }
    }
}
