//! Integration tests: CSV files through source loading, drift detection,
//! validation and the SQLite store.

use std::io::Write;

use chrono::Utc;
use tickflow_core::source::{CsvSource, LegacyCsvSource};
use tickflow_core::{InsertOutcome, MarketStore, RawTable, SchemaDriftDetector, Source, SqliteStore};

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn renamed_header_is_reported_and_rows_fail_validation() {
    let file = write_csv(
        "symbol,prce,volume,timestamp,source\n\
         BTC,100,1,2024-01-01 00:00:00,ex\n",
    );
    let source = CsvSource::new(file.path().to_str().unwrap());
    let batch = source.load().unwrap();

    let observed = batch.columns.clone().unwrap();
    let report = SchemaDriftDetector::default().detect(source.expected_columns().unwrap(), &observed);
    assert!(report.drift_detected);
    assert_eq!(report.matches[0].expected, "price");
    assert_eq!(report.matches[0].actual, "prce");

    // Renames are only reported, never applied
    assert!(source.validate(&batch.records[0], Utc::now()).is_err());
}

#[test]
fn mixed_file_keeps_only_valid_rows() {
    let file = write_csv(
        "symbol,price,volume,timestamp,source\n\
         btc,100,1,2024-01-01 00:00:00,ex\n\
         eth,invalid_price,1,2024-01-01 00:00:00,ex\n\
         sol,20,3,2024-01-01 01:00:00,ex\n",
    );
    let source = CsvSource::new(file.path().to_str().unwrap());
    let store = SqliteStore::in_memory().unwrap();

    let batch = source.load().unwrap();
    let mut inserted = 0;
    for raw in &batch.records {
        store
            .insert_raw(source.raw_table(), &raw.origin, &raw.payload)
            .unwrap();
        if let Ok(record) = source.validate(raw, Utc::now()) {
            if store.insert_record(&record).unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }
    }

    assert_eq!(inserted, 2);
    assert_eq!(store.record_count().unwrap(), 2);
    assert_eq!(store.raw_count(RawTable::CsvUpload).unwrap(), 3);
}

#[test]
fn legacy_file_normalizes_to_legacy_label() {
    let file = write_csv(
        "Ticker,LastPrice,Vol,RecordedDate\n\
         dot,7.1,100,15-03-2024 09:30:00\n",
    );
    let source = LegacyCsvSource::new(file.path().to_str().unwrap());
    let batch = source.load().unwrap();

    let report = SchemaDriftDetector::default()
        .detect(source.expected_columns().unwrap(), batch.columns.as_deref().unwrap());
    assert!(!report.drift_detected);

    let record = source.validate(&batch.records[0], Utc::now()).unwrap();
    assert_eq!(record.symbol, "DOT");
    assert_eq!(record.source, "legacy_csv");
    assert_eq!(record.recorded_at.to_rfc3339(), "2024-03-15T09:30:00+00:00");
}
