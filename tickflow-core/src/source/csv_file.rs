//! File-backed sources. The unit of checkpointing is the whole file, keyed by
//! its literal path.

use std::io::ErrorKind;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::{CheckpointPolicy, RawRecord, Source, SourceBatch, SourceError};
use crate::domain::{MarketRecord, RawTable};
use crate::validate::{csv_legacy, csv_standard, ValidationError};

/// Read a CSV file into rows of header -> cell text.
///
/// Short rows simply lack the trailing columns; surplus cells are dropped.
fn read_table(path: &str) -> Result<SourceBatch, SourceError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SourceError::NotFound {
            path: path.to_string(),
        },
        _ => SourceError::Io(e),
    })?;
    let file_hash = blake3::hash(&bytes).to_hex().to_string();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes.as_slice());
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let fields: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(h, cell)| (h.clone(), Value::String(cell.to_string())))
            .collect();
        records.push(RawRecord {
            origin: path.to_string(),
            payload: Value::Object(fields),
        });
    }

    tracing::info!(path, rows = records.len(), "read file");
    let metadata = json!({ "file_hash": file_hash, "rows": records.len() });
    Ok(SourceBatch {
        records,
        columns: Some(headers),
        metadata,
    })
}

/// Standard CSV export (`symbol, price, volume, timestamp, source`).
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: String,
}

impl CsvSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Source for CsvSource {
    fn name(&self) -> &str {
        &self.path
    }

    fn checkpoint_key(&self) -> &str {
        &self.path
    }

    fn checkpoint_policy(&self) -> CheckpointPolicy {
        CheckpointPolicy::WholeFile
    }

    fn raw_table(&self) -> RawTable {
        RawTable::CsvUpload
    }

    fn expected_columns(&self) -> Option<&'static [&'static str]> {
        Some(csv_standard::EXPECTED_COLUMNS)
    }

    fn load(&self) -> Result<SourceBatch, SourceError> {
        read_table(&self.path)
    }

    fn validate(&self, raw: &RawRecord, now: DateTime<Utc>) -> Result<MarketRecord, ValidationError> {
        csv_standard::validate(&raw.payload, now)
    }
}

/// Legacy CSV export (`Ticker, LastPrice, Vol, RecordedDate`).
#[derive(Debug, Clone)]
pub struct LegacyCsvSource {
    path: String,
}

impl LegacyCsvSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Source for LegacyCsvSource {
    fn name(&self) -> &str {
        &self.path
    }

    fn checkpoint_key(&self) -> &str {
        &self.path
    }

    fn checkpoint_policy(&self) -> CheckpointPolicy {
        CheckpointPolicy::WholeFile
    }

    fn raw_table(&self) -> RawTable {
        RawTable::LegacyUpload
    }

    fn expected_columns(&self) -> Option<&'static [&'static str]> {
        Some(csv_legacy::EXPECTED_COLUMNS)
    }

    fn load(&self) -> Result<SourceBatch, SourceError> {
        read_table(&self.path)
    }

    fn validate(&self, raw: &RawRecord, now: DateTime<Utc>) -> Result<MarketRecord, ValidationError> {
        csv_legacy::validate(&raw.payload, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn rows_become_header_keyed_objects() {
        let file = write_csv(
            "symbol,price,volume,timestamp,source\n\
             btc,100,5,2024-01-01 00:00:00,ex\n\
             eth,50\n",
        );
        let path = file.path().to_str().unwrap();
        let batch = CsvSource::new(path).load().unwrap();

        assert_eq!(
            batch.columns.as_deref(),
            Some(&["symbol", "price", "volume", "timestamp", "source"].map(String::from)[..])
        );
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].origin, path);
        assert_eq!(batch.records[0].payload["symbol"], "btc");
        assert_eq!(batch.records[1].payload.get("volume"), None);
        assert_eq!(batch.metadata["rows"], 2);
        assert_eq!(batch.metadata["file_hash"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let err = LegacyCsvSource::new("/definitely/not/here.csv").load().unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
        assert_eq!(err.to_string(), "File not found: /definitely/not/here.csv");
    }

    #[test]
    fn identical_contents_hash_identically() {
        let a = write_csv("Ticker,LastPrice,Vol,RecordedDate\nDOT,7,1,01-01-2024 00:00:00\n");
        let b = write_csv("Ticker,LastPrice,Vol,RecordedDate\nDOT,7,1,01-01-2024 00:00:00\n");
        let ha = LegacyCsvSource::new(a.path().to_str().unwrap()).load().unwrap().metadata;
        let hb = LegacyCsvSource::new(b.path().to_str().unwrap()).load().unwrap().metadata;
        assert_eq!(ha["file_hash"], hb["file_hash"]);
    }

    #[test]
    fn variants_declare_their_columns_and_tables() {
        let std_src = CsvSource::new("a.csv");
        let legacy = LegacyCsvSource::new("b.csv");
        assert_eq!(std_src.checkpoint_key(), "a.csv");
        assert_eq!(std_src.raw_table(), RawTable::CsvUpload);
        assert_eq!(legacy.raw_table(), RawTable::LegacyUpload);
        assert_eq!(legacy.expected_columns().unwrap()[0], "Ticker");
        assert_eq!(legacy.checkpoint_policy(), CheckpointPolicy::WholeFile);
    }
}
