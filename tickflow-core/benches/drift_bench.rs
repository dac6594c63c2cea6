//! Criterion benchmarks for the tabular hot paths.
//!
//! Benchmarks:
//! 1. Schema drift detection on realistic and wide headers
//! 2. Standard and legacy CSV row validation

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

use tickflow_core::validate::{csv_legacy, csv_standard};
use tickflow_core::SchemaDriftDetector;

fn standard_rows(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "symbol": ["btc", "eth", "sol"][i % 3],
                "price": format!("{:.2}", 100.0 + i as f64 * 0.5),
                "volume": format!("{}", 1_000 + i),
                "timestamp": format!("2024-01-01 {:02}:{:02}:00", (i / 60) % 24, i % 60),
                "source": "synthetic_exchange",
            })
        })
        .collect()
}

fn legacy_rows(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "Ticker": ["dot", "ltc"][i % 2],
                "LastPrice": format!("{:.2}", 7.0 + i as f64 * 0.01),
                "Vol": format!("{}", 10 + i),
                "RecordedDate": format!("{:02}-01-2024 10:00:00", 1 + i % 28),
            })
        })
        .collect()
}

fn bench_drift(c: &mut Criterion) {
    let mut group = c.benchmark_group("drift");
    let detector = SchemaDriftDetector::default();

    group.bench_function("renamed_header", |b| {
        b.iter(|| {
            detector.detect(
                black_box(csv_standard::EXPECTED_COLUMNS),
                black_box(&["symbol", "prce", "vol", "ts", "source", "exchange"]),
            )
        })
    });

    for width in [10usize, 50] {
        let expected: Vec<String> = (0..width).map(|i| format!("column_{i}")).collect();
        let observed: Vec<String> = (0..width).map(|i| format!("colum_{i}_x")).collect();
        group.bench_with_input(BenchmarkId::new("wide_header", width), &width, |b, _| {
            b.iter(|| detector.detect(black_box(&expected), black_box(&observed)))
        });
    }

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");
    let now = Utc::now();

    let rows = standard_rows(1_000);
    group.bench_function("standard_1000_rows", |b| {
        b.iter(|| {
            rows.iter()
                .filter(|row| csv_standard::validate(black_box(row), now).is_ok())
                .count()
        })
    });

    let rows = legacy_rows(1_000);
    group.bench_function("legacy_1000_rows", |b| {
        b.iter(|| {
            rows.iter()
                .filter(|row| csv_legacy::validate(black_box(row), now).is_ok())
                .count()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_drift, bench_validation);
criterion_main!(benches);
