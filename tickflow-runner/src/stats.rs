//! Aggregate run metrics and cross-run volume anomaly detection.
//!
//! Both reports are pure functions of the run ledger.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tickflow_core::{RunRecord, RunStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_runs: u64,
    pub total_records_processed: u64,
    pub failed_runs: u64,
    /// Share of runs that did not fail, in percent, two decimals.
    pub success_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub last_run_at: DateTime<Utc>,
    pub last_status: RunStatus,
    pub records_processed_last_run: u64,
    pub duration_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub global_stats: GlobalStats,
    pub sources: BTreeMap<String, SourceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub source: String,
    pub current_run_id: i64,
    pub current_records: u64,
    pub previous_run_id: i64,
    pub previous_records: u64,
    pub change_percent: f64,
    pub is_anomaly: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResponse {
    pub anomalies_detected: u64,
    pub reports: Vec<ComparisonReport>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Most recent first; ties on start time broken by id.
fn newest_first(runs: &[RunRecord]) -> Vec<&RunRecord> {
    let mut sorted: Vec<&RunRecord> = runs.iter().collect();
    sorted.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
    sorted
}

/// Relative change in percent. A zero baseline maps to +100% if anything was
/// processed, else 0%.
pub fn change_percent(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        if current > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current as f64 - previous as f64) / previous as f64 * 100.0
    }
}

pub fn compute_stats(runs: &[RunRecord]) -> StatsReport {
    let total_runs = runs.len() as u64;
    let failed_runs = runs
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count() as u64;
    let success_rate_percent = if total_runs == 0 {
        0.0
    } else {
        round2((total_runs - failed_runs) as f64 / total_runs as f64 * 100.0)
    };

    let mut sources = BTreeMap::new();
    for run in newest_first(runs) {
        sources.entry(run.source.clone()).or_insert_with(|| SourceStats {
            last_run_at: run.start_time,
            last_status: run.status,
            records_processed_last_run: run.records_processed,
            duration_ms: run.duration_ms(),
        });
    }

    StatsReport {
        global_stats: GlobalStats {
            total_runs,
            total_records_processed: runs.iter().map(|r| r.records_processed).sum(),
            failed_runs,
            success_rate_percent,
        },
        sources,
    }
}

/// Compare the two most recent successful runs of every source.
///
/// Sources with fewer than two successful runs are left out of the report.
pub fn compare_runs(runs: &[RunRecord], threshold_percent: f64) -> ComparisonResponse {
    let mut by_source: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
    for run in newest_first(runs) {
        if run.status == RunStatus::Success {
            by_source.entry(run.source.as_str()).or_default().push(run);
        }
    }

    let mut reports = Vec::new();
    for (source, successes) in by_source {
        let [current, previous, ..] = successes.as_slice() else {
            continue;
        };
        let change = change_percent(current.records_processed, previous.records_processed);
        let is_anomaly = change.abs() > threshold_percent;
        if is_anomaly {
            tracing::warn!(source, change_percent = change, "volume anomaly between runs");
        }
        reports.push(ComparisonReport {
            source: source.to_string(),
            current_run_id: current.id,
            current_records: current.records_processed,
            previous_run_id: previous.id,
            previous_records: previous.records_processed,
            change_percent: round2(change),
            is_anomaly,
        });
    }

    ComparisonResponse {
        anomalies_detected: reports.iter().filter(|r| r.is_anomaly).count() as u64,
        reports,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn run(id: i64, source: &str, status: RunStatus, minute: i64, records: u64) -> RunRecord {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        RunRecord {
            id,
            source: source.into(),
            status,
            start_time: start,
            end_time: Some(start + Duration::milliseconds(250)),
            records_processed: records,
            error_message: None,
        }
    }

    #[test]
    fn volume_drop_is_flagged() {
        let runs = vec![
            run(1, "coingecko_api", RunStatus::Success, 0, 100),
            run(2, "coingecko_api", RunStatus::Success, 10, 70),
        ];
        let result = compare_runs(&runs, 20.0);
        assert_eq!(result.anomalies_detected, 1);
        let report = &result.reports[0];
        assert_eq!(report.change_percent, -30.0);
        assert!(report.is_anomaly);
        assert_eq!(report.current_run_id, 2);
        assert_eq!(report.previous_run_id, 1);
    }

    #[test]
    fn only_successful_runs_are_compared() {
        let runs = vec![
            run(1, "a", RunStatus::Success, 0, 100),
            run(2, "a", RunStatus::Failed, 5, 0),
            run(3, "a", RunStatus::Skipped, 6, 0),
            run(4, "a", RunStatus::Success, 10, 90),
            run(5, "b", RunStatus::Success, 10, 90),
        ];
        let result = compare_runs(&runs, 20.0);
        assert_eq!(result.reports.len(), 1);
        assert_eq!(result.reports[0].source, "a");
        assert_eq!(result.reports[0].change_percent, -10.0);
        assert!(!result.reports[0].is_anomaly);
        assert_eq!(result.anomalies_detected, 0);
    }

    #[test]
    fn zero_baseline_special_cases() {
        assert_eq!(change_percent(5, 0), 100.0);
        assert_eq!(change_percent(0, 0), 0.0);
        assert_eq!(change_percent(150, 100), 50.0);
    }

    #[test]
    fn change_is_rounded_to_two_decimals() {
        let runs = vec![
            run(1, "a", RunStatus::Success, 0, 3),
            run(2, "a", RunStatus::Success, 1, 2),
        ];
        assert_eq!(compare_runs(&runs, 50.0).reports[0].change_percent, -33.33);
    }

    #[test]
    fn stats_aggregate_the_whole_ledger() {
        let runs = vec![
            run(1, "coingecko_api", RunStatus::Success, 0, 10),
            run(2, "coingecko_api", RunStatus::Failed, 5, 3),
            run(3, "crypto_data.csv", RunStatus::Skipped, 6, 0),
            run(4, "crypto_data.csv", RunStatus::Success, 1, 100),
        ];
        let stats = compute_stats(&runs);
        assert_eq!(stats.global_stats.total_runs, 4);
        assert_eq!(stats.global_stats.failed_runs, 1);
        assert_eq!(stats.global_stats.total_records_processed, 113);
        assert_eq!(stats.global_stats.success_rate_percent, 75.0);

        let gecko = &stats.sources["coingecko_api"];
        assert_eq!(gecko.last_status, RunStatus::Failed);
        assert_eq!(gecko.records_processed_last_run, 3);
        assert_eq!(gecko.duration_ms, Some(250.0));
        assert_eq!(stats.sources["crypto_data.csv"].last_status, RunStatus::Skipped);
    }

    #[test]
    fn empty_ledger_has_zero_rate() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.global_stats.total_runs, 0);
        assert_eq!(stats.global_stats.success_rate_percent, 0.0);
        assert!(stats.sources.is_empty());
    }

    #[test]
    fn stats_serialize_with_lowercase_status() {
        let stats = compute_stats(&[run(1, "a", RunStatus::Success, 0, 1)]);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["sources"]["a"]["last_status"], "success");
        assert_eq!(json["global_stats"]["success_rate_percent"], 100.0);
    }

    proptest! {
        #[test]
        fn anomaly_iff_change_exceeds_threshold(prev in 1u64..10_000, cur in 0u64..10_000, threshold in 0.0f64..200.0) {
            let runs = vec![
                run(1, "s", RunStatus::Success, 0, prev),
                run(2, "s", RunStatus::Success, 1, cur),
            ];
            let report = &compare_runs(&runs, threshold).reports[0];
            let change = change_percent(cur, prev);
            prop_assert_eq!(report.is_anomaly, change.abs() > threshold);
            prop_assert!((report.change_percent - change).abs() <= 0.005 + 1e-9);
        }
    }
}
