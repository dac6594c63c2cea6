//! Schema drift detection for tabular sources.
//!
//! Compares the column set a validator declares against the header a file
//! actually carries, and proposes probable renames by fuzzy name similarity.
//! The report is informational: columns are never remapped automatically, so
//! rows missing a required field still fail validation.

use serde::{Deserialize, Serialize};

/// Minimum similarity for a rename to be proposed.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// A probable rename of an expected column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub expected: String,
    pub actual: String,
    /// Similarity in [0, 1], rounded to two decimals.
    pub confidence: f64,
}

/// Result of comparing expected vs observed columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DriftReport {
    pub drift_detected: bool,
    /// Expected but not observed, in expected order.
    pub missing: Vec<String>,
    /// Observed but not expected, in observed order.
    pub extra: Vec<String>,
    pub matches: Vec<ColumnMatch>,
}

impl DriftReport {
    /// Human-readable notices suitable for a run's warning log.
    ///
    /// One notice per proposed rename; if columns are missing and nothing
    /// looks like a rename, a single notice listing them.
    pub fn notices(&self) -> Vec<String> {
        if !self.drift_detected {
            return Vec::new();
        }

        let mut notices: Vec<String> = self
            .matches
            .iter()
            .map(|m| {
                format!(
                    "Potential rename: '{}' -> '{}' (conf: {:.2})",
                    m.expected, m.actual, m.confidence
                )
            })
            .collect();

        if !self.missing.is_empty() && self.matches.is_empty() {
            notices.push(format!("Missing columns: {:?}", self.missing));
        }

        notices
    }
}

/// Column-set comparator with a fixed rename confidence threshold.
#[derive(Debug, Clone, Copy)]
pub struct SchemaDriftDetector {
    threshold: f64,
}

impl Default for SchemaDriftDetector {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl SchemaDriftDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn detect<E, O>(&self, expected: &[E], observed: &[O]) -> DriftReport
    where
        E: AsRef<str>,
        O: AsRef<str>,
    {
        let missing: Vec<String> = expected
            .iter()
            .map(AsRef::as_ref)
            .filter(|e| !observed.iter().any(|o| o.as_ref() == *e))
            .map(String::from)
            .collect();
        let extra: Vec<String> = observed
            .iter()
            .map(AsRef::as_ref)
            .filter(|o| !expected.iter().any(|e| e.as_ref() == *o))
            .map(String::from)
            .collect();

        let mut matches = Vec::new();
        for m in &missing {
            // First candidate wins ties
            let mut best: Option<(&str, f64)> = None;
            for candidate in &extra {
                let score = similarity(m, candidate);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((candidate.as_str(), score));
                }
            }

            if let Some((actual, score)) = best {
                if score >= self.threshold {
                    matches.push(ColumnMatch {
                        expected: m.clone(),
                        actual: actual.to_string(),
                        confidence: (score * 100.0).round() / 100.0,
                    });
                }
            }
        }

        DriftReport {
            drift_detected: !missing.is_empty() || !extra.is_empty(),
            missing,
            extra,
            matches,
        }
    }
}

/// Case-insensitive similarity in [0, 1]: `1 - indel_distance / (|a| + |b|)`,
/// i.e. `2 * LCS(a, b) / (|a| + |b|)`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * longest_common_subsequence(&a, &b) as f64 / total as f64
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
