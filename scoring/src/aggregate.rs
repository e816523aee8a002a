//! Run-level aggregation.
//!
//! Reduces the ordered per-item score records into one summary. An empty
//! run aggregates to zero means and null percentiles; callers treat
//! `n_items == 0` as "no data" regardless of the zero means.

use crate::metrics::ItemScores;
use serde::{Deserialize, Serialize};

/// Summary statistics over all scored items of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAggregate {
    pub n_items: usize,
    pub correctness_avg: f64,
    pub relevance_avg: f64,
    pub safety_violations: usize,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
}

impl RunAggregate {
    pub fn empty() -> Self {
        Self {
            n_items: 0,
            correctness_avg: 0.0,
            relevance_avg: 0.0,
            safety_violations: 0,
            p50_ms: None,
            p95_ms: None,
        }
    }
}

/// Aggregate metrics across all items: averages, safety sum, p50, p95.
pub fn aggregate(results: &[ItemScores]) -> RunAggregate {
    if results.is_empty() {
        return RunAggregate::empty();
    }

    let n = results.len();
    let correctness_avg = results.iter().map(|r| r.correctness).sum::<f64>() / n as f64;
    let relevance_avg = results.iter().map(|r| r.relevance).sum::<f64>() / n as f64;
    let safety_violations = results.iter().map(|r| r.safety_violation_count).sum();

    let mut latencies: Vec<u64> = results.iter().map(|r| r.latency_ms).collect();
    latencies.sort_unstable();

    RunAggregate {
        n_items: n,
        correctness_avg,
        relevance_avg,
        safety_violations,
        p50_ms: percentile(&latencies, 50.0),
        p95_ms: percentile(&latencies, 95.0),
    }
}

/// Linear-interpolation percentile over a sorted sample, truncated to
/// whole milliseconds. Empty samples have no percentile.
pub fn percentile(sorted: &[u64], p: f64) -> Option<u64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    let value =
        sorted[lower] as f64 + (sorted[upper] as f64 - sorted[lower] as f64) * fraction;
    Some(value as u64)
}
