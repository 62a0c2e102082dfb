use crate::stats::{average_ms, percentile_ms};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Result of one HTTP call. Failures carry no error detail; only the
/// aggregate counts matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOutcome {
    pub success: bool,
    pub elapsed: Duration,
    /// Status code, when a response was received at all.
    pub status: Option<u16>,
}

impl RequestOutcome {
    /// A call that got a response; successful only on 200.
    pub fn completed(status: u16, elapsed: Duration) -> Self {
        Self {
            success: status == 200,
            elapsed,
            status: Some(status),
        }
    }

    /// A call that failed before a status was read (transport error or timeout).
    pub fn failed(elapsed: Duration) -> Self {
        Self {
            success: false,
            elapsed,
            status: None,
        }
    }
}

/// Summary of one batch. Latencies are in milliseconds rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadReport {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub avg_ms: f64,
    /// Wall time of the whole batch in seconds.
    pub time_s: f64,
}

impl WorkloadReport {
    pub fn from_outcomes(outcomes: &[RequestOutcome], wall_time: Duration) -> Self {
        let samples: Vec<f64> = outcomes.iter().map(|o| o.elapsed.as_secs_f64()).collect();
        let successes = outcomes.iter().filter(|o| o.success).count();

        Self {
            total: outcomes.len(),
            successes,
            failures: outcomes.len() - successes,
            p50_ms: round2(percentile_ms(&samples, 50.0)),
            p95_ms: round2(percentile_ms(&samples, 95.0)),
            avg_ms: round2(average_ms(&samples)),
            time_s: wall_time.as_secs_f64(),
        }
    }
}

impl fmt::Display for WorkloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (fail={}), avg={}ms p50={}ms p95={}ms, time={:.2}s",
            self.successes,
            self.total,
            self.failures,
            self.avg_ms,
            self.p50_ms,
            self.p95_ms,
            self.time_s
        )
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
