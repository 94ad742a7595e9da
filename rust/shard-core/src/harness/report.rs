// rust/shard-core/src/harness/report.rs

//! Per-volume summaries and the aggregate throughput report.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::worker::WorkerResult;

/// Bytes in one GiB, the unit used for display.
pub const GIB: f64 = (1u64 << 30) as f64;

/// `bytes / duration` in bytes per second.
///
/// A zero duration yields NaN for zero bytes and infinity otherwise.
pub fn rate(bytes: u64, duration: Duration) -> f64 {
    bytes as f64 / duration.as_secs_f64()
}

pub fn to_gib(bytes: u64) -> f64 {
    bytes as f64 / GIB
}

/// Converts a bytes-per-second rate to GiB/s.
pub fn gib_per_sec(rate: f64) -> f64 {
    rate / GIB
}

/// One row of the aggregate report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeSummary {
    pub volume_label: String,
    pub shard_count: usize,
    pub total_bytes: u64,
    pub total_duration: Duration,
    /// Bytes per second.
    pub rate: f64,
    /// False if the worker stopped early; the totals then cover only the
    /// shards completed before the failure.
    pub complete: bool,
}

impl VolumeSummary {
    fn from_result(result: &WorkerResult) -> Self {
        Self {
            volume_label: result.volume_label.clone(),
            shard_count: result.shards.len(),
            total_bytes: result.total_bytes,
            total_duration: result.total_duration,
            rate: result.rate(),
            complete: result.is_complete(),
        }
    }

    pub fn gib(&self) -> f64 {
        to_gib(self.total_bytes)
    }
}

/// Combined view over all workers.
///
/// The wall-clock time is the slowest worker's total duration, so the
/// effective rate models volumes read concurrently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub volumes: Vec<VolumeSummary>,
    pub combined_bytes: u64,
    pub wall_clock: Duration,
    /// `combined_bytes / wall_clock` in bytes per second.
    pub effective_rate: f64,
}

impl AggregateReport {
    pub fn from_results(results: &[WorkerResult]) -> Self {
        let volumes: Vec<_> = results.iter().map(VolumeSummary::from_result).collect();
        let combined_bytes = results.iter().map(|r| r.total_bytes).sum();
        let wall_clock = results
            .iter()
            .map(|r| r.total_duration)
            .max()
            .unwrap_or(Duration::ZERO);

        Self {
            volumes,
            combined_bytes,
            wall_clock,
            effective_rate: rate(combined_bytes, wall_clock),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.volumes.iter().all(|v| v.complete)
    }

    /// Labels of volumes whose worker stopped early.
    pub fn incomplete_volumes(&self) -> Vec<&str> {
        self.volumes
            .iter()
            .filter(|v| !v.complete)
            .map(|v| v.volume_label.as_str())
            .collect()
    }

    pub fn volume(&self, label: &str) -> Option<&VolumeSummary> {
        self.volumes.iter().find(|v| v.volume_label == label)
    }
}

/// Everything one harness run produced.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    /// One result per assignment, in assignment order.
    pub workers: Vec<WorkerResult>,
    pub aggregate: AggregateReport,
}

impl HarnessReport {
    pub fn new(started_at: DateTime<Utc>, workers: Vec<WorkerResult>) -> Self {
        let aggregate = AggregateReport::from_results(&workers);
        Self {
            started_at,
            workers,
            aggregate,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.aggregate.is_complete()
    }
}
