// rust/shard-core/src/harness/worker.rs

//! The per-volume worker loop.

use std::any::Any;
use std::hash::Hasher;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};
use twox_hash::XxHash64;

use super::report::rate;
use crate::error::Result;
use crate::shard::{ShardFile, VolumeShardSet};
use crate::tensor::ShardLoader;

/// Timing and size of one fully loaded shard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardMeasurement {
    pub path: PathBuf,
    pub shard_index: Option<u32>,
    /// Sum of `element_count * byte_width` over the shard's buffers.
    pub byte_size: u64,
    pub buffer_count: usize,
    pub elapsed: Duration,
    /// XxHash64 over the per-buffer digests, in buffer name order.
    pub checksum: u64,
}

impl ShardMeasurement {
    /// Bytes per second for this shard alone.
    pub fn rate(&self) -> f64 {
        rate(self.byte_size, self.elapsed)
    }
}

/// Why a worker stopped before finishing its volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerFailure {
    /// Shard being processed, if the failure was tied to one.
    pub path: Option<PathBuf>,
    pub shard_index: Option<u32>,
    pub message: String,
}

/// Output of one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerResult {
    pub volume_label: String,
    pub worker_id: usize,
    /// Completed shards, in load order.
    pub shards: Vec<ShardMeasurement>,
    pub total_bytes: u64,
    /// Sum of per-shard durations.
    pub total_duration: Duration,
    pub failure: Option<WorkerFailure>,
}

impl WorkerResult {
    pub fn new(volume_label: impl Into<String>, worker_id: usize) -> Self {
        Self {
            volume_label: volume_label.into(),
            worker_id,
            shards: Vec::new(),
            total_bytes: 0,
            total_duration: Duration::ZERO,
            failure: None,
        }
    }

    /// A result for a worker that never processed a shard.
    pub fn aborted(
        volume_label: impl Into<String>,
        worker_id: usize,
        message: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(volume_label, worker_id);
        result.failure = Some(WorkerFailure {
            path: None,
            shard_index: None,
            message: message.into(),
        });
        result
    }

    /// Appends a completed shard and updates the totals.
    pub fn record(&mut self, measurement: ShardMeasurement) {
        self.total_bytes += measurement.byte_size;
        self.total_duration += measurement.elapsed;
        self.shards.push(measurement);
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// `total_bytes / total_duration` in bytes per second; NaN with no shards.
    pub fn rate(&self) -> f64 {
        rate(self.total_bytes, self.total_duration)
    }
}

/// Loads one shard and materializes every buffer.
///
/// Returns `(byte_size, buffer_count, checksum)`.
fn load_and_materialize(loader: &dyn ShardLoader, shard: &ShardFile) -> Result<(u64, usize, u64)> {
    let loaded = loader.load(&shard.path)?;

    let mut byte_size = 0u64;
    let mut hasher = XxHash64::with_seed(0);
    for buffer in loaded.buffers() {
        hasher.write_u64(buffer.materialize());
        byte_size += buffer.byte_size();
    }

    Ok((byte_size, loaded.len(), hasher.finish()))
}

/// Like [`load_and_materialize`], but a panicking loader becomes an error
/// message so the worker keeps what it measured so far.
fn measure_shard(
    loader: &dyn ShardLoader,
    shard: &ShardFile,
) -> std::result::Result<(u64, usize, u64), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| load_and_materialize(loader, shard))) {
        Ok(Ok(measured)) => Ok(measured),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("panic while loading shard: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Reads every shard of a volume in order, timing each one.
///
/// Stops at the first failure, including a panic in the loader; the result
/// then holds the shards completed before it and records the failing shard.
pub fn run_worker(loader: &dyn ShardLoader, worker_id: usize, set: &VolumeShardSet) -> WorkerResult {
    let mut result = WorkerResult::new(set.label(), worker_id);

    for shard in set.shards() {
        let start = Instant::now();
        match measure_shard(loader, shard) {
            Ok((byte_size, buffer_count, checksum)) => {
                let measurement = ShardMeasurement {
                    path: shard.path.clone(),
                    shard_index: shard.shard_index,
                    byte_size,
                    buffer_count,
                    elapsed: start.elapsed(),
                    checksum,
                };
                debug!(
                    volume = set.label(),
                    shard = %shard.path.display(),
                    bytes = measurement.byte_size,
                    elapsed_ms = measurement.elapsed.as_millis() as u64,
                    "shard loaded"
                );
                result.record(measurement);
            }
            Err(e) => {
                warn!(
                    volume = set.label(),
                    shard = %shard.path.display(),
                    completed = result.shards.len(),
                    error = %e,
                    "shard load failed, stopping worker"
                );
                result.failure = Some(WorkerFailure {
                    path: Some(shard.path.clone()),
                    shard_index: shard.shard_index,
                    message: e,
                });
                break;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShardError;
    use crate::harness::testing::SizedLoader;

    #[test]
    fn test_run_worker_in_order() {
        let loader = SizedLoader::new(&[("v/s-01", 100), ("v/s-02", 200), ("v/s-03", 300)]);
        let set = VolumeShardSet::from_paths("RAID0", ["v/s-03", "v/s-01", "v/s-02"]);

        let result = run_worker(&loader, 0, &set);

        assert!(result.is_complete());
        let order: Vec<_> = result.shards.iter().map(|s| s.shard_index).collect();
        assert_eq!(order, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(result.total_bytes, 600);
        assert_eq!(
            result.total_duration,
            result.shards.iter().map(|s| s.elapsed).sum::<Duration>()
        );
        assert_eq!(loader.loaded(), vec!["v/s-01", "v/s-02", "v/s-03"]);
    }

    #[test]
    fn test_run_worker_stops_on_failure() {
        let loader = SizedLoader::new(&[("v/s-01", 10), ("v/s-02", 20), ("v/s-03", 30), ("v/s-04", 40)])
            .failing_on("v/s-03");
        let set = VolumeShardSet::from_paths("RAID0", ["v/s-01", "v/s-02", "v/s-03", "v/s-04"]);

        let result = run_worker(&loader, 0, &set);

        assert!(!result.is_complete());
        assert_eq!(result.shards.len(), 2);
        assert_eq!(result.total_bytes, 30);
        let failure = result.failure.unwrap();
        assert_eq!(failure.path, Some(PathBuf::from("v/s-03")));
        assert_eq!(failure.shard_index, Some(3));
        // No retry and nothing after the failing shard
        assert_eq!(loader.loaded(), vec!["v/s-01", "v/s-02", "v/s-03"]);
    }

    #[test]
    fn test_panicking_loader_keeps_partial_totals() {
        let loader = SizedLoader::new(&[("v/s-01", 10), ("v/s-02", 20), ("v/s-03", 30)])
            .panicking_on("v/s-02");
        let set = VolumeShardSet::from_paths("RAID0", ["v/s-01", "v/s-02", "v/s-03"]);

        let result = run_worker(&loader, 0, &set);

        assert_eq!(result.shards.len(), 1);
        assert_eq!(result.total_bytes, 10);
        let failure = result.failure.unwrap();
        assert_eq!(failure.path, Some(PathBuf::from("v/s-02")));
        assert!(failure.message.starts_with("panic while loading shard"));
        assert!(failure.message.contains("injected panic"));
    }

    #[test]
    fn test_empty_volume_rate_is_nan() {
        let loader = SizedLoader::new(&[]);
        let set = VolumeShardSet::new("empty", Vec::new());

        let result = run_worker(&loader, 3, &set);

        assert!(result.is_complete());
        assert_eq!(result.worker_id, 3);
        assert_eq!(result.total_bytes, 0);
        assert!(result.rate().is_nan());
    }

    #[test]
    fn test_checksum_tracks_content() {
        let loader = SizedLoader::new(&[("a", 64), ("b", 64), ("c", 65)]);
        let set = VolumeShardSet::from_paths("v", ["a", "b", "c"]);

        let result = run_worker(&loader, 0, &set);

        // Same size and fill produce the same digest
        assert_eq!(result.shards[0].checksum, result.shards[1].checksum);
        assert_ne!(result.shards[0].checksum, result.shards[2].checksum);
    }

    #[test]
    fn test_failure_message_names_error() {
        let loader = SizedLoader::new(&[("bad", 1)]).failing_on("bad");
        let set = VolumeShardSet::from_paths("v", ["bad"]);

        let result = run_worker(&loader, 0, &set);
        let expected = ShardError::storage("bad", "injected read failure").to_string();
        assert_eq!(result.failure.unwrap().message, expected);
    }
}
