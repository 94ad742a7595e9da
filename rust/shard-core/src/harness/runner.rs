// rust/shard-core/src/harness/runner.rs

use std::sync::Arc;
use std::thread;

use chrono::Utc;
use tracing::{info, warn};

use super::report::{gib_per_sec, to_gib, HarnessReport};
use super::worker::{run_worker, WorkerResult};
use crate::error::{Result, ShardError};
use crate::shard::VolumeShardSet;
use crate::tensor::ShardLoader;

/// Runs one worker thread per volume and joins them all before reporting.
pub struct ThroughputHarness {
    loader: Arc<dyn ShardLoader>,
}

impl ThroughputHarness {
    pub fn new(loader: Arc<dyn ShardLoader>) -> Self {
        Self { loader }
    }

    /// Measures every volume concurrently.
    ///
    /// A worker that fails or panics yields an incomplete result for its own
    /// volume only; the other workers run to completion.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if `assignments` is empty.
    pub fn measure(&self, assignments: &[VolumeShardSet]) -> Result<HarnessReport> {
        if assignments.is_empty() {
            return Err(ShardError::precondition("no volumes to measure"));
        }

        let started_at = Utc::now();
        info!(volumes = assignments.len(), "starting throughput measurement");

        let loader: &dyn ShardLoader = self.loader.as_ref();
        let workers: Vec<WorkerResult> = thread::scope(|scope| {
            let handles: Vec<_> = assignments
                .iter()
                .enumerate()
                .map(|(worker_id, set)| {
                    let handle = thread::Builder::new()
                        .name(format!("shard-worker-{worker_id}"))
                        .spawn_scoped(scope, move || run_worker(loader, worker_id, set));
                    (worker_id, set, handle)
                })
                .collect();

            // Join in assignment order
            handles
                .into_iter()
                .map(|(worker_id, set, handle)| match handle {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        warn!(volume = set.label(), "worker thread panicked");
                        WorkerResult::aborted(set.label(), worker_id, "worker thread panicked")
                    }),
                    Err(e) => {
                        warn!(volume = set.label(), error = %e, "failed to spawn worker thread");
                        WorkerResult::aborted(
                            set.label(),
                            worker_id,
                            format!("failed to spawn worker thread: {e}"),
                        )
                    }
                })
                .collect()
        });

        let report = HarnessReport::new(started_at, workers);
        for volume in &report.aggregate.volumes {
            info!(
                volume = %volume.volume_label,
                shards = volume.shard_count,
                gib = volume.gib(),
                gib_per_sec = gib_per_sec(volume.rate),
                complete = volume.complete,
                "volume measured"
            );
        }
        info!(
            combined_gib = to_gib(report.aggregate.combined_bytes),
            wall_clock_secs = report.aggregate.wall_clock.as_secs_f64(),
            effective_gib_per_sec = gib_per_sec(report.aggregate.effective_rate),
            "measurement complete"
        );

        Ok(report)
    }
}
