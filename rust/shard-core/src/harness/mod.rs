// rust/shard-core/src/harness/mod.rs

//! Concurrent read-throughput measurement.
//!
//! Each volume gets a dedicated worker thread that loads its shards in
//! order, materializes every buffer and records how long each shard took.
//! After all workers are joined, the per-volume results are combined into
//! an [`AggregateReport`].
//!
//! # Example
//!
//! ```no_run
//! use shard_core::config::StorageConfig;
//! use shard_core::harness::{gib_per_sec, ThroughputHarness};
//! use shard_core::shard::VolumeShardSet;
//! use shard_core::storage::LocalStorage;
//! use shard_core::tensor::SafetensorsLoader;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(LocalStorage::new(&StorageConfig::default()).unwrap());
//! let harness = ThroughputHarness::new(Arc::new(SafetensorsLoader::new(storage)));
//!
//! let volumes = vec![
//!     VolumeShardSet::from_paths("RAID0", ["/mnt/raid0n0/model-00001-of-00002.safetensors"]),
//!     VolumeShardSet::from_paths("RAID1", ["/mnt/raid0n1/model-00002-of-00002.safetensors"]),
//! ];
//! let report = harness.measure(&volumes).unwrap();
//! println!("{:.2} GiB/s", gib_per_sec(report.aggregate.effective_rate));
//! ```

mod report;
mod runner;
#[cfg(test)]
mod testing;
mod worker;

pub use report::{
    gib_per_sec, rate, to_gib, AggregateReport, HarnessReport, VolumeSummary, GIB,
};
pub use runner::ThroughputHarness;
pub use worker::{run_worker, ShardMeasurement, WorkerFailure, WorkerResult};
