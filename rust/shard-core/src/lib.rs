// rust/shard-core/src/lib.rs

//! Shard Tool - Core Library
//!
//! Moves the shards of a sharded model checkpoint across several storage
//! volumes and measures how fast those volumes can read them back
//! concurrently.

pub mod config;
pub mod error;
pub mod storage;

pub use config::ToolConfig;
pub use error::{Result, ShardError};
pub use storage::{LocalStorage, ObjectMeta, StorageBackend, StorageReader};

pub mod shard;
pub use shard::{discover_volume, ShardFile, VolumeListing, VolumeShardSet};

pub mod distribute;
pub use distribute::{DistributionPlan, DistributionReport, Distributor};

pub mod tensor;
pub use tensor::{ElementKind, LoadedShard, SafetensorsLoader, ShardLoader};

pub mod harness;
pub use harness::{AggregateReport, HarnessReport, ThroughputHarness, WorkerResult};
