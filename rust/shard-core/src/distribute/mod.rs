// rust/shard-core/src/distribute/mod.rs

//! Balanced redistribution of a shard directory across volumes.
//!
//! # Example
//!
//! ```no_run
//! use shard_core::config::StorageConfig;
//! use shard_core::distribute::Distributor;
//! use shard_core::storage::LocalStorage;
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(LocalStorage::new(&StorageConfig::default()).unwrap());
//! let distributor = Distributor::new(storage, ".safetensors");
//!
//! let destinations = vec![
//!     PathBuf::from("/mnt/raid0n0/model"),
//!     PathBuf::from("/mnt/raid0n1/model"),
//! ];
//! let report = distributor
//!     .distribute(Path::new("/data/model"), &destinations)
//!     .unwrap();
//! println!("moved {} entries", report.total_moves());
//! ```

mod distributor;
mod split;

pub use distributor::{
    DestinationPlan, DestinationSummary, DistributionPlan, DistributionReport, Distributor,
};
pub use split::{split_counts, split_ranges};
