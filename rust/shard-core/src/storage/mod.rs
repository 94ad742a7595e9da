// rust/shard-core/src/storage/mod.rs

//! Storage abstraction for shard volumes.
//!
//! The distributor needs four filesystem operations (list, exists, create a
//! directory tree, move) and the throughput harness needs one (read a file
//! fully). Both go through [`StorageBackend`] so tests can inject failures.
//!
//! # Example
//!
//! ```no_run
//! use shard_core::config::StorageConfig;
//! use shard_core::storage::{LocalStorage, StorageBackend};
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default()).unwrap();
//! storage.create_dir_all(Path::new("/mnt/raid0n1/model")).unwrap();
//! for name in storage.list(Path::new("/mnt/raid0n0/model")).unwrap() {
//!     println!("{name}");
//! }
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{ObjectMeta, StorageBackend, StorageReader};
