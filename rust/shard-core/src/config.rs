// rust/shard-core/src/config.rs

//! Configuration management for the shard tooling.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, ShardError};

/// File suffix that marks a tensor shard.
pub const DEFAULT_SHARD_SUFFIX: &str = ".safetensors";

// Top-level tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub storage: StorageConfig,
    pub distribute: DistributeConfig,
    pub bench: BenchConfig,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path that relative paths are resolved against.
    pub base_path: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to read large files through a memory map.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

/// Options for redistributing a directory across volumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributeConfig {
    /// Names ending with this suffix are treated as tensor shards.
    pub shard_suffix: String,
}

/// Options for the per-volume throughput benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Names ending with this suffix are loaded as shards.
    pub shard_suffix: String,
    /// Exact number of shards each volume must hold, if enforced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_shards_per_volume: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: false,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

impl Default for DistributeConfig {
    fn default() -> Self {
        Self {
            shard_suffix: DEFAULT_SHARD_SUFFIX.to_string(),
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            shard_suffix: DEFAULT_SHARD_SUFFIX.to_string(),
            expected_shards_per_volume: None,
        }
    }
}

impl FromStr for ToolConfig {
    type Err = ShardError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| ShardError::config_with_source("failed to parse TOML config", e))
    }
}

impl ToolConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShardError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `SHARDTOOL_` and use underscores
    // to separate nested fields. For example:
    // - `SHARDTOOL_STORAGE_BASE_PATH` overrides `storage.base_path`
    // - `SHARDTOOL_DISTRIBUTE_SHARD_SUFFIX` overrides `distribute.shard_suffix`
    // - `SHARDTOOL_BENCH_EXPECTED_SHARDS` overrides `bench.expected_shards_per_volume`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("SHARDTOOL_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SHARDTOOL_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("SHARDTOOL_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("SHARDTOOL_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        // Distribute overrides
        if let Ok(val) = std::env::var("SHARDTOOL_DISTRIBUTE_SHARD_SUFFIX") {
            self.distribute.shard_suffix = val;
        }

        // Bench overrides
        if let Ok(val) = std::env::var("SHARDTOOL_BENCH_SHARD_SUFFIX") {
            self.bench.shard_suffix = val;
        }
        if let Ok(val) = std::env::var("SHARDTOOL_BENCH_EXPECTED_SHARDS") {
            if let Ok(v) = val.parse() {
                self.bench.expected_shards_per_volume = Some(v);
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.buffer_size == 0 {
            return Err(ShardError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        if self.distribute.shard_suffix.is_empty() {
            return Err(ShardError::config(
                "distribute.shard_suffix must not be empty",
            ));
        }

        if self.bench.shard_suffix.is_empty() {
            return Err(ShardError::config("bench.shard_suffix must not be empty"));
        }

        if self.bench.expected_shards_per_volume == Some(0) {
            return Err(ShardError::config(
                "bench.expected_shards_per_volume must be greater than 0",
            ));
        }

        Ok(())
    }
}
