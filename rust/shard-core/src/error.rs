// rust/shard-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardError {

    #[error("Precondition failed: {message}")]
    Precondition {
        message: String,
    },

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Malformed shard '{path}': {message}")]
    DataIntegrity {
        path: PathBuf,
        message: String,
    },

    #[error("Distribution interrupted after {completed} completed moves: {source}")]
    PartialDistribution {
        completed: usize,
        #[source]
        source: Box<ShardError>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, ShardError>;

// Convenience constructors
impl ShardError {

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn data_integrity(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn partial_distribution(completed: usize, source: ShardError) -> Self {
        Self::PartialDistribution {
            completed,
            source: Box::new(source),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true for failures of the I/O class: storage errors and
    /// malformed shard content, including those that interrupted a
    /// distribution.
    pub fn is_io_class(&self) -> bool {
        match self {
            Self::Storage { .. } | Self::DataIntegrity { .. } => true,
            Self::PartialDistribution { source, .. } => source.is_io_class(),
            Self::Precondition { .. } | Self::Config { .. } => false,
        }
    }

    /// Path of the file the error refers to, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Storage { path, .. } | Self::DataIntegrity { path, .. } => Some(path),
            Self::PartialDistribution { source, .. } => source.path(),
            Self::Precondition { .. } | Self::Config { .. } => None,
        }
    }
}
