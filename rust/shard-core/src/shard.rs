// rust/shard-core/src/shard.rs

//! Shard files and the per-volume sets they are grouped into.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, ShardError};
use crate::storage::StorageBackend;

/// Returns true if `name` carries the shard suffix.
pub fn is_shard_name(name: &str, suffix: &str) -> bool {
    name.len() > suffix.len() && name.ends_with(suffix)
}

/// Extracts the shard number embedded in a file name.
///
/// The number is the first run of ASCII digits, so
/// `model-00003-of-00016.safetensors` yields 3.
pub fn parse_shard_index(name: &str) -> Option<u32> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: &str = &name[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// One shard file on one volume.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ShardFile {
    pub path: PathBuf,
    pub shard_index: Option<u32>,
}

impl ShardFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let shard_index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_shard_index);
        Self { path, shard_index }
    }

    /// File name component, lossily converted.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Ordered shards assigned to one volume.
///
/// Entries are always held in lexical path order, which is the order the
/// harness reads them in.
#[derive(Debug, Clone)]
pub struct VolumeShardSet {
    label: String,
    shards: Vec<ShardFile>,
}

impl VolumeShardSet {
    /// Creates a set, sorting and de-duplicating the shards by path.
    pub fn new(label: impl Into<String>, mut shards: Vec<ShardFile>) -> Self {
        shards.sort_by(|a, b| a.path.cmp(&b.path));
        shards.dedup_by(|a, b| a.path == b.path);
        Self {
            label: label.into(),
            shards,
        }
    }

    /// Builds a set from bare paths.
    pub fn from_paths<P: Into<PathBuf>>(
        label: impl Into<String>,
        paths: impl IntoIterator<Item = P>,
    ) -> Self {
        Self::new(label, paths.into_iter().map(ShardFile::new).collect())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn shards(&self) -> &[ShardFile] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

/// Contents of one volume directory as seen by the benchmark.
#[derive(Debug, Clone)]
pub struct VolumeListing {
    pub shards: VolumeShardSet,
    /// Regular files that are not shards (configs, tokenizer files, ...).
    pub other_files: Vec<String>,
}

/// Lists a volume directory and collects its shards in load order.
///
/// # Errors
///
/// Returns a precondition error if the directory is missing or, when
/// `expected` is given, holds a different number of shards.
pub fn discover_volume(
    storage: &dyn StorageBackend,
    dir: &Path,
    label: impl Into<String>,
    suffix: &str,
    expected: Option<usize>,
) -> Result<VolumeListing> {
    if !storage.exists(dir)? {
        return Err(ShardError::precondition(format!(
            "volume directory {} does not exist",
            dir.display()
        )));
    }

    let mut shards = Vec::new();
    let mut other_files = Vec::new();

    for name in storage.list(dir)? {
        let path = dir.join(&name);
        if is_shard_name(&name, suffix) {
            shards.push(ShardFile::new(path));
        } else if !storage.metadata(&path)?.is_dir {
            other_files.push(name);
        }
    }

    if let Some(expected) = expected {
        if shards.len() != expected {
            return Err(ShardError::precondition(format!(
                "expected {} shards in {}, found {}",
                expected,
                dir.display(),
                shards.len()
            )));
        }
    }

    Ok(VolumeListing {
        shards: VolumeShardSet::new(label, shards),
        other_files,
    })
}
