// rust/shard-core/src/tensor/loader.rs

//! Shard deserialization.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use safetensors::{Dtype, SafeTensors};

use super::buffer::{ElementKind, LoadedShard, TensorBuffer};
use crate::error::{Result, ShardError};
use crate::storage::StorageBackend;

/// Length of the little-endian header size prefix.
const HEADER_SIZE_LEN: usize = 8;

/// Opens a shard and returns its fully loaded named-buffer map.
pub trait ShardLoader: Send + Sync {
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read and a data
    /// integrity error if its content is malformed.
    fn load(&self, path: &Path) -> Result<LoadedShard>;
}

/// Loads `.safetensors` shards through a storage backend.
///
/// The whole file is read into an owned buffer before parsing, so timings
/// cover the full transfer rather than a lazy mapping.
pub struct SafetensorsLoader {
    storage: Arc<dyn StorageBackend>,
}

impl SafetensorsLoader {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    fn read_fully(&self, path: &Path) -> Result<Vec<u8>> {
        let mut reader = self.storage.open_read(path)?;
        let mut data = Vec::with_capacity(reader.size() as usize);
        reader
            .read_to_end(&mut data)
            .map_err(|e| ShardError::storage_with_source(path, "failed to read shard", e))?;
        Ok(data)
    }
}

impl ShardLoader for SafetensorsLoader {
    fn load(&self, path: &Path) -> Result<LoadedShard> {
        let data = self.read_fully(path)?;

        // Validates the header, the offsets and the total buffer length
        let (header_len, metadata) = SafeTensors::read_metadata(&data).map_err(|e| {
            ShardError::data_integrity(path, format!("invalid safetensors header: {e:?}"))
        })?;
        let data_start = HEADER_SIZE_LEN + header_len;

        let mut buffers = BTreeMap::new();
        for (name, info) in metadata.tensors() {
            let kind = element_kind(info.dtype).ok_or_else(|| {
                ShardError::data_integrity(
                    path,
                    format!("tensor '{}' has unsupported dtype {:?}", name, info.dtype),
                )
            })?;
            let (begin, end) = info.data_offsets;
            buffers.insert(
                name,
                TensorBuffer::new(kind, info.shape.clone(), data_start + begin..data_start + end),
            );
        }

        LoadedShard::new(path, data, buffers)
    }
}

fn element_kind(dtype: Dtype) -> Option<ElementKind> {
    let kind = match dtype {
        Dtype::BOOL => ElementKind::Bool,
        Dtype::U8 => ElementKind::U8,
        Dtype::I8 => ElementKind::I8,
        Dtype::F8_E4M3 => ElementKind::F8E4M3,
        Dtype::F8_E5M2 => ElementKind::F8E5M2,
        Dtype::I16 => ElementKind::I16,
        Dtype::U16 => ElementKind::U16,
        Dtype::F16 => ElementKind::F16,
        Dtype::BF16 => ElementKind::BF16,
        Dtype::I32 => ElementKind::I32,
        Dtype::U32 => ElementKind::U32,
        Dtype::F32 => ElementKind::F32,
        Dtype::I64 => ElementKind::I64,
        Dtype::U64 => ElementKind::U64,
        Dtype::F64 => ElementKind::F64,
        _ => return None,
    };
    Some(kind)
}
