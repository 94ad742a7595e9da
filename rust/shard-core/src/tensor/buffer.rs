// rust/shard-core/src/tensor/buffer.rs

//! In-memory named-buffer map of one shard.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;
use twox_hash::XxHash64;

use crate::error::{Result, ShardError};

/// Supported buffer element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Bool,
    U8,
    I8,
    F8E4M3,
    F8E5M2,
    I16,
    U16,
    F16,
    BF16,
    I32,
    U32,
    F32,
    I64,
    U64,
    F64,
}

impl ElementKind {
    /// Size of one element in bytes.
    pub const fn byte_width(self) -> usize {
        match self {
            Self::Bool | Self::U8 | Self::I8 | Self::F8E4M3 | Self::F8E5M2 => 1,
            Self::I16 | Self::U16 | Self::F16 | Self::BF16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::F8E4M3 => "f8_e4m3",
            Self::F8E5M2 => "f8_e5m2",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type and location of one named buffer inside a shard's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorBuffer {
    kind: ElementKind,
    shape: Vec<usize>,
    range: Range<usize>,
}

impl TensorBuffer {
    pub fn new(kind: ElementKind, shape: Vec<usize>, range: Range<usize>) -> Self {
        Self { kind, shape, range }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Product of the shape; a scalar has one element.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// `element_count * byte_width`.
    pub fn byte_size(&self) -> u64 {
        (self.element_count() * self.kind.byte_width()) as u64
    }
}

/// A shard read fully into memory together with its buffer map.
#[derive(Debug)]
pub struct LoadedShard {
    path: PathBuf,
    data: Vec<u8>,
    buffers: BTreeMap<String, TensorBuffer>,
}

impl LoadedShard {
    /// Creates a loaded shard, checking that every buffer lies inside `data`
    /// and spans exactly its declared size.
    ///
    /// # Errors
    ///
    /// Returns a data integrity error naming the first inconsistent buffer.
    pub fn new(
        path: impl Into<PathBuf>,
        data: Vec<u8>,
        buffers: BTreeMap<String, TensorBuffer>,
    ) -> Result<Self> {
        let path = path.into();

        for (name, buffer) in &buffers {
            if buffer.range.start > buffer.range.end || buffer.range.end > data.len() {
                return Err(ShardError::data_integrity(
                    &path,
                    format!(
                        "buffer '{}' range {:?} exceeds {} bytes of data",
                        name,
                        buffer.range,
                        data.len()
                    ),
                ));
            }
            if buffer.range.len() as u64 != buffer.byte_size() {
                return Err(ShardError::data_integrity(
                    &path,
                    format!(
                        "buffer '{}' holds {} bytes but {} x {:?} {} needs {}",
                        name,
                        buffer.range.len(),
                        buffer.element_count(),
                        buffer.shape,
                        buffer.kind,
                        buffer.byte_size()
                    ),
                ));
            }
        }

        Ok(Self {
            path,
            data,
            buffers,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Iterates buffers in name order.
    pub fn buffers(&self) -> impl Iterator<Item = BufferView<'_>> {
        self.buffers.iter().map(|(name, buffer)| BufferView {
            name,
            buffer,
            data: &self.data[buffer.range.clone()],
        })
    }

    pub fn get(&self, name: &str) -> Option<BufferView<'_>> {
        self.buffers.get_key_value(name).map(|(name, buffer)| BufferView {
            name,
            buffer,
            data: &self.data[buffer.range.clone()],
        })
    }

    /// Sum of all buffer sizes.
    pub fn byte_size(&self) -> u64 {
        self.buffers.values().map(TensorBuffer::byte_size).sum()
    }
}

/// Borrowed view of one buffer.
#[derive(Debug, Clone, Copy)]
pub struct BufferView<'a> {
    name: &'a str,
    buffer: &'a TensorBuffer,
    data: &'a [u8],
}

impl<'a> BufferView<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn kind(&self) -> ElementKind {
        self.buffer.kind
    }

    pub fn shape(&self) -> &'a [usize] {
        &self.buffer.shape
    }

    pub fn element_count(&self) -> usize {
        self.buffer.element_count()
    }

    pub fn byte_size(&self) -> u64 {
        self.buffer.byte_size()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Touches every byte of the buffer and returns its XxHash64.
    ///
    /// Reading every byte forces pages of a lazily mapped or copy-on-write
    /// buffer into memory.
    pub fn materialize(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(self.data);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_buffer(kind: ElementKind, shape: Vec<usize>, data: Vec<u8>) -> Result<LoadedShard> {
        let len = data.len();
        let mut buffers = BTreeMap::new();
        buffers.insert("w".to_string(), TensorBuffer::new(kind, shape, 0..len));
        LoadedShard::new("mem.safetensors", data, buffers)
    }

    #[test]
    fn test_byte_widths() {
        assert_eq!(ElementKind::Bool.byte_width(), 1);
        assert_eq!(ElementKind::BF16.byte_width(), 2);
        assert_eq!(ElementKind::F32.byte_width(), 4);
        assert_eq!(ElementKind::I64.byte_width(), 8);
        assert_eq!(ElementKind::F8E4M3.to_string(), "f8_e4m3");
    }

    #[test]
    fn test_element_count_and_size() {
        let buffer = TensorBuffer::new(ElementKind::F16, vec![4, 8], 0..64);
        assert_eq!(buffer.element_count(), 32);
        assert_eq!(buffer.byte_size(), 64);

        let scalar = TensorBuffer::new(ElementKind::F64, vec![], 0..8);
        assert_eq!(scalar.element_count(), 1);
        assert_eq!(scalar.byte_size(), 8);
    }

    #[test]
    fn test_loaded_shard_views() {
        let shard = single_buffer(ElementKind::F32, vec![2, 2], vec![1u8; 16]).unwrap();

        assert_eq!(shard.len(), 1);
        assert_eq!(shard.byte_size(), 16);
        let view = shard.get("w").unwrap();
        assert_eq!(view.kind(), ElementKind::F32);
        assert_eq!(view.shape(), &[2, 2]);
        assert_eq!(view.bytes().len(), 16);
        assert!(shard.get("missing").is_none());
    }

    #[test]
    fn test_materialize_is_deterministic() {
        let a = single_buffer(ElementKind::U8, vec![4], vec![1, 2, 3, 4]).unwrap();
        let b = single_buffer(ElementKind::U8, vec![4], vec![1, 2, 3, 4]).unwrap();
        let c = single_buffer(ElementKind::U8, vec![4], vec![4, 3, 2, 1]).unwrap();

        let hash = |s: &LoadedShard| s.get("w").unwrap().materialize();
        assert_eq!(hash(&a), hash(&b));
        assert_ne!(hash(&a), hash(&c));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let result = single_buffer(ElementKind::F32, vec![3], vec![0u8; 8]);
        assert!(matches!(result, Err(ShardError::DataIntegrity { .. })));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut buffers = BTreeMap::new();
        buffers.insert(
            "w".to_string(),
            TensorBuffer::new(ElementKind::U8, vec![8], 4..12),
        );
        let result = LoadedShard::new("mem", vec![0u8; 8], buffers);
        assert!(matches!(result, Err(ShardError::DataIntegrity { .. })));
    }
}
