// rust/shard-core/src/tensor/mod.rs

//! Named-buffer maps loaded from shard files.
//!
//! A [`ShardLoader`] turns a path into a [`LoadedShard`]: the file's bytes
//! plus a map from buffer name to element kind, shape and byte range. Byte
//! size and materialization are total operations on every buffer.

mod buffer;
mod loader;

pub use buffer::{BufferView, ElementKind, LoadedShard, TensorBuffer};
pub use loader::{SafetensorsLoader, ShardLoader};
