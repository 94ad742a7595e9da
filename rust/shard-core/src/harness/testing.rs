// rust/shard-core/src/harness/testing.rs

//! In-memory loader for harness tests.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Result, ShardError};
use crate::tensor::{ElementKind, LoadedShard, ShardLoader, TensorBuffer};

/// Serves single-buffer `u8` shards of fixed sizes and records load order.
pub(crate) struct SizedLoader {
    sizes: HashMap<String, u64>,
    fail_on: Option<String>,
    panic_on: Option<String>,
    loaded: Mutex<Vec<String>>,
}

impl SizedLoader {
    pub(crate) fn new(shards: &[(&str, u64)]) -> Self {
        Self {
            sizes: shards.iter().map(|(p, s)| (p.to_string(), *s)).collect(),
            fail_on: None,
            panic_on: None,
            loaded: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_on(mut self, path: &str) -> Self {
        self.fail_on = Some(path.to_string());
        self
    }

    pub(crate) fn panicking_on(mut self, path: &str) -> Self {
        self.panic_on = Some(path.to_string());
        self
    }

    pub(crate) fn loaded(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }
}

impl ShardLoader for SizedLoader {
    fn load(&self, path: &Path) -> Result<LoadedShard> {
        let key = path.to_string_lossy().into_owned();
        self.loaded.lock().unwrap().push(key.clone());

        if self.panic_on.as_deref() == Some(key.as_str()) {
            panic!("injected panic loading {key}");
        }
        if self.fail_on.as_deref() == Some(key.as_str()) {
            return Err(ShardError::storage(path, "injected read failure"));
        }

        let size = *self
            .sizes
            .get(&key)
            .ok_or_else(|| ShardError::storage(path, "no such shard"))?;
        let mut buffers = BTreeMap::new();
        buffers.insert(
            "data".to_string(),
            TensorBuffer::new(ElementKind::U8, vec![size as usize], 0..size as usize),
        );
        LoadedShard::new(path, vec![0xAB; size as usize], buffers)
    }
}
