// rust/shard-core/src/storage/local.rs

//! Local filesystem storage backend implementation.
//!
//! Each volume is an ordinary directory, so one `LocalStorage` serves all of
//! them: absolute paths are used as-is and relative paths resolve against
//! the configured base path. Large files can optionally be read through a
//! memory map.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::traits::{ObjectMeta, StorageBackend, StorageReader};
use crate::config::StorageConfig;
use crate::error::{Result, ShardError};

/// `EXDEV` ("cross-device link"); 18 on Linux, macOS and the BSDs.
#[cfg(unix)]
const EXDEV: i32 = 18;

#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(EXDEV)
}

/// Cross-volume renames are only detected on Unix; elsewhere the rename
/// error is returned unchanged.
#[cfg(not(unix))]
fn is_cross_device(_err: &io::Error) -> bool {
    false
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    /// Base path for relative paths.
    base_path: PathBuf,
    /// Buffer size for buffered I/O operations.
    buffer_size: usize,
    /// Whether to use memory-mapped I/O.
    use_mmap: bool,
    /// File size threshold above which to use mmap.
    mmap_threshold: u64,
}

impl LocalStorage {
    /// Creates a new `LocalStorage` instance from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base path cannot be created.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let base_path = config.base_path.clone();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                ShardError::storage_with_source(&base_path, "failed to create base directory", e)
            })?;
        }

        Ok(Self {
            base_path,
            buffer_size: config.buffer_size,
            use_mmap: config.use_mmap,
            mmap_threshold: config.mmap_threshold,
        })
    }

    /// Resolves a path relative to the base path.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Moves a file between filesystems.
    ///
    /// The data is copied to a hidden temporary name next to the target,
    /// synced, and renamed into place before the source is removed, so the
    /// target name never holds a partial file.
    fn copy_then_remove(&self, from: &Path, to: &Path) -> Result<()> {
        if from.is_dir() {
            return Err(ShardError::storage(
                from,
                format!(
                    "cannot move directory across filesystems to {}",
                    to.display()
                ),
            ));
        }

        let file_name = to
            .file_name()
            .ok_or_else(|| ShardError::storage(to, "destination has no file name"))?;
        let temp_path = to.with_file_name(format!(".{}.partial", file_name.to_string_lossy()));

        let copied = fs::copy(from, &temp_path)
            .and_then(|_| File::open(&temp_path)?.sync_all())
            .and_then(|()| fs::rename(&temp_path, to));

        if let Err(e) = copied {
            let _ = fs::remove_file(&temp_path);
            return Err(ShardError::storage_with_source(
                from,
                format!("failed to copy to {}", to.display()),
                e,
            ));
        }

        fs::remove_file(from).map_err(|e| {
            ShardError::storage_with_source(
                from,
                format!("copied to {} but failed to remove source", to.display()),
                e,
            )
        })
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        let full_path = self.resolve_path(path);
        Ok(full_path.exists())
    }

    fn metadata(&self, path: &Path) -> Result<ObjectMeta> {
        let full_path = self.resolve_path(path);
        let meta = fs::metadata(&full_path).map_err(|e| {
            ShardError::storage_with_source(&full_path, "failed to read metadata", e)
        })?;

        Ok(ObjectMeta {
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let full_path = self.resolve_path(path);
        let file = File::open(&full_path)
            .map_err(|e| ShardError::storage_with_source(&full_path, "failed to open file", e))?;

        let meta = file.metadata().map_err(|e| {
            ShardError::storage_with_source(&full_path, "failed to read file metadata", e)
        })?;
        let size = meta.len();

        if self.use_mmap && size >= self.mmap_threshold {
            // SAFETY: The file is opened read-only and we maintain the Mmap
            // for the lifetime of the reader.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                ShardError::storage_with_source(&full_path, "failed to memory-map file", e)
            })?;

            Ok(Box::new(MmapReader::new(mmap)))
        } else {
            Ok(Box::new(LocalReader::new(file, size, self.buffer_size)))
        }
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let full_path = self.resolve_path(dir);

        if !full_path.exists() {
            return Ok(Vec::new());
        }

        if !full_path.is_dir() {
            return Err(ShardError::storage(&full_path, "path is not a directory"));
        }

        let mut entries = Vec::new();

        for entry in fs::read_dir(&full_path).map_err(|e| {
            ShardError::storage_with_source(&full_path, "failed to read directory", e)
        })? {
            let entry = entry.map_err(|e| {
                ShardError::storage_with_source(&full_path, "failed to read directory entry", e)
            })?;

            let name = entry.file_name().into_string().map_err(|_| {
                ShardError::storage(entry.path(), "entry name is not valid UTF-8")
            })?;
            entries.push(name);
        }

        entries.sort();
        Ok(entries)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.resolve_path(from);
        let to_path = self.resolve_path(to);

        match fs::rename(&from_path, &to_path) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => {
                self.copy_then_remove(&from_path, &to_path)
            }
            Err(e) => Err(ShardError::storage_with_source(
                &from_path,
                format!("failed to rename to {}", to_path.display()),
                e,
            )),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path).map_err(|e| {
            ShardError::storage_with_source(&full_path, "failed to create directories", e)
        })
    }
}

/// Buffered file reader for local storage.
struct LocalReader {
    reader: BufReader<File>,
    size: u64,
}

impl LocalReader {
    fn new(file: File, size: u64, buffer_size: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(buffer_size, file),
            size,
        }
    }
}

impl Read for LocalReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl StorageReader for LocalReader {
    fn size(&self) -> u64 {
        self.size
    }
}

/// Memory-mapped file reader for local storage.
struct MmapReader {
    mmap: Mmap,
    position: usize,
}

impl MmapReader {
    fn new(mmap: Mmap) -> Self {
        Self { mmap, position: 0 }
    }
}

impl Read for MmapReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = &self.mmap[self.position.min(self.mmap.len())..];
        let to_read = buf.len().min(remaining.len());

        if to_read == 0 {
            return Ok(0);
        }

        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.position += to_read;
        Ok(to_read)
    }
}

impl StorageReader for MmapReader {
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (LocalStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            buffer_size: 4096,
            use_mmap: true,
            mmap_threshold: 1024, // Low threshold for testing
        };
        let storage = LocalStorage::new(&config).unwrap();
        (storage, temp_dir)
    }

    fn write_file(storage: &LocalStorage, path: &str, data: &[u8]) {
        let full_path = storage.resolve_path(Path::new(path));
        fs::create_dir_all(full_path.parent().unwrap()).unwrap();
        fs::write(full_path, data).unwrap();
    }

    #[test]
    fn test_new_creates_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let new_base = temp_dir.path().join("new_subdir");

        let config = StorageConfig {
            base_path: new_base.clone(),
            ..Default::default()
        };

        let _storage = LocalStorage::new(&config).unwrap();
        assert!(new_base.exists());
    }

    #[test]
    fn test_exists_file() {
        let (storage, _temp) = create_test_storage();

        assert!(!storage.exists(Path::new("test.txt")).unwrap());
        write_file(&storage, "test.txt", b"hello");
        assert!(storage.exists(Path::new("test.txt")).unwrap());
    }

    #[test]
    fn test_absolute_paths_bypass_base() {
        let (storage, _temp) = create_test_storage();
        let other = TempDir::new().unwrap();
        let absolute = other.path().join("elsewhere.txt");

        fs::write(&absolute, b"data").unwrap();

        assert!(storage.exists(&absolute).unwrap());
        assert_eq!(storage.metadata(&absolute).unwrap().size, 4);
        assert!(!storage.exists(Path::new("elsewhere.txt")).unwrap());
    }

    #[test]
    fn test_metadata_file() {
        let (storage, _temp) = create_test_storage();

        let data = b"hello world";
        write_file(&storage, "test.txt", data);

        let meta = storage.metadata(Path::new("test.txt")).unwrap();
        assert_eq!(meta.size, data.len() as u64);
        assert!(!meta.is_dir);
    }

    #[test]
    fn test_metadata_directory() {
        let (storage, _temp) = create_test_storage();

        storage.create_dir_all(Path::new("subdir")).unwrap();

        let meta = storage.metadata(Path::new("subdir")).unwrap();
        assert!(meta.is_dir);
    }

    #[test]
    fn test_metadata_not_found() {
        let (storage, _temp) = create_test_storage();

        let result = storage.metadata(Path::new("nonexistent.txt"));
        assert!(matches!(result, Err(ShardError::Storage { .. })));
    }

    #[test]
    fn test_write_and_read_small_file() {
        let (storage, _temp) = create_test_storage();

        // Below the mmap threshold
        let data = b"hello world";
        write_file(&storage, "small.txt", data);

        let mut reader = storage.open_read(Path::new("small.txt")).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();

        assert_eq!(buf, data);
        assert_eq!(reader.size(), data.len() as u64);
    }

    #[test]
    fn test_write_and_read_large_file() {
        let (storage, _temp) = create_test_storage();

        // Above the mmap threshold of 1024 bytes
        let data: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();
        write_file(&storage, "large.bin", &data);

        let mut reader = storage.open_read(Path::new("large.bin")).unwrap();
        assert_eq!(reader.size(), 5000);

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_mmap_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            use_mmap: false,
            ..Default::default()
        };
        let storage = LocalStorage::new(&config).unwrap();

        let data = vec![7u8; 4 * 1024 * 1024];
        write_file(&storage, "big.bin", &data);

        let mut reader = storage.open_read(Path::new("big.bin")).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf.len(), data.len());
    }

    #[test]
    fn test_open_read_not_found() {
        let (storage, _temp) = create_test_storage();

        let result = storage.open_read(Path::new("missing.bin"));
        assert!(result.is_err());
    }

    #[test]
    fn test_list_empty_directory() {
        let (storage, _temp) = create_test_storage();

        storage.create_dir_all(Path::new("empty")).unwrap();
        assert!(storage.list(Path::new("empty")).unwrap().is_empty());
    }

    #[test]
    fn test_list_is_sorted() {
        let (storage, _temp) = create_test_storage();

        write_file(&storage, "dir/c.txt", b"c");
        write_file(&storage, "dir/a.txt", b"a");
        write_file(&storage, "dir/b.txt", b"b");
        storage.create_dir_all(Path::new("dir/nested")).unwrap();

        let entries = storage.list(Path::new("dir")).unwrap();
        assert_eq!(entries, vec!["a.txt", "b.txt", "c.txt", "nested"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_list_rejects_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (storage, temp) = create_test_storage();

        write_file(&storage, "dir/a.txt", b"a");
        let odd = temp.path().join("dir").join(OsStr::from_bytes(b"notes-\xff.txt"));
        if fs::write(&odd, b"x").is_err() {
            // Filesystem refuses non-UTF-8 names
            return;
        }

        let err = storage.list(Path::new("dir")).unwrap_err();
        assert!(matches!(err, ShardError::Storage { .. }));
        assert_eq!(err.path(), Some(odd.as_path()));
    }

    #[test]
    fn test_list_nonexistent() {
        let (storage, _temp) = create_test_storage();

        assert!(storage.list(Path::new("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_list_file_not_dir() {
        let (storage, _temp) = create_test_storage();

        write_file(&storage, "file.txt", b"x");
        assert!(storage.list(Path::new("file.txt")).is_err());
    }

    #[test]
    fn test_rename_file() {
        let (storage, _temp) = create_test_storage();

        write_file(&storage, "src/shard.bin", b"payload");
        storage.create_dir_all(Path::new("dst")).unwrap();

        storage
            .rename(Path::new("src/shard.bin"), Path::new("dst/shard.bin"))
            .unwrap();

        assert!(!storage.exists(Path::new("src/shard.bin")).unwrap());
        let mut reader = storage.open_read(Path::new("dst/shard.bin")).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"payload");
    }

    #[test]
    fn test_rename_directory() {
        let (storage, _temp) = create_test_storage();

        write_file(&storage, "src/tokenizer/vocab.json", b"{}");
        storage.create_dir_all(Path::new("dst")).unwrap();

        storage
            .rename(Path::new("src/tokenizer"), Path::new("dst/tokenizer"))
            .unwrap();

        assert!(storage.exists(Path::new("dst/tokenizer/vocab.json")).unwrap());
    }

    #[test]
    fn test_rename_not_found() {
        let (storage, _temp) = create_test_storage();

        let result = storage.rename(Path::new("missing"), Path::new("other"));
        assert!(matches!(result, Err(ShardError::Storage { .. })));
    }

    #[test]
    fn test_rename_missing_destination_dir() {
        let (storage, _temp) = create_test_storage();

        write_file(&storage, "a.bin", b"a");

        // Destination directories are created by the caller, never implicitly
        let result = storage.rename(Path::new("a.bin"), Path::new("no/such/dir/a.bin"));
        assert!(result.is_err());
        assert!(storage.exists(Path::new("a.bin")).unwrap());
    }

    #[test]
    fn test_copy_then_remove() {
        let (storage, temp) = create_test_storage();

        write_file(&storage, "src/shard.bin", b"across volumes");
        storage.create_dir_all(Path::new("dst")).unwrap();

        let from = temp.path().join("src/shard.bin");
        let to = temp.path().join("dst/shard.bin");
        storage.copy_then_remove(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"across volumes");
        assert!(!temp.path().join("dst/.shard.bin.partial").exists());
    }

    #[test]
    fn test_copy_then_remove_failure_leaves_source() {
        let (storage, temp) = create_test_storage();

        write_file(&storage, "src/shard.bin", b"keep me");

        let from = temp.path().join("src/shard.bin");
        let to = temp.path().join("missing/shard.bin");
        assert!(storage.copy_then_remove(&from, &to).is_err());

        assert_eq!(fs::read(&from).unwrap(), b"keep me");
    }

    #[test]
    fn test_create_dir_all_existing() {
        let (storage, _temp) = create_test_storage();

        storage.create_dir_all(Path::new("a/b/c")).unwrap();
        storage.create_dir_all(Path::new("a/b/c")).unwrap();
        assert!(storage.metadata(Path::new("a/b/c")).unwrap().is_dir);
    }
}
