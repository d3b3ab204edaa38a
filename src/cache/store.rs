//! Key/value backends for [`PersistentCache`](super::PersistentCache).
//!
//! Both backends enforce an optional byte quota so the cache behaves like
//! bounded client storage: a write that would exceed the quota fails with
//! [`StorageError::Full`] instead of growing without limit.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

const ENTRY_EXTENSION: &str = "json";
/// Bytes of the readable, encoded key kept in a filename.
const FILENAME_PREFIX_LEN: usize = 96;
/// Hex digits of the key digest appended to the filename prefix.
const FILENAME_DIGEST_LEN: usize = 16;

/// Raw string storage addressed by key.
pub trait CacheStore: Send + 'static {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

fn check_quota(max_bytes: Option<usize>, used: usize, needed: usize) -> Result<(), StorageError> {
    match max_bytes {
        Some(max) if used + needed > max => Err(StorageError::Full {
            needed,
            available: max.saturating_sub(used),
        }),
        _ => Ok(()),
    }
}

/// In-process store, mostly useful for tests and short-lived sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    max_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once keys plus values exceed `max_bytes`.
    pub fn with_quota(max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_bytes: Some(max_bytes),
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl CacheStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let replaced = self.entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        let used = self.used_bytes() - replaced;
        check_quota(self.max_bytes, used, key.len() + value.len())?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// One file per entry under a directory.
///
/// Filenames are a bounded, readable prefix of the encoded key plus a digest
/// of the whole key, so long keys stay under filesystem name limits. The first
/// line of every file holds the encoded key itself, which is what `keys`
/// reports and what `read` checks against.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    max_bytes: Option<usize>,
}

impl FileStore {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_bytes: None,
        }
    }

    pub fn with_quota(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(entry_filename(key))
    }

    fn used_bytes_excluding(&self, skip: &Path) -> Result<usize, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut used = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path == skip {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                used += meta.len() as usize;
            }
        }
        Ok(used)
    }
}

impl CacheStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let contents = match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match split_entry(&contents) {
            Some((stored_key, value)) if stored_key == key => Ok(Some(value.to_string())),
            _ => Ok(None),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let contents = format!("{}\n{}", urlencoding::encode(key), value);
        if self.max_bytes.is_some() {
            let used = self.used_bytes_excluding(&path)?;
            check_quota(self.max_bytes, used, contents.len())?;
        }
        fs::create_dir_all(&self.dir)?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let keys = entries
            .flatten()
            .filter(|entry| {
                entry.path().extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION)
            })
            .filter_map(|entry| {
                let contents = fs::read_to_string(entry.path()).ok()?;
                split_entry(&contents).map(|(key, _)| key)
            })
            .collect();
        Ok(keys)
    }
}

/// `<encoded key prefix>-<key digest>.json`, never longer than 128 bytes.
fn entry_filename(key: &str) -> String {
    let encoded = urlencoding::encode(key);
    // Percent-encoded output is ASCII, so any byte offset is a char boundary
    let prefix = &encoded[..encoded.len().min(FILENAME_PREFIX_LEN)];
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    format!(
        "{}-{}.{}",
        prefix,
        &digest[..FILENAME_DIGEST_LEN],
        ENTRY_EXTENSION
    )
}

/// Split a stored file into its decoded key line and the value after it.
fn split_entry(contents: &str) -> Option<(String, &str)> {
    let (encoded_key, value) = contents.split_once('\n')?;
    let key = urlencoding::decode(encoded_key).ok()?;
    Some((key.into_owned(), value))
}
