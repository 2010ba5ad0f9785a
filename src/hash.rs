//! BLAKE3 content digests for change detection and integrity verification
//!
//! Digest comparison is the sole basis for change detection: modification
//! time and size are never trusted alone. The [`HashCache`] uses stat data
//! only to decide whether a cached digest is still fresh; any difference
//! causes a re-hash of the actual bytes.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use blake3::Hasher;

use crate::error::{ModforgeError, Result};

/// Hash prefix for BLAKE3 digests
pub const HASH_PREFIX: &str = "blake3:";

/// Default capacity for [`HashCache`]
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Calculate the BLAKE3 digest of a file's bytes
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| ModforgeError::FileReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut reader = BufReader::new(file);
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| ModforgeError::FileReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

/// Calculate the BLAKE3 digest of an in-memory byte slice
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex())
}

/// Verify two digests match, tolerating a missing prefix on either side
pub fn verify_digest(expected: &str, actual: &str) -> bool {
    let normalize = |h: &str| {
        if h.starts_with(HASH_PREFIX) {
            h.to_string()
        } else {
            format!("{}{}", HASH_PREFIX, h)
        }
    };

    normalize(expected) == normalize(actual)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    digest: String,
    mtime: SystemTime,
    len: u64,
    last_used: u64,
}

/// Bounded LRU cache of file digests
///
/// Explicit and passed by reference where needed, never ambient global
/// state. A cached digest is returned only when the file's modification
/// time and size still match the values recorded when it was hashed.
#[derive(Debug)]
pub struct HashCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<PathBuf, CacheEntry>,
}

impl Default for HashCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl HashCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            entries: HashMap::new(),
        }
    }

    /// Cached digest for `path`, if present and still fresh
    pub fn get(&mut self, path: &Path) -> Option<String> {
        let (mtime, len) = stat(path)?;

        let stale = {
            let entry = self.entries.get(path)?;
            entry.mtime != mtime || entry.len != len
        };
        if stale {
            self.entries.remove(path);
            return None;
        }

        self.tick += 1;
        let entry = self.entries.get_mut(path)?;
        entry.last_used = self.tick;
        Some(entry.digest.clone())
    }

    /// Record a digest for `path` with its current stat data
    pub fn put(&mut self, path: &Path, digest: String) {
        let Some((mtime, len)) = stat(path) else {
            return;
        };

        self.tick += 1;
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                digest,
                mtime,
                len,
                last_used: self.tick,
            },
        );

        if self.entries.len() > self.capacity {
            self.evict_least_recently_used();
        }
    }

    /// Cached digest or a fresh hash of the file's bytes
    pub fn hash_file(&mut self, path: &Path) -> Result<String> {
        if let Some(digest) = self.get(path) {
            return Ok(digest);
        }

        let digest = hash_file(path)?;
        self.put(path, digest.clone());
        Ok(digest)
    }

    /// Drop the cached digest for `path`
    pub fn invalidate(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_least_recently_used(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(path, _)| path.clone());
        if let Some(path) = oldest {
            self.entries.remove(&path);
        }
    }
}

fn stat(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?;
    Some((mtime, meta.len()))
}
