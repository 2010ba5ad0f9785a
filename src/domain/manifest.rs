//! Unit file manifests
//!
//! A manifest is an ordered set of (destination-relative path, content
//! digest) pairs. Manifests either arrive pre-computed from the catalog
//! collaborator or are scanned from a unit's materialized directory.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::Result;
use crate::hash::HashCache;
use crate::path_utils::{normalize_rel_path, to_forward_slashes};

/// Packaging metadata files that are never deployed
const METADATA_FILES: &[&str] = &["manifest.json", "icon.png", "README.md", "CHANGELOG.md"];

/// One deployable file: destination-relative path and content digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Normalized destination-relative path (forward slashes)
    pub path: String,
    /// Content digest of the file bytes (`blake3:`-prefixed hex)
    pub digest: String,
}

/// Ordered set of manifest entries, sorted by destination path
#[derive(Debug, Clone, Default)]
pub struct UnitManifest {
    entries: Vec<ManifestEntry>,
}

impl UnitManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manifest by scanning a unit's materialized directory
    ///
    /// Walks `root` recursively, skipping packaging metadata files, and
    /// hashes every file through the shared cache. Paths are stored relative
    /// to `root`, normalized, and sorted so the same tree always produces
    /// the same manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the walk fails or a file cannot be read.
    pub fn scan(root: &Path, cache: &mut HashCache) -> Result<Self> {
        let mut manifest = Self::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if METADATA_FILES.contains(&name.as_ref()) {
                continue;
            }

            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let path = normalize_rel_path(&to_forward_slashes(rel))?;
            let digest = cache.hash_file(entry.path())?;
            manifest.insert(path, digest);
        }

        Ok(manifest)
    }

    /// Insert an entry, keeping the set sorted and paths unique
    /// (a later insert for the same path replaces the earlier one)
    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) {
        let entry = ManifestEntry {
            path: path.into(),
            digest: digest.into(),
        };
        match self.entries.binary_search_by(|e| e.path.cmp(&entry.path)) {
            Ok(idx) => self.entries[idx] = entry,
            Err(idx) => self.entries.insert(idx, entry),
        }
    }

    /// Digest recorded for a destination path, if present
    pub fn digest_for(&self, path: &str) -> Option<&str> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|idx| self.entries[idx].digest.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a UnitManifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
