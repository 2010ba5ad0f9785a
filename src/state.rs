//! Persisted deployment state
//!
//! The state file is the record of what a profile's last committed
//! deployment put on disk: destination-relative path, content digest and
//! owning unit per file. It is read before planning and rewritten
//! atomically at commit; a deployment that fails and rolls back leaves the
//! previous file untouched.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::domain::UnitId;
use crate::error::{ModforgeError, Result, file_write_failed, profile_corrupted, state_parse_failed};
use crate::path_utils::make_path_safe;

/// One deployed file as recorded at commit time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Content digest of the deployed bytes (`blake3:`-prefixed hex)
    pub digest: String,
    /// Unit that owns the file (the conflict winner, for shared paths)
    pub unit: UnitId,
    /// Commit timestamp of the deployment that wrote the file
    pub deployed_at: DateTime<Utc>,
}

/// Committed deployment state of one profile
///
/// Keys are normalized destination-relative paths. The empty state stands
/// in for a profile that has never been deployed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    entries: BTreeMap<String, StateEntry>,
}

impl DeploymentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: StateEntry) {
        self.entries.insert(path.into(), entry);
    }

    pub fn remove(&mut self, path: &str) -> Option<StateEntry> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&StateEntry> {
        self.entries.get(path)
    }

    /// Digest recorded for a deployed path, if any
    pub fn digest_for(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(|e| e.digest.as_str())
    }

    /// Deployed paths in lexical order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deployed file count per owning unit
    pub fn summary(&self) -> BTreeMap<UnitId, usize> {
        let mut counts: BTreeMap<UnitId, usize> = BTreeMap::new();
        for entry in self.entries.values() {
            *counts.entry(entry.unit.clone()).or_default() += 1;
        }
        counts
    }
}

/// On-disk store of per-profile state files and corruption markers
///
/// Each profile gets `<root>/<profile>.json` for its committed state and
/// `<root>/<profile>.corrupted` as the marker a failed rollback leaves
/// behind. Profile names pass through [`make_path_safe`] before touching
/// the filesystem.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the platform-local data directory
    pub fn default_root() -> Option<Self> {
        dirs::data_local_dir().map(|dir| Self::new(dir.join("modforge").join("state")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_path(&self, profile: &str) -> PathBuf {
        self.root.join(format!("{}.json", make_path_safe(profile)))
    }

    fn marker_path(&self, profile: &str) -> PathBuf {
        self.root
            .join(format!("{}.corrupted", make_path_safe(profile)))
    }

    /// Load a profile's committed state; a missing file is the empty state
    ///
    /// # Errors
    ///
    /// Returns `ModforgeError::StateParseFailed` if the file exists but does
    /// not parse. A corrupt state file is not silently replaced.
    pub fn load(&self, profile: &str) -> Result<DeploymentState> {
        let path = self.state_path(profile);
        if !path.exists() {
            return Ok(DeploymentState::new());
        }

        let contents = fs::read_to_string(&path).map_err(|e| ModforgeError::FileReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| state_parse_failed(path.display().to_string(), e.to_string()))
    }

    /// Atomically replace a profile's state file
    ///
    /// Serializes to a temporary file in the store root and renames it over
    /// the target, so readers never observe a half-written state.
    pub fn save(&self, profile: &str, state: &DeploymentState) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.state_path(profile);

        let json = serde_json::to_string_pretty(state)?;
        let mut temp = NamedTempFile::new_in(&self.root)?;
        temp.write_all(json.as_bytes())
            .map_err(|e| file_write_failed(path.display().to_string(), e.to_string()))?;
        temp.persist(&path)
            .map_err(|e| file_write_failed(path.display().to_string(), e.to_string()))?;

        debug!(profile, entries = state.len(), "saved deployment state");
        Ok(())
    }

    /// Remove a profile's state file (used after clearing a deployment)
    pub fn clear(&self, profile: &str) -> Result<()> {
        let path = self.state_path(profile);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Leave a corruption marker naming the paths a rollback failed on
    ///
    /// The marker blocks further deployments to the profile until an
    /// operator inspects the destination and calls [`clear_corruption`].
    ///
    /// [`clear_corruption`]: StateStore::clear_corruption
    pub fn mark_corrupted(&self, profile: &str, detail: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.marker_path(profile);
        fs::write(&path, detail)
            .map_err(|e| file_write_failed(path.display().to_string(), e.to_string()))?;
        Ok(())
    }

    pub fn is_corrupted(&self, profile: &str) -> bool {
        self.marker_path(profile).exists()
    }

    /// Fail if the profile carries a corruption marker
    pub fn ensure_not_corrupted(&self, profile: &str) -> Result<()> {
        let marker = self.marker_path(profile);
        if marker.exists() {
            return Err(profile_corrupted(profile, marker.display().to_string()));
        }
        Ok(())
    }

    pub fn clear_corruption(&self, profile: &str) -> Result<()> {
        let marker = self.marker_path(profile);
        if marker.exists() {
            fs::remove_file(&marker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(digest: &str, unit: &str) -> StateEntry {
        StateEntry {
            digest: digest.to_string(),
            unit: unit.parse().unwrap(),
            deployed_at: Utc::now(),
        }
    }

    #[test]
    fn test_load_missing_is_empty_state() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        let state = store.load("default").unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());

        let mut state = DeploymentState::new();
        state.insert("plugins/a.dll", entry("blake3:aa", "alice-core"));
        state.insert("config/shared.cfg", entry("blake3:cc", "bob-lib"));
        store.save("default", &state).unwrap();

        let loaded = store.load("default").unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.digest_for("plugins/a.dll"), Some("blake3:aa"));
    }

    #[test]
    fn test_load_rejects_corrupt_json() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        fs::write(temp.path().join("default.json"), "not json").unwrap();

        let err = store.load("default").unwrap_err();
        assert!(matches!(err, ModforgeError::StateParseFailed { .. }));
    }

    #[test]
    fn test_clear_removes_state_file() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        store.save("default", &DeploymentState::new()).unwrap();

        store.clear("default").unwrap();
        assert!(store.load("default").unwrap().is_empty());
        // Clearing a missing file is not an error
        store.clear("default").unwrap();
    }

    #[test]
    fn test_corruption_marker_blocks_profile() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());

        assert!(store.ensure_not_corrupted("default").is_ok());
        store.mark_corrupted("default", "plugins/a.dll").unwrap();
        assert!(store.is_corrupted("default"));

        let err = store.ensure_not_corrupted("default").unwrap_err();
        assert!(matches!(err, ModforgeError::ProfileCorrupted { .. }));

        store.clear_corruption("default").unwrap();
        assert!(store.ensure_not_corrupted("default").is_ok());
    }

    #[test]
    fn test_profile_names_are_path_safe() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());

        let mut state = DeploymentState::new();
        state.insert("a.txt", entry("blake3:aa", "alice-core"));
        store.save("my profile / with : chars", &state).unwrap();

        let loaded = store.load("my profile / with : chars").unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_summary_counts_per_unit() {
        let mut state = DeploymentState::new();
        state.insert("a.dll", entry("blake3:aa", "alice-core"));
        state.insert("b.dll", entry("blake3:bb", "alice-core"));
        state.insert("c.cfg", entry("blake3:cc", "bob-lib"));

        let summary = state.summary();
        assert_eq!(summary[&"alice-core".parse::<UnitId>().unwrap()], 2);
        assert_eq!(summary[&"bob-lib".parse::<UnitId>().unwrap()], 1);
    }
}
