//! Pre-deployment checkpoints
//!
//! Before any mutation, the engine snapshots every file the plan will
//! update or remove into a checkpoint directory, together with a metadata
//! file recording the profile, destination and prior state. Rollback
//! copies backups from here; commit discards the whole directory. A
//! checkpoint that outlives its deployment (failed rollback) stays on disk
//! for manual inspection.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModforgeError, Result, file_write_failed, state_parse_failed};
use crate::path_utils::make_path_safe;
use crate::planner::{DiffPlan, PlannedAction};
use crate::state::DeploymentState;

const METADATA_FILE: &str = "checkpoint.json";
const BACKUP_DIR: &str = "files";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointMeta {
    profile: String,
    dest_root: PathBuf,
    taken_at: DateTime<Utc>,
    prior_state: DeploymentState,
    /// Destination-relative path -> backup file name under `files/`
    backups: BTreeMap<String, String>,
}

/// A materialized checkpoint for one deployment attempt
#[derive(Debug)]
pub struct Checkpoint {
    dir: PathBuf,
    meta: CheckpointMeta,
}

impl Checkpoint {
    /// Destination-relative paths with a backup in this checkpoint
    pub fn backed_up_paths(&self) -> impl Iterator<Item = &str> {
        self.meta.backups.keys().map(String::as_str)
    }

    /// Whether a backup exists for `rel_path`
    ///
    /// False for paths the plan removes that were already absent on disk.
    pub fn has_backup(&self, rel_path: &str) -> bool {
        self.meta.backups.contains_key(rel_path)
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.meta.taken_at
    }

    pub fn prior_state(&self) -> &DeploymentState {
        &self.meta.prior_state
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy the backup for `rel_path` back over the destination file
    ///
    /// # Errors
    ///
    /// Returns `ModforgeError::FileNotFound` if the checkpoint holds no
    /// backup for the path, or a write error if the copy fails.
    pub fn restore(&self, rel_path: &str, dest_root: &Path) -> Result<()> {
        let Some(backup_name) = self.meta.backups.get(rel_path) else {
            return Err(ModforgeError::FileNotFound {
                path: format!("{} (no backup in checkpoint)", rel_path),
            });
        };

        let backup = self.dir.join(BACKUP_DIR).join(backup_name);
        let dest = dest_root.join(rel_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| file_write_failed(parent.display().to_string(), e.to_string()))?;
        }
        fs::copy(&backup, &dest)
            .map_err(|e| file_write_failed(dest.display().to_string(), e.to_string()))?;
        Ok(())
    }

    /// Delete the checkpoint directory after a successful commit or rollback
    pub fn discard(self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

/// On-disk store of per-profile checkpoint directories
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the platform-local data directory
    pub fn default_root() -> Option<Self> {
        dirs::data_local_dir().map(|dir| Self::new(dir.join("modforge").join("checkpoints")))
    }

    fn checkpoint_dir(&self, profile: &str) -> PathBuf {
        self.root.join(make_path_safe(profile))
    }

    /// Snapshot every file the plan will update or remove
    ///
    /// A previous checkpoint for the same profile is replaced. Files the
    /// plan only adds need no backup; rollback deletes them.
    pub fn create(
        &self,
        profile: &str,
        dest_root: &Path,
        plan: &DiffPlan,
        prior_state: &DeploymentState,
    ) -> Result<Checkpoint> {
        let dir = self.checkpoint_dir(profile);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        let backup_dir = dir.join(BACKUP_DIR);
        fs::create_dir_all(&backup_dir)?;

        let mut backups = BTreeMap::new();
        for (index, action) in plan.actions.iter().enumerate() {
            let rel = match action {
                PlannedAction::Remove { path } | PlannedAction::Update { path, .. } => path,
                PlannedAction::Add { .. } => continue,
            };

            let source = dest_root.join(rel);
            if !source.exists() {
                // Already gone on disk; nothing to preserve
                continue;
            }
            let backup_name = format!("b{index:05}");
            fs::copy(&source, backup_dir.join(&backup_name)).map_err(|e| {
                file_write_failed(backup_dir.join(&backup_name).display().to_string(), e.to_string())
            })?;
            backups.insert(rel.clone(), backup_name);
        }

        let meta = CheckpointMeta {
            profile: profile.to_string(),
            dest_root: dest_root.to_path_buf(),
            taken_at: Utc::now(),
            prior_state: prior_state.clone(),
            backups,
        };
        let meta_path = dir.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(&meta)?;
        fs::write(&meta_path, json)
            .map_err(|e| file_write_failed(meta_path.display().to_string(), e.to_string()))?;

        debug!(profile, backups = meta.backups.len(), "checkpoint created");
        Ok(Checkpoint { dir, meta })
    }

    /// Load an existing checkpoint for inspection or manual recovery
    ///
    /// # Errors
    ///
    /// Returns `ModforgeError::FileNotFound` if no checkpoint exists for
    /// the profile.
    pub fn load(&self, profile: &str) -> Result<Checkpoint> {
        let dir = self.checkpoint_dir(profile);
        let meta_path = dir.join(METADATA_FILE);
        if !meta_path.exists() {
            return Err(ModforgeError::FileNotFound {
                path: meta_path.display().to_string(),
            });
        }

        let contents = fs::read_to_string(&meta_path).map_err(|e| ModforgeError::FileReadFailed {
            path: meta_path.display().to_string(),
            reason: e.to_string(),
        })?;
        let meta: CheckpointMeta = serde_json::from_str(&contents)
            .map_err(|e| state_parse_failed(meta_path.display().to_string(), e.to_string()))?;
        Ok(Checkpoint { dir, meta })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::UnitId;
    use crate::planner::RetainedFile;
    use tempfile::TempDir;

    fn plan_with(actions: Vec<PlannedAction>) -> DiffPlan {
        DiffPlan {
            actions,
            retained: Vec::<RetainedFile>::new(),
            conflicts: Vec::new(),
        }
    }

    fn unit_id(s: &str) -> UnitId {
        s.parse().unwrap()
    }

    #[test]
    fn test_create_backs_up_update_and_remove_targets() {
        let dest = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        std::fs::create_dir(dest.path().join("plugins")).unwrap();
        std::fs::write(dest.path().join("plugins/upd.dll"), b"old").unwrap();
        std::fs::write(dest.path().join("plugins/gone.dll"), b"bye").unwrap();

        let plan = plan_with(vec![
            PlannedAction::Remove {
                path: "plugins/gone.dll".into(),
            },
            PlannedAction::Update {
                path: "plugins/upd.dll".into(),
                unit: unit_id("alice-core"),
                old_digest: "blake3:old".into(),
                new_digest: "blake3:new".into(),
            },
            PlannedAction::Add {
                path: "plugins/new.dll".into(),
                unit: unit_id("alice-core"),
                digest: "blake3:nn".into(),
            },
        ]);

        let store = CheckpointStore::new(store_dir.path());
        let checkpoint = store
            .create("default", dest.path(), &plan, &DeploymentState::new())
            .unwrap();

        let backed: Vec<&str> = checkpoint.backed_up_paths().collect();
        assert_eq!(backed, vec!["plugins/gone.dll", "plugins/upd.dll"]);
    }

    #[test]
    fn test_restore_replaces_destination_file() {
        let dest = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        std::fs::write(dest.path().join("a.cfg"), b"original").unwrap();

        let plan = plan_with(vec![PlannedAction::Update {
            path: "a.cfg".into(),
            unit: unit_id("alice-core"),
            old_digest: "blake3:old".into(),
            new_digest: "blake3:new".into(),
        }]);

        let store = CheckpointStore::new(store_dir.path());
        let checkpoint = store
            .create("default", dest.path(), &plan, &DeploymentState::new())
            .unwrap();

        std::fs::write(dest.path().join("a.cfg"), b"clobbered").unwrap();
        checkpoint.restore("a.cfg", dest.path()).unwrap();
        assert_eq!(std::fs::read(dest.path().join("a.cfg")).unwrap(), b"original");
    }

    #[test]
    fn test_restore_unknown_path_fails() {
        let dest = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(store_dir.path());
        let checkpoint = store
            .create("default", dest.path(), &plan_with(vec![]), &DeploymentState::new())
            .unwrap();

        let err = checkpoint.restore("never/was.dll", dest.path()).unwrap_err();
        assert!(matches!(err, ModforgeError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_round_trips_metadata() {
        let dest = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        std::fs::write(dest.path().join("a.cfg"), b"original").unwrap();

        let plan = plan_with(vec![PlannedAction::Remove {
            path: "a.cfg".into(),
        }]);
        let store = CheckpointStore::new(store_dir.path());
        store
            .create("default", dest.path(), &plan, &DeploymentState::new())
            .unwrap();

        let loaded = store.load("default").unwrap();
        assert_eq!(loaded.backed_up_paths().count(), 1);
        assert!(loaded.prior_state().is_empty());
    }

    #[test]
    fn test_discard_removes_directory() {
        let dest = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(store_dir.path());
        let checkpoint = store
            .create("default", dest.path(), &plan_with(vec![]), &DeploymentState::new())
            .unwrap();

        let dir = checkpoint.dir().to_path_buf();
        checkpoint.discard().unwrap();
        assert!(!dir.exists());
        assert!(store.load("default").is_err());
    }
}
