//! Transactional deployment engine
//!
//! A deployment is all-or-nothing from the caller's perspective: either
//! every planned action lands and the new state is committed, or every
//! applied action is undone from the checkpoint and the previous committed
//! state remains authoritative. The one exception is a failed rollback,
//! which leaves a corruption marker that blocks further deployments to the
//! profile until an operator intervenes.
//!
//! Apply order within a plan is removals, then updates, then additions,
//! so disk usage never exceeds the larger of the two states plus one file.

pub mod lock;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::domain::{UnitId, UnitLookup};
use crate::error::{
    ModforgeError, Result, file_write_failed, hash_mismatch, missing_dependency,
    permission_denied, rollback_failed,
};
use crate::hash::{hash_file, verify_digest};
use crate::planner::{ConflictPolicy, DiffPlan, PathConflict, PlannedAction, plan};
use crate::progress::{ActionLabel, DeployEvent, DeployPhase, EventSink};
use crate::resolver::resolve;
use crate::state::{DeploymentState, StateEntry, StateStore};

pub use lock::{DestinationLock, ensure_destination_free, is_destination_in_use};

/// Cooperative cancellation flag, shared between the caller and a running
/// deployment
///
/// Honored only before the apply phase begins; once files are being
/// mutated the deployment runs to completion (commit or rollback).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome summary of a committed deployment
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub retained: usize,
    pub conflicts: Vec<PathConflict>,
    /// True when the plan was empty and nothing was touched
    pub noop: bool,
}

/// Orchestrates resolve, plan, checkpoint, apply and commit for a profile
///
/// The engine is stateless between calls; all durable state lives in the
/// [`StateStore`] and [`CheckpointStore`].
pub struct DeploymentEngine<'c> {
    catalog: &'c dyn UnitLookup,
    states: StateStore,
    checkpoints: CheckpointStore,
    policy: ConflictPolicy,
}

impl<'c> DeploymentEngine<'c> {
    pub fn new(catalog: &'c dyn UnitLookup, states: StateStore, checkpoints: CheckpointStore) -> Self {
        Self {
            catalog,
            states,
            checkpoints,
            policy: ConflictPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn states(&self) -> &StateStore {
        &self.states
    }

    /// Deploy the requested units to `dest_root` under `profile`
    ///
    /// Resolves and plans first (pure), then mutates the destination under
    /// an exclusive lock with a checkpoint taken before the first write.
    /// Progress is reported through `on_event`.
    ///
    /// # Errors
    ///
    /// Resolution and planning errors leave everything untouched. Apply
    /// errors trigger an automatic rollback and the original error is
    /// returned. `ModforgeError::RollbackFailed` means the rollback itself
    /// failed: the destination is in an indeterminate state and the profile
    /// is marked corrupted.
    pub fn deploy(
        &self,
        profile: &str,
        dest_root: &Path,
        requested: &[UnitId],
        cancel: Option<&CancelToken>,
        on_event: &mut EventSink<'_>,
    ) -> Result<DeployReport> {
        self.states.ensure_not_corrupted(profile)?;
        check_cancelled(cancel)?;

        on_event(DeployEvent::PhaseChanged {
            phase: DeployPhase::Planning,
        });
        let order = resolve(requested, self.catalog)?;

        let lock = DestinationLock::acquire(dest_root)?;
        let dest_root = lock.root();
        let prior = self.states.load(profile)?;
        let plan = plan(&order, self.catalog, &prior, self.policy)?;

        if plan.is_noop() {
            info!(profile, "deployment is a no-op");
            return Ok(report_for(&plan, true));
        }

        let checkpoint = self.checkpoints.create(profile, dest_root, &plan, &prior)?;
        on_event(DeployEvent::PhaseChanged {
            phase: DeployPhase::CheckpointCreated,
        });

        // Last cancellation point; from here the deployment runs to
        // commit or rollback
        if cancel.is_some_and(CancelToken::is_cancelled) {
            checkpoint.discard()?;
            return Err(ModforgeError::Cancelled);
        }

        on_event(DeployEvent::PhaseChanged {
            phase: DeployPhase::Applying,
        });
        info!(
            profile,
            removes = plan.remove_count(),
            updates = plan.update_count(),
            adds = plan.add_count(),
            "applying deployment plan"
        );

        let total = plan.actions.len();
        let mut applied: Vec<&PlannedAction> = Vec::with_capacity(total);
        for (index, action) in plan.actions.iter().enumerate() {
            // Pushed before applying: a failed action may have partially
            // mutated its path and must be undone along with the rest
            applied.push(action);
            if let Err(err) = self.apply_action(action, dest_root) {
                error!(path = action.path(), %err, "apply failed, rolling back");
                return Err(self.roll_back(profile, dest_root, &applied, checkpoint, err, on_event));
            }
            on_event(DeployEvent::ActionCompleted {
                index,
                total,
                label: label_of(action),
                path: action.path().to_string(),
            });
        }

        let state = committed_state(&plan, &prior);
        if let Err(err) = self.states.save(profile, &state) {
            error!(profile, %err, "state save failed, rolling back");
            return Err(self.roll_back(profile, dest_root, &applied, checkpoint, err, on_event));
        }

        if let Err(err) = checkpoint.discard() {
            warn!(profile, %err, "failed to discard checkpoint after commit");
        }
        on_event(DeployEvent::Committed { files: state.len() });
        info!(profile, files = state.len(), "deployment committed");
        Ok(report_for(&plan, false))
    }

    /// Deploy without cancellation or progress reporting
    pub fn deploy_quiet(
        &self,
        profile: &str,
        dest_root: &Path,
        requested: &[UnitId],
    ) -> Result<DeployReport> {
        self.deploy(
            profile,
            dest_root,
            requested,
            None,
            &mut crate::progress::discard_events(),
        )
    }

    /// Remove every file the profile's committed state recorded
    ///
    /// Leaves user files alone: only state-recorded paths are touched, and
    /// emptied parent directories are pruned. Clears the state file last.
    pub fn clear(&self, profile: &str, dest_root: &Path) -> Result<usize> {
        self.states.ensure_not_corrupted(profile)?;
        let lock = DestinationLock::acquire(dest_root)?;
        let dest_root = lock.root();

        let state = self.states.load(profile)?;
        for path in state.paths() {
            remove_deployed_file(dest_root, path)?;
        }
        self.states.clear(profile)?;

        info!(profile, files = state.len(), "deployment cleared");
        Ok(state.len())
    }

    /// Restore a profile's on-disk checkpoint wholesale
    ///
    /// Manual recovery entry for a profile whose automatic rollback failed:
    /// every backed-up file is copied back, the checkpoint's prior state is
    /// re-persisted as the committed state, and the corruption marker is
    /// cleared. Returns the number of restored files.
    ///
    /// # Errors
    ///
    /// Returns `ModforgeError::FileNotFound` if no checkpoint exists for
    /// the profile, or `ModforgeError::RollbackFailed` listing the paths
    /// that could not be restored (the corruption marker then stays).
    pub fn rollback(&self, profile: &str, dest_root: &Path) -> Result<usize> {
        let lock = DestinationLock::acquire(dest_root)?;
        let dest_root = lock.root();
        let checkpoint = self.checkpoints.load(profile)?;

        let mut restored = 0usize;
        let mut failed: Vec<String> = Vec::new();
        for path in checkpoint.backed_up_paths() {
            match checkpoint.restore(path, dest_root) {
                Ok(()) => restored += 1,
                Err(err) => {
                    error!(path, %err, "checkpoint restore failed");
                    failed.push(path.to_string());
                }
            }
        }
        if !failed.is_empty() {
            return Err(rollback_failed(failed));
        }

        self.states.save(profile, checkpoint.prior_state())?;
        checkpoint.discard()?;
        self.states.clear_corruption(profile)?;

        info!(profile, restored, "checkpoint restored");
        Ok(restored)
    }

    fn apply_action(&self, action: &PlannedAction, dest_root: &Path) -> Result<()> {
        match action {
            PlannedAction::Remove { path } => remove_deployed_file(dest_root, path),
            PlannedAction::Update {
                path,
                unit,
                new_digest,
                ..
            } => self.write_file(dest_root, path, unit, new_digest),
            PlannedAction::Add { path, unit, digest } => {
                self.write_file(dest_root, path, unit, digest)
            }
        }
    }

    fn write_file(
        &self,
        dest_root: &Path,
        rel_path: &str,
        unit_id: &UnitId,
        expected_digest: &str,
    ) -> Result<()> {
        let Some(unit) = self.catalog.lookup(unit_id)? else {
            return Err(missing_dependency(
                unit_id.to_string(),
                unit_id.to_string(),
                "*",
            ));
        };

        let source = unit.source_file(rel_path);
        let dest = dest_root.join(rel_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| map_write_error(parent, e))?;
        }
        fs::copy(&source, &dest).map_err(|e| map_write_error(&dest, e))?;

        // Written bytes must match the manifest digest before the action
        // counts as applied
        let actual = hash_file(&dest)?;
        if !verify_digest(expected_digest, &actual) {
            return Err(hash_mismatch(rel_path, expected_digest, actual));
        }
        Ok(())
    }

    /// Undo applied actions in reverse order; returns the error the caller
    /// should surface
    fn roll_back(
        &self,
        profile: &str,
        dest_root: &Path,
        applied: &[&PlannedAction],
        checkpoint: Checkpoint,
        cause: ModforgeError,
        on_event: &mut EventSink<'_>,
    ) -> ModforgeError {
        on_event(DeployEvent::PhaseChanged {
            phase: DeployPhase::RollingBack,
        });

        let mut failed: Vec<String> = Vec::new();
        let mut undone = 0usize;
        for action in applied.iter().rev() {
            let result = match action {
                PlannedAction::Add { path, .. } => remove_deployed_file(dest_root, path),
                PlannedAction::Update { path, .. } | PlannedAction::Remove { path } => {
                    if checkpoint.has_backup(path) {
                        checkpoint.restore(path, dest_root)
                    } else {
                        // No backup means the file was absent on disk when
                        // the checkpoint was taken; deleting it restores
                        // that state exactly
                        remove_deployed_file(dest_root, path)
                    }
                }
            };
            match result {
                Ok(()) => undone += 1,
                Err(err) => {
                    error!(path = action.path(), %err, "rollback step failed");
                    failed.push(action.path().to_string());
                }
            }
        }

        if failed.is_empty() {
            if let Err(err) = checkpoint.discard() {
                warn!(profile, %err, "failed to discard checkpoint after rollback");
            }
            on_event(DeployEvent::RolledBack { undone });
            info!(profile, undone, "rolled back to previous state");
            return cause;
        }

        // Checkpoint is kept on disk for manual recovery
        let detail = failed.join("\n");
        if let Err(err) = self.states.mark_corrupted(profile, &detail) {
            error!(profile, %err, "failed to write corruption marker");
        }
        error!(profile, paths = ?failed, "rollback failed, profile marked corrupted");
        rollback_failed(failed)
    }
}

fn check_cancelled(cancel: Option<&CancelToken>) -> Result<()> {
    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Err(ModforgeError::Cancelled);
    }
    Ok(())
}

fn label_of(action: &PlannedAction) -> ActionLabel {
    match action {
        PlannedAction::Remove { .. } => ActionLabel::Remove,
        PlannedAction::Update { .. } => ActionLabel::Update,
        PlannedAction::Add { .. } => ActionLabel::Add,
    }
}

fn report_for(plan: &DiffPlan, noop: bool) -> DeployReport {
    DeployReport {
        added: plan.add_count(),
        updated: plan.update_count(),
        removed: plan.remove_count(),
        retained: plan.retained.len(),
        conflicts: plan.conflicts.clone(),
        noop,
    }
}

/// State to persist after every action in the plan has been applied
fn committed_state(plan: &DiffPlan, prior: &DeploymentState) -> DeploymentState {
    let now = Utc::now();
    let mut state = DeploymentState::new();

    for action in &plan.actions {
        match action {
            PlannedAction::Remove { .. } => {}
            PlannedAction::Update {
                path,
                unit,
                new_digest,
                ..
            } => state.insert(
                path.clone(),
                StateEntry {
                    digest: new_digest.clone(),
                    unit: unit.clone(),
                    deployed_at: now,
                },
            ),
            PlannedAction::Add { path, unit, digest } => state.insert(
                path.clone(),
                StateEntry {
                    digest: digest.clone(),
                    unit: unit.clone(),
                    deployed_at: now,
                },
            ),
        }
    }

    // Unchanged files keep their original deployment timestamp
    for kept in &plan.retained {
        let deployed_at = prior
            .get(&kept.path)
            .map(|e| e.deployed_at)
            .unwrap_or(now);
        state.insert(
            kept.path.clone(),
            StateEntry {
                digest: kept.digest.clone(),
                unit: kept.unit.clone(),
                deployed_at,
            },
        );
    }

    state
}

fn map_write_error(path: &Path, err: io::Error) -> ModforgeError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        permission_denied(path.display().to_string())
    } else {
        file_write_failed(path.display().to_string(), err.to_string())
    }
}

/// Delete a deployed file and prune any directories it leaves empty
///
/// Missing files are fine: removal is idempotent.
fn remove_deployed_file(dest_root: &Path, rel_path: &str) -> Result<()> {
    let dest = dest_root.join(rel_path);
    match fs::remove_file(&dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(map_write_error(&dest, e)),
    }
    prune_empty_parents(dest_root, &dest);
    Ok(())
}

/// Remove now-empty parent directories up to (not including) the root
fn prune_empty_parents(dest_root: &Path, removed: &Path) {
    let mut current: Option<PathBuf> = removed.parent().map(Path::to_path_buf);
    while let Some(dir) = current {
        if dir == dest_root || !dir.starts_with(dest_root) {
            break;
        }
        let is_empty = fs::read_dir(&dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty || fs::remove_dir(&dir).is_err() {
            break;
        }
        current = dir.parent().map(Path::to_path_buf);
    }
}
