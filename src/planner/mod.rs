//! Diff planning between desired and committed deployment state
//!
//! The planner folds an activation order into the desired file set, then
//! diffs it against the profile's committed state. Change detection is
//! digest comparison only. The resulting plan is inert data: computing it
//! mutates nothing, and the engine is the only consumer.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::warn;

use crate::domain::{UnitId, UnitLookup};
use crate::error::{Result, missing_dependency};
use crate::resolver::ActivationOrder;
use crate::state::DeploymentState;

/// Policy for two units shipping the same destination path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// The unit activated later in the order wins (dependents override
    /// their dependencies, matching load-order conventions)
    #[default]
    LastActivatedWins,
    /// The unit activated earlier in the order wins
    FirstActivatedWins,
}

/// Annotation for a destination path claimed by two units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    pub path: String,
    pub winner: UnitId,
    pub loser: UnitId,
}

/// One mutation the engine will perform, in plan order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    /// Delete a previously deployed file that no unit ships anymore
    Remove { path: String },
    /// Overwrite a deployed file whose desired digest differs
    Update {
        path: String,
        unit: UnitId,
        old_digest: String,
        new_digest: String,
    },
    /// Write a file not present in the committed state
    Add {
        path: String,
        unit: UnitId,
        digest: String,
    },
}

impl PlannedAction {
    pub fn path(&self) -> &str {
        match self {
            PlannedAction::Remove { path }
            | PlannedAction::Update { path, .. }
            | PlannedAction::Add { path, .. } => path,
        }
    }
}

/// A deployed file whose digest already matches the desired state
///
/// Not re-written, but carried so the committed state can record the
/// current owner and digest for every desired path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedFile {
    pub path: String,
    pub unit: UnitId,
    pub digest: String,
}

/// Ordered diff between desired and committed state
///
/// Actions are ordered removals first, then updates, then additions, each
/// group in lexical path order. The ordering is part of the plan's
/// contract: replaying the same plan always touches paths in the same
/// sequence.
#[derive(Debug, Clone, Default)]
pub struct DiffPlan {
    pub actions: Vec<PlannedAction>,
    pub retained: Vec<RetainedFile>,
    pub conflicts: Vec<PathConflict>,
}

impl DiffPlan {
    /// Whether applying this plan would change nothing on disk
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn remove_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, PlannedAction::Remove { .. }))
            .count()
    }

    pub fn update_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, PlannedAction::Update { .. }))
            .count()
    }

    pub fn add_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, PlannedAction::Add { .. }))
            .count()
    }
}

/// Compute the diff plan for an activation order against committed state
///
/// Folds the order into a desired path map (resolving shared paths per
/// `policy`, each collision annotated in the plan and logged), then diffs
/// against `prior` by digest.
///
/// # Errors
///
/// Returns `ModforgeError::MissingDependency` if an ordered unit is absent
/// from the catalog; the order and catalog are expected to come from the
/// same resolution pass.
pub fn plan(
    order: &ActivationOrder,
    catalog: &dyn UnitLookup,
    prior: &DeploymentState,
    policy: ConflictPolicy,
) -> Result<DiffPlan> {
    let mut desired: BTreeMap<String, (UnitId, String)> = BTreeMap::new();
    let mut conflicts = Vec::new();

    for id in order {
        let Some(unit) = catalog.lookup(id)? else {
            return Err(missing_dependency(id.to_string(), id.to_string(), "*"));
        };

        for entry in &unit.manifest {
            match desired.entry(entry.path.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert((id.clone(), entry.digest.clone()));
                }
                Entry::Occupied(mut slot) => {
                    let (winner, loser) = match policy {
                        ConflictPolicy::LastActivatedWins => (id.clone(), slot.get().0.clone()),
                        ConflictPolicy::FirstActivatedWins => (slot.get().0.clone(), id.clone()),
                    };
                    warn!(
                        path = %entry.path,
                        winner = %winner,
                        loser = %loser,
                        "destination path claimed by two units"
                    );
                    if policy == ConflictPolicy::LastActivatedWins {
                        slot.insert((id.clone(), entry.digest.clone()));
                    }
                    conflicts.push(PathConflict {
                        path: entry.path.clone(),
                        winner,
                        loser,
                    });
                }
            }
        }
    }

    let mut removes = Vec::new();
    let mut updates = Vec::new();
    let mut adds = Vec::new();
    let mut retained = Vec::new();

    for path in prior.paths() {
        if !desired.contains_key(path) {
            removes.push(PlannedAction::Remove {
                path: path.to_string(),
            });
        }
    }

    for (path, (unit, digest)) in &desired {
        match prior.digest_for(path) {
            None => adds.push(PlannedAction::Add {
                path: path.clone(),
                unit: unit.clone(),
                digest: digest.clone(),
            }),
            Some(old) if old != digest => updates.push(PlannedAction::Update {
                path: path.clone(),
                unit: unit.clone(),
                old_digest: old.to_string(),
                new_digest: digest.clone(),
            }),
            Some(_) => retained.push(RetainedFile {
                path: path.clone(),
                unit: unit.clone(),
                digest: digest.clone(),
            }),
        }
    }

    let mut actions = removes;
    actions.extend(updates);
    actions.extend(adds);

    Ok(DiffPlan {
        actions,
        retained,
        conflicts,
    })
}
