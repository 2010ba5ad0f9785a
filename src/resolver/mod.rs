//! Dependency resolution for installable units
//!
//! This module handles:
//! - Building dependency graphs by closure over a requested activation set
//! - Missing-dependency and version-conflict validation
//! - Circular dependency detection
//! - Deterministic topological ordering (Kahn's algorithm, lexical tie-break)
//!
//! Resolution is a pure function over its inputs: it mutates nothing, so a
//! failed resolution is always safe to retry after fixing the input.

pub mod graph;
pub mod sort;

use std::collections::{BTreeSet, VecDeque};

use crate::domain::{InstallableUnit, UnitId, UnitLookup};
use crate::error::Result;

pub use graph::{DependencyGraph, build_graph, check_version_conflicts};
pub use sort::{detect_cycle, topological_order};

/// Dependency-respecting activation sequence
///
/// Every unit appears after all of its non-optional dependencies.
/// Produced by [`resolve`], consumed once by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationOrder(Vec<UnitId>);

impl ActivationOrder {
    pub fn as_slice(&self) -> &[UnitId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<UnitId> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ActivationOrder {
    type Item = &'a UnitId;
    type IntoIter = std::slice::Iter<'a, UnitId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Resolve a validated activation order for the requested units
///
/// Builds the dependency graph by closure (transitive non-optional
/// dependencies are pulled in from the catalog automatically), validates
/// it, and orders it. The same input always yields the same output order.
///
/// # Errors
///
/// - `ModforgeError::MissingDependency` if a required unit is absent or its
///   resolved version violates a constraint
/// - `ModforgeError::VersionConflict` if constraints on one identity are
///   disjoint
/// - `ModforgeError::CycleDetected` if the graph contains a cycle
pub fn resolve(requested: &[UnitId], catalog: &dyn UnitLookup) -> Result<ActivationOrder> {
    let graph = build_graph(requested, catalog)?;
    check_version_conflicts(&graph, catalog)?;
    detect_cycle(&graph)?;
    Ok(ActivationOrder(topological_order(&graph)))
}

/// All transitive non-optional dependencies of a unit, in breadth-first order
///
/// The unit itself is not included.
///
/// # Errors
///
/// Propagates catalog read failures; absent dependencies are skipped (this
/// is a query, not a validation).
pub fn transitive_dependencies(id: &UnitId, catalog: &dyn UnitLookup) -> Result<Vec<UnitId>> {
    let mut visited: BTreeSet<UnitId> = BTreeSet::new();
    let mut queue: VecDeque<UnitId> = VecDeque::new();
    let mut dependencies = Vec::new();

    queue.push_back(id.clone());
    visited.insert(id.clone());

    while let Some(current) = queue.pop_front() {
        let Some(unit) = catalog.lookup(&current)? else {
            continue;
        };
        for constraint in &unit.dependencies {
            if constraint.optional {
                continue;
            }
            if visited.insert(constraint.target.clone()) {
                dependencies.push(constraint.target.clone());
                queue.push_back(constraint.target.clone());
            }
        }
    }

    Ok(dependencies)
}

/// Expand a requested set with its missing non-optional transitive
/// dependencies
///
/// Requested units come first in their given order, pulled-in dependencies
/// follow in discovery order. The result is a valid input for [`resolve`],
/// which re-validates and orders it.
///
/// # Errors
///
/// Propagates catalog read failures.
pub fn auto_resolve(requested: &[UnitId], catalog: &dyn UnitLookup) -> Result<Vec<UnitId>> {
    let mut seen: BTreeSet<UnitId> = requested.iter().cloned().collect();
    let mut activation: Vec<UnitId> = requested.to_vec();

    for id in requested {
        for dependency in transitive_dependencies(id, catalog)? {
            if seen.insert(dependency.clone()) {
                activation.push(dependency);
            }
        }
    }

    Ok(activation)
}

/// Units among `units` that declare a dependency on `id`
///
/// Used before removing a unit from a profile: removing a unit that still
/// has dependents would break the next resolution.
pub fn dependents_of<'a>(
    id: &UnitId,
    units: impl IntoIterator<Item = &'a InstallableUnit>,
) -> Vec<UnitId> {
    units
        .into_iter()
        .filter(|unit| unit.depends_on(id))
        .map(|unit| unit.id.clone())
        .collect()
}
