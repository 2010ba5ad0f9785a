//! Dependency graph construction and constraint validation
//!
//! The graph is derived and transient: nodes are the requested units plus
//! transitively required non-optional dependencies, edges are "depends-on"
//! with the originating constraint attached for diagnostics. It is rebuilt
//! on every resolution call and never persisted.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use crate::domain::{DependencyConstraint, UnitId, UnitLookup};
use crate::error::{Result, missing_dependency, version_conflict};
use crate::version::VersionBounds;

/// Directed dependency graph: dependent unit to its outgoing constraints
///
/// Every node has an entry, units without dependencies map to an empty list.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<UnitId, Vec<DependencyConstraint>>,
}

impl DependencyGraph {
    /// Nodes in lexical order
    pub fn nodes(&self) -> impl Iterator<Item = &UnitId> {
        self.edges.keys()
    }

    /// Outgoing constraints of a node (its dependencies)
    pub fn dependencies_of(&self, id: &UnitId) -> &[DependencyConstraint] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `id` is a node of the graph
    pub fn contains(&self, id: &UnitId) -> bool {
        self.edges.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    fn ensure_node(&mut self, id: &UnitId) {
        self.edges.entry(id.clone()).or_default();
    }

    fn add_edge(&mut self, from: &UnitId, constraint: DependencyConstraint) {
        self.edges.entry(from.clone()).or_default().push(constraint);
    }
}

/// Build the dependency graph by closure over the requested set
///
/// Starts from the requested units and recursively adds each unit's
/// non-optional dependency targets. Optional dependencies join the graph
/// only when their target is already in the requested set.
///
/// # Errors
///
/// Returns `ModforgeError::MissingDependency` if a requested unit or a
/// non-optional dependency target is absent from the catalog. Version
/// bounds are validated separately by [`check_version_conflicts`] so that
/// disjoint constraint ranges are reported as a conflict, not as a missing
/// unit.
pub fn build_graph(requested: &[UnitId], catalog: &dyn UnitLookup) -> Result<DependencyGraph> {
    let requested_set: BTreeSet<&UnitId> = requested.iter().collect();
    let mut graph = DependencyGraph::default();
    let mut queue: VecDeque<UnitId> = requested.iter().cloned().collect();
    let mut visited: BTreeSet<UnitId> = BTreeSet::new();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }

        let Some(unit) = catalog.lookup(&id)? else {
            // A requested unit absent from the catalog is reported as a
            // missing dependency of the request itself
            return Err(missing_dependency(id.to_string(), id.to_string(), "*"));
        };

        graph.ensure_node(&id);

        for constraint in &unit.dependencies {
            if constraint.optional && !requested_set.contains(&constraint.target) {
                continue;
            }

            if catalog.lookup(&constraint.target)?.is_none() {
                if constraint.optional {
                    continue;
                }
                return Err(missing_dependency(
                    id.to_string(),
                    constraint.target.to_string(),
                    constraint.bounds.to_string(),
                ));
            }

            graph.add_edge(&id, constraint.clone());
            if !visited.contains(&constraint.target) {
                queue.push_back(constraint.target.clone());
            }
        }
    }

    Ok(graph)
}

/// Validate version constraints across the whole graph
///
/// Two checks, in order:
/// 1. Constraints targeting the same identity must intersect to a non-empty
///    range, otherwise `ModforgeError::VersionConflict` lists every
///    constraint on that identity.
/// 2. The resolved unit's version must fall inside the intersected range,
///    otherwise `ModforgeError::MissingDependency` names the violated
///    constraint.
pub fn check_version_conflicts(
    graph: &DependencyGraph,
    catalog: &dyn UnitLookup,
) -> Result<()> {
    // target identity -> (dependent, constraint) pairs
    let mut by_target: BTreeMap<&UnitId, Vec<(&UnitId, &DependencyConstraint)>> = BTreeMap::new();
    for (from, constraints) in &graph.edges {
        for constraint in constraints {
            by_target
                .entry(&constraint.target)
                .or_default()
                .push((from, constraint));
        }
    }

    for (target, constraints) in by_target {
        let combined = constraints
            .iter()
            .fold(VersionBounds::any(), |acc, (_, c)| acc.intersect(&c.bounds));

        if combined.is_empty() {
            let listed = constraints
                .iter()
                .map(|(from, c)| format!("{from} requires {}", c.bounds))
                .collect();
            return Err(version_conflict(target.to_string(), listed));
        }

        let Some(unit) = catalog.lookup(target)? else {
            continue; // absence already reported by build_graph
        };
        if let Some((from, violated)) = constraints
            .iter()
            .find(|(_, c)| !c.bounds.contains(unit.version))
        {
            return Err(missing_dependency(
                from.to_string(),
                format!("{target} {}", unit.version),
                violated.bounds.to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::{InstallableUnit, StaticCatalog};
    use crate::error::ModforgeError;
    use crate::version::Version;

    fn unit(id: &str, version: &str, deps: &[(&str, &str, bool)]) -> InstallableUnit {
        let id: UnitId = id.parse().unwrap();
        let mut unit = InstallableUnit::new(
            id.clone(),
            version.parse::<Version>().unwrap(),
            format!("/units/{id}"),
        );
        for (target, bounds, optional) in deps {
            let constraint = DependencyConstraint {
                target: target.parse().unwrap(),
                bounds: bounds.parse().unwrap(),
                optional: *optional,
            };
            unit.dependencies.push(constraint);
        }
        unit
    }

    fn ids(names: &[&str]) -> Vec<UnitId> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    #[test]
    fn test_build_graph_closure_pulls_transitive_deps() {
        let catalog = StaticCatalog::from_units([
            unit("a-top", "1.0.0", &[("b-mid", "*", false)]),
            unit("b-mid", "1.0.0", &[("c-leaf", "*", false)]),
            unit("c-leaf", "1.0.0", &[]),
        ]);

        let graph = build_graph(&ids(&["a-top"]), &catalog).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.dependencies_of(&"a-top".parse().unwrap()).len(), 1);
        assert_eq!(graph.dependencies_of(&"c-leaf".parse().unwrap()).len(), 0);
    }

    #[test]
    fn test_build_graph_optional_dep_skipped_unless_requested() {
        let catalog = StaticCatalog::from_units([
            unit("a-top", "1.0.0", &[("b-extra", "*", true)]),
            unit("b-extra", "1.0.0", &[]),
        ]);

        let graph = build_graph(&ids(&["a-top"]), &catalog).unwrap();
        assert_eq!(graph.len(), 1);

        let graph = build_graph(&ids(&["a-top", "b-extra"]), &catalog).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.dependencies_of(&"a-top".parse().unwrap()).len(), 1);
    }

    #[test]
    fn test_build_graph_missing_dependency() {
        let catalog =
            StaticCatalog::from_units([unit("a-top", "1.0.0", &[("b-gone", ">=1.0", false)])]);

        let err = build_graph(&ids(&["a-top"]), &catalog).unwrap_err();
        match err {
            ModforgeError::MissingDependency {
                unit, dependency, ..
            } => {
                assert_eq!(unit, "a-top");
                assert_eq!(dependency, "b-gone");
            }
            other => panic!("expected MissingDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_build_graph_missing_requested_unit() {
        let catalog = StaticCatalog::new();
        let err = build_graph(&ids(&["a-top"]), &catalog).unwrap_err();
        assert!(matches!(err, ModforgeError::MissingDependency { .. }));
    }

    #[test]
    fn test_version_conflict_on_disjoint_ranges() {
        let catalog = StaticCatalog::from_units([
            unit("x-one", "1.0.0", &[("d-dep", ">=2.0,<3.0", false)]),
            unit("y-two", "1.0.0", &[("d-dep", ">=3.0", false)]),
            unit("d-dep", "2.5.0", &[]),
        ]);

        let graph = build_graph(&ids(&["x-one", "y-two"]), &catalog).unwrap();
        let err = check_version_conflicts(&graph, &catalog).unwrap_err();
        match err {
            ModforgeError::VersionConflict {
                identity,
                constraints,
            } => {
                assert_eq!(identity, "d-dep");
                assert_eq!(constraints.len(), 2);
                let joined = constraints.join("; ");
                assert!(joined.contains("x-one"));
                assert!(joined.contains("y-two"));
            }
            other => panic!("expected VersionConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_resolved_version_out_of_bounds() {
        let catalog = StaticCatalog::from_units([
            unit("x-one", "1.0.0", &[("d-dep", ">=2.0", false)]),
            unit("d-dep", "1.5.0", &[]),
        ]);

        let graph = build_graph(&ids(&["x-one"]), &catalog).unwrap();
        let err = check_version_conflicts(&graph, &catalog).unwrap_err();
        assert!(matches!(err, ModforgeError::MissingDependency { .. }));
    }

    #[test]
    fn test_version_conflict_check_passes_when_satisfiable() {
        let catalog = StaticCatalog::from_units([
            unit("x-one", "1.0.0", &[("d-dep", ">=2.0,<3.0", false)]),
            unit("y-two", "1.0.0", &[("d-dep", ">=2.5", false)]),
            unit("d-dep", "2.7.0", &[]),
        ]);

        let graph = build_graph(&ids(&["x-one", "y-two"]), &catalog).unwrap();
        assert!(check_version_conflicts(&graph, &catalog).is_ok());
    }
}
