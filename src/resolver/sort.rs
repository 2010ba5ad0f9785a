//! Cycle detection and deterministic topological ordering
//!
//! Cycle detection uses depth-first traversal with three-color marking:
//!
//! 1. **WHITE** (unvisited): node has not been processed
//! 2. **GRAY** (in progress): node is in the current traversal path
//! 3. **BLACK** (done): node has been fully processed
//!
//! Encountering a GRAY node closes a cycle; the error carries the
//! identities of the cycle in the order they were encountered.
//!
//! Ordering uses Kahn's algorithm with a lexical tie-break so the same
//! input always produces the same activation order, which is required for
//! reproducible deployments.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::domain::UnitId;
use crate::error::{Result, cycle_detected};
use crate::resolver::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Reject graphs containing a dependency cycle
///
/// # Errors
///
/// Returns `ModforgeError::CycleDetected` listing the identities in the
/// cycle, in encounter order, with the closing node repeated at the end.
pub fn detect_cycle(graph: &DependencyGraph) -> Result<()> {
    let mut colors: BTreeMap<&UnitId, Color> =
        graph.nodes().map(|id| (id, Color::White)).collect();

    for node in graph.nodes() {
        if colors.get(node) == Some(&Color::White) {
            let mut path = Vec::new();
            visit(graph, node, &mut colors, &mut path)?;
        }
    }

    Ok(())
}

fn visit<'a>(
    graph: &'a DependencyGraph,
    node: &'a UnitId,
    colors: &mut BTreeMap<&'a UnitId, Color>,
    path: &mut Vec<&'a UnitId>,
) -> Result<()> {
    match colors.get(node) {
        Some(Color::Gray) => {
            // Cycle closed: report it from its first occurrence on the path
            let start = path.iter().position(|p| *p == node).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
            cycle.push(node.to_string());
            return Err(cycle_detected(cycle));
        }
        Some(Color::Black) => return Ok(()),
        _ => {}
    }

    colors.insert(node, Color::Gray);
    path.push(node);

    for constraint in graph.dependencies_of(node) {
        // Edges may point at nodes pruned from the graph (optional targets);
        // only traverse real nodes
        if graph.contains(&constraint.target) {
            visit(graph, &constraint.target, colors, path)?;
        }
    }

    path.pop();
    colors.insert(node, Color::Black);
    Ok(())
}

/// Produce a deterministic activation order for an acyclic graph
///
/// Dependencies come before dependents. Ties between ready nodes break on
/// lexical identity order, so identical inputs yield identical output.
/// Call [`detect_cycle`] first; on a cyclic graph the returned order is
/// incomplete.
pub fn topological_order(graph: &DependencyGraph) -> Vec<UnitId> {
    // Remaining dependency count per node, and reverse edges
    let mut remaining: BTreeMap<&UnitId, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&UnitId, Vec<&UnitId>> = BTreeMap::new();

    for node in graph.nodes() {
        let deps: Vec<_> = graph
            .dependencies_of(node)
            .iter()
            .filter(|c| graph.contains(&c.target))
            .collect();
        remaining.insert(node, deps.len());
        for constraint in deps {
            dependents.entry(&constraint.target).or_default().push(node);
        }
    }

    let mut ready: BinaryHeap<Reverse<&UnitId>> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node.clone());

        for &dependent in dependents.get(node).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(count) = remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
    }

    order
}
