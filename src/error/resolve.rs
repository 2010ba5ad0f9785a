//! Dependency resolution errors

use super::ModforgeError;

/// Creates a missing dependency error
pub fn missing_dependency(
    unit: impl Into<String>,
    dependency: impl Into<String>,
    constraint: impl Into<String>,
) -> ModforgeError {
    ModforgeError::MissingDependency {
        unit: unit.into(),
        dependency: dependency.into(),
        constraint: constraint.into(),
    }
}

/// Creates a version conflict error listing the offending constraints
pub fn version_conflict(
    identity: impl Into<String>,
    constraints: Vec<String>,
) -> ModforgeError {
    ModforgeError::VersionConflict {
        identity: identity.into(),
        constraints,
    }
}

/// Creates a cycle detected error carrying the identities in encounter order
pub fn cycle_detected(cycle: Vec<String>) -> ModforgeError {
    ModforgeError::CycleDetected { cycle }
}

/// Creates a catalog read error (collaborator boundary)
pub fn catalog_read_failed(
    unit: impl Into<String>,
    reason: impl Into<String>,
) -> ModforgeError {
    ModforgeError::CatalogReadFailed {
        unit: unit.into(),
        reason: reason.into(),
    }
}
