//! Error types and handling for Modforge
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`resolve`]: Dependency resolution errors
//! - [`deploy`]: Deployment and rollback errors
//! - [`fs`]: File system errors
//! - [`state`]: Deployment state persistence errors
//!
//! Resolution errors are pure return values: nothing has been mutated when
//! one is produced, so the caller may retry after fixing the input.
//! Deployment errors are raised inside the engine's apply phase and trigger
//! an automatic rollback; [`ModforgeError::RollbackFailed`] is the single
//! terminal error that leaves the destination in an indeterminate state.

pub mod deploy;
pub mod fs;
pub mod resolve;
pub mod state;

#[allow(unused_imports)]
pub use deploy::{
    destination_in_use, destination_locked, hash_mismatch, permission_denied, rollback_failed,
};
#[allow(unused_imports)]
pub use fs::{file_not_found, file_read_failed, file_write_failed, io_error};
#[allow(unused_imports)]
pub use resolve::{catalog_read_failed, cycle_detected, missing_dependency, version_conflict};
#[allow(unused_imports)]
pub use state::{profile_corrupted, state_parse_failed};

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for Modforge operations
#[derive(Error, Diagnostic, Debug)]
pub enum ModforgeError {
    // Resolution errors
    #[error("Unit '{unit}' requires '{dependency}' ({constraint}), which cannot be satisfied")]
    #[diagnostic(
        code(modforge::resolve::missing_dependency),
        help("Install the missing unit, or check that its version falls within the constraint")
    )]
    MissingDependency {
        unit: String,
        dependency: String,
        constraint: String,
    },

    #[error("Version conflict for '{identity}': {}", constraints.join("; "))]
    #[diagnostic(
        code(modforge::resolve::version_conflict),
        help("The listed constraints produce disjoint acceptable version ranges")
    )]
    VersionConflict {
        identity: String,
        constraints: Vec<String>,
    },

    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    #[diagnostic(
        code(modforge::resolve::cycle),
        help("Remove one of the dependencies forming the cycle")
    )]
    CycleDetected { cycle: Vec<String> },

    #[error("Failed to read catalog entry for '{unit}': {reason}")]
    #[diagnostic(code(modforge::resolve::catalog_read))]
    CatalogReadFailed { unit: String, reason: String },

    // Validation errors
    #[error("Invalid unit identity: {id}")]
    #[diagnostic(
        code(modforge::unit::invalid_id),
        help("Unit identities follow the format namespace-name")
    )]
    InvalidUnitId { id: String },

    #[error("Invalid version: {input}")]
    #[diagnostic(
        code(modforge::version::invalid),
        help("Versions follow the semantic format major.minor.patch")
    )]
    InvalidVersion { input: String },

    #[error("Invalid version constraint: {input}")]
    #[diagnostic(code(modforge::version::invalid_constraint))]
    InvalidConstraint { input: String },

    #[error("Invalid manifest path '{path}': {reason}")]
    #[diagnostic(
        code(modforge::manifest::invalid_path),
        help("Manifest paths must be relative and must not escape the destination root")
    )]
    InvalidManifestPath { path: String, reason: String },

    // Deployment errors (trigger automatic rollback when raised while applying)
    #[error("Digest mismatch for '{path}': expected {expected}, got {actual}")]
    #[diagnostic(
        code(modforge::deploy::hash_mismatch),
        help("The file on disk does not match the manifest's declared digest")
    )]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Permission denied: {path}")]
    #[diagnostic(code(modforge::deploy::permission_denied))]
    PermissionDenied { path: String },

    #[error("Destination '{root}' is locked by another deployment")]
    #[diagnostic(
        code(modforge::deploy::destination_locked),
        help("Only one deployment may run against a destination root at a time")
    )]
    DestinationLocked { root: String },

    #[error("Destination '{root}' is in active use")]
    #[diagnostic(
        code(modforge::deploy::destination_in_use),
        help("Stop the process using the destination before deploying")
    )]
    DestinationInUse { root: String },

    #[error("Deployment cancelled before apply began")]
    #[diagnostic(code(modforge::deploy::cancelled))]
    Cancelled,

    // Fatal
    #[error("Rollback failed; paths left in an indeterminate state: {}", paths.join(", "))]
    #[diagnostic(
        code(modforge::deploy::rollback_failed),
        help(
            "The destination no longer matches any committed state. Inspect the listed paths manually; deployments to this profile are blocked until the corruption marker is cleared."
        )
    )]
    RollbackFailed { paths: Vec<String> },

    #[error("Profile '{profile}' is marked corrupted (marker: {marker})")]
    #[diagnostic(
        code(modforge::state::profile_corrupted),
        help("A previous rollback failed. Inspect the destination, then remove the marker file.")
    )]
    ProfileCorrupted { profile: String, marker: String },

    // State persistence errors
    #[error("Failed to parse deployment state: {path}")]
    #[diagnostic(code(modforge::state::parse_failed))]
    StateParseFailed { path: String, reason: String },

    // File system errors
    #[error("File not found: {path}")]
    #[diagnostic(code(modforge::fs::not_found))]
    FileNotFound { path: String },

    #[error("Failed to read file: {path}")]
    #[diagnostic(code(modforge::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}")]
    #[diagnostic(code(modforge::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(modforge::fs::io_error))]
    IoError { message: String },
}

impl From<std::io::Error> for ModforgeError {
    fn from(err: std::io::Error) -> Self {
        ModforgeError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ModforgeError {
    fn from(err: serde_json::Error) -> Self {
        ModforgeError::StateParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<walkdir::Error> for ModforgeError {
    fn from(err: walkdir::Error) -> Self {
        ModforgeError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, ModforgeError>;
