//! Modforge: dependency resolution and transactional file deployment for
//! mod profiles
//!
//! The crate splits deployment into two halves with a hard boundary
//! between them:
//!
//! - **Resolution** ([`resolver`], [`planner`]) is pure: it turns a
//!   requested set of units into a validated activation order and diffs
//!   that order's desired file set against the profile's committed state.
//!   Nothing on disk changes, so any resolution error is safe to retry.
//! - **Deployment** ([`engine`]) mutates the destination under an
//!   exclusive lock, with a checkpoint taken before the first write.
//!   A failed apply rolls back to the checkpoint; only a failed rollback
//!   leaves the destination indeterminate, and that marks the profile
//!   corrupted until an operator clears it.
//!
//! Change detection is content-digest comparison only ([`hash`]); file
//! timestamps and sizes are never trusted as evidence of sameness.
//!
//! ```no_run
//! use modforge::checkpoint::CheckpointStore;
//! use modforge::domain::{StaticCatalog, UnitId};
//! use modforge::engine::DeploymentEngine;
//! use modforge::state::StateStore;
//!
//! # fn main() -> modforge::error::Result<()> {
//! let catalog = StaticCatalog::new();
//! let engine = DeploymentEngine::new(
//!     &catalog,
//!     StateStore::new("/var/lib/modforge/state"),
//!     CheckpointStore::new("/var/lib/modforge/checkpoints"),
//! );
//!
//! let requested: Vec<UnitId> = vec!["denikson-BepInExPack".parse()?];
//! let report = engine.deploy_quiet("default", "/games/valheim".as_ref(), &requested)?;
//! println!("added {} files", report.added);
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod domain;
pub mod engine;
pub mod error;
pub mod hash;
pub mod path_utils;
pub mod planner;
pub mod progress;
pub mod resolver;
pub mod state;
pub mod version;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use domain::{
    DependencyConstraint, InstallableUnit, ManifestEntry, StaticCatalog, UnitId, UnitLookup,
    UnitManifest,
};
pub use engine::{CancelToken, DeployReport, DeploymentEngine, DestinationLock};
pub use error::{ModforgeError, Result};
pub use hash::HashCache;
pub use planner::{ConflictPolicy, DiffPlan, PathConflict, PlannedAction};
pub use progress::{DeployEvent, DeployPhase};
pub use resolver::{ActivationOrder, resolve};
pub use state::{DeploymentState, StateEntry, StateStore};
pub use version::{Version, VersionBounds};
