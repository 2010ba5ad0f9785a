//! Domain types for installable units
//!
//! An installable unit is a closed data shape: identity, version, dependency
//! constraints and a file manifest. Behavior over units lives in free
//! functions and the resolver/planner modules, not in methods dispatched by
//! unit "type".

pub mod catalog;
pub mod manifest;
pub mod unit;

pub use catalog::{StaticCatalog, UnitLookup};
pub use manifest::{ManifestEntry, UnitManifest};
pub use unit::{DependencyConstraint, InstallableUnit, UnitId};
