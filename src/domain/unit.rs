//! Unit identity, version constraints and the installable unit shape

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::manifest::UnitManifest;
use crate::error::{ModforgeError, Result};
use crate::version::{Version, VersionBounds};

/// Identity of an installable unit: namespace plus name
///
/// The canonical string form is `namespace-name` (the namespace may not
/// contain a hyphen; the name may). Identities order lexically on the
/// canonical form, which is the tie-break key for deterministic activation
/// orders.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId {
    pub namespace: String,
    pub name: String,
}

impl UnitId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.namespace, self.name)
    }
}

impl FromStr for UnitId {
    type Err = ModforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('-') {
            Some((namespace, name))
                if !namespace.trim().is_empty() && !name.trim().is_empty() =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(ModforgeError::InvalidUnitId { id: s.to_string() }),
        }
    }
}

impl Serialize for UnitId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UnitId::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A declared dependency of one unit on another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyConstraint {
    /// Identity of the unit this constraint targets
    pub target: UnitId,
    /// Acceptable version range for the target
    pub bounds: VersionBounds,
    /// Optional dependencies join the graph only when already activated
    pub optional: bool,
}

impl DependencyConstraint {
    pub fn required(target: UnitId, bounds: VersionBounds) -> Self {
        Self {
            target,
            bounds,
            optional: false,
        }
    }

    pub fn optional(target: UnitId, bounds: VersionBounds) -> Self {
        Self {
            target,
            bounds,
            optional: true,
        }
    }
}

impl fmt::Display for DependencyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.target, self.bounds)?;
        if self.optional {
            write!(f, " [optional]")?;
        }
        Ok(())
    }
}

/// A versioned package of files plus declared dependencies
///
/// Immutable once loaded; owned by the catalog collaborator and borrowed
/// read-only by the resolver, planner and engine. Files are assumed to be
/// materialized under `install_root` before any deployment runs.
#[derive(Debug, Clone)]
pub struct InstallableUnit {
    pub id: UnitId,
    pub version: Version,
    pub dependencies: Vec<DependencyConstraint>,
    /// Directory holding the unit's materialized files
    pub install_root: PathBuf,
    /// Ordered set of (destination-relative path, content digest)
    pub manifest: UnitManifest,
}

impl InstallableUnit {
    pub fn new(id: UnitId, version: Version, install_root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            version,
            dependencies: Vec::new(),
            install_root: install_root.into(),
            manifest: UnitManifest::default(),
        }
    }

    /// Absolute path of a manifest entry's source file
    pub fn source_file(&self, rel_path: &str) -> PathBuf {
        self.install_root.join(Path::new(rel_path))
    }

    /// Whether this unit declares any dependency on `id`
    pub fn depends_on(&self, id: &UnitId) -> bool {
        self.dependencies.iter().any(|dep| &dep.target == id)
    }
}
