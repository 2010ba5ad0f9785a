//! Catalog collaborator boundary
//!
//! The catalog supplies installable units by identity. Fetching, caching and
//! archive handling are the collaborator's concern; the core only reads.

use std::collections::BTreeMap;

use crate::domain::unit::{InstallableUnit, UnitId};
use crate::error::Result;

/// Read-only lookup of installable units by identity
///
/// Read failures at this boundary surface as
/// `ModforgeError::CatalogReadFailed`; an absent unit is `Ok(None)`.
pub trait UnitLookup {
    fn lookup(&self, id: &UnitId) -> Result<Option<&InstallableUnit>>;
}

/// In-memory catalog backed by a map
///
/// The production catalog lives behind the collaborator boundary; this
/// implementation backs tests and callers that already hold all units.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    units: BTreeMap<UnitId, InstallableUnit>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units(units: impl IntoIterator<Item = InstallableUnit>) -> Self {
        let mut catalog = Self::new();
        for unit in units {
            catalog.insert(unit);
        }
        catalog
    }

    pub fn insert(&mut self, unit: InstallableUnit) {
        self.units.insert(unit.id.clone(), unit);
    }

    pub fn units(&self) -> impl Iterator<Item = &InstallableUnit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl UnitLookup for StaticCatalog {
    fn lookup(&self, id: &UnitId) -> Result<Option<&InstallableUnit>> {
        Ok(self.units.get(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::version::Version;

    #[test]
    fn test_static_catalog_lookup() {
        let id = UnitId::new("alice", "core");
        let unit = InstallableUnit::new(id.clone(), Version::new(1, 0, 0), "/units/alice-core");
        let catalog = StaticCatalog::from_units([unit]);

        assert!(catalog.lookup(&id).unwrap().is_some());
        assert!(catalog.lookup(&UnitId::new("bob", "lib")).unwrap().is_none());
    }
}
