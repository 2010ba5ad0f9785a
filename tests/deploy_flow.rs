//! End-to-end deployment lifecycle through the public API

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use modforge::checkpoint::CheckpointStore;
use modforge::domain::{DependencyConstraint, InstallableUnit, StaticCatalog, UnitId};
use modforge::engine::DeploymentEngine;
use modforge::error::ModforgeError;
use modforge::hash::HashCache;
use modforge::state::StateStore;
use modforge::version::{Version, VersionBounds};
use modforge::{UnitManifest, resolve};

/// Materialize a unit on disk and scan its manifest, the way a catalog
/// collaborator would hand units to the core
fn materialize(
    units_root: &Path,
    id: &str,
    version: (u64, u64, u64),
    deps: &[&str],
    files: &[(&str, &[u8])],
) -> InstallableUnit {
    let id: UnitId = id.parse().expect("valid unit id");
    let root = units_root.join(id.to_string());
    for (rel, bytes) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        fs::write(&path, bytes).expect("write source file");
    }
    // Packaging metadata is present on disk but never deployed
    fs::write(root.join("manifest.json"), b"{}").expect("write metadata");

    let mut cache = HashCache::default();
    let mut unit = InstallableUnit::new(
        id,
        Version::new(version.0, version.1, version.2),
        &root,
    );
    unit.manifest = UnitManifest::scan(&root, &mut cache).expect("scan manifest");
    for dep in deps {
        unit.dependencies.push(DependencyConstraint::required(
            dep.parse().expect("valid dep id"),
            VersionBounds::any(),
        ));
    }
    unit
}

struct Fixture {
    catalog: StaticCatalog,
    _units: TempDir,
    state: TempDir,
    checkpoints: TempDir,
    dest: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let units = TempDir::new().expect("units dir");
        let framework = materialize(
            units.path(),
            "denikson-BepInExPack",
            (5, 4, 22),
            &[],
            &[
                ("BepInEx/core/loader.dll", b"loader-bytes"),
                ("winhttp.dll", b"shim-bytes"),
            ],
        );
        let gameplay = materialize(
            units.path(),
            "alice-BetterCrafting",
            (1, 2, 0),
            &["denikson-BepInExPack"],
            &[
                ("BepInEx/plugins/crafting.dll", b"crafting-bytes"),
                ("BepInEx/config/shared.cfg", b"crafting-config"),
            ],
        );
        let tweaks = materialize(
            units.path(),
            "bob-CraftTweaks",
            (0, 9, 1),
            &["denikson-BepInExPack"],
            &[("BepInEx/config/shared.cfg", b"tweaks-config")],
        );

        Self {
            catalog: StaticCatalog::from_units([framework, gameplay, tweaks]),
            _units: units,
            state: TempDir::new().expect("state dir"),
            checkpoints: TempDir::new().expect("checkpoint dir"),
            dest: TempDir::new().expect("dest dir"),
        }
    }

    fn engine(&self) -> DeploymentEngine<'_> {
        DeploymentEngine::new(
            &self.catalog,
            StateStore::new(self.state.path()),
            CheckpointStore::new(self.checkpoints.path()),
        )
    }

    fn ids(names: &[&str]) -> Vec<UnitId> {
        names.iter().map(|n| n.parse().expect("valid id")).collect()
    }
}

#[test]
fn full_lifecycle_deploy_change_clear() {
    let fx = Fixture::new();
    let engine = fx.engine();

    // Requesting only the gameplay mod pulls its framework dependency in
    let order = resolve(&Fixture::ids(&["alice-BetterCrafting"]), &fx.catalog)
        .expect("resolution succeeds");
    let names: Vec<String> = order.iter().map(ToString::to_string).collect();
    assert_eq!(names, vec!["denikson-BepInExPack", "alice-BetterCrafting"]);

    let report = engine
        .deploy_quiet("default", fx.dest.path(), &Fixture::ids(&["alice-BetterCrafting"]))
        .expect("fresh deploy");
    assert_eq!(report.added, 4);
    assert!(fx.dest.path().join("BepInEx/core/loader.dll").exists());
    // Metadata files never reach the destination
    assert!(!fx.dest.path().join("manifest.json").exists());

    // Re-deploying the same set changes nothing
    let report = engine
        .deploy_quiet("default", fx.dest.path(), &Fixture::ids(&["alice-BetterCrafting"]))
        .expect("idempotent deploy");
    assert!(report.noop);

    // Adding the tweaks mod conflicts on the shared config; the later
    // activated unit wins and the collision is annotated
    let report = engine
        .deploy_quiet(
            "default",
            fx.dest.path(),
            &Fixture::ids(&["alice-BetterCrafting", "bob-CraftTweaks"]),
        )
        .expect("deploy with conflict");
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].path, "BepInEx/config/shared.cfg");
    assert_eq!(report.conflicts[0].winner.to_string(), "bob-CraftTweaks");
    assert_eq!(
        fs::read(fx.dest.path().join("BepInEx/config/shared.cfg")).expect("read shared config"),
        b"tweaks-config"
    );

    // Dropping the gameplay mod removes its files and restores the shared
    // config ownership to the tweaks mod alone
    let report = engine
        .deploy_quiet("default", fx.dest.path(), &Fixture::ids(&["bob-CraftTweaks"]))
        .expect("deploy after removal");
    assert!(report.removed >= 1);
    assert!(!fx.dest.path().join("BepInEx/plugins/crafting.dll").exists());
    // Pruned: no unit ships anything under plugins/ anymore
    assert!(!fx.dest.path().join("BepInEx/plugins").exists());

    // Clear removes every recorded file but leaves foreign files alone
    fs::write(fx.dest.path().join("savegame.db"), b"precious").expect("write user file");
    engine.clear("default", fx.dest.path()).expect("clear");
    assert!(!fx.dest.path().join("winhttp.dll").exists());
    assert!(fx.dest.path().join("savegame.db").exists());
    assert!(
        engine
            .states()
            .load("default")
            .expect("state loads")
            .is_empty()
    );
}

#[test]
fn missing_framework_fails_resolution_before_any_write() {
    let fx = Fixture::new();
    let engine = fx.engine();

    let mut orphan_catalog = StaticCatalog::new();
    let units = TempDir::new().expect("units dir");
    orphan_catalog.insert(materialize(
        units.path(),
        "carol-NeedsGone",
        (1, 0, 0),
        &["nobody-Missing"],
        &[("BepInEx/plugins/orphan.dll", b"orphan")],
    ));
    let engine2 = DeploymentEngine::new(
        &orphan_catalog,
        StateStore::new(fx.state.path()),
        CheckpointStore::new(fx.checkpoints.path()),
    );

    let err = engine2
        .deploy_quiet("default", fx.dest.path(), &Fixture::ids(&["carol-NeedsGone"]))
        .expect_err("resolution must fail");
    assert!(matches!(err, ModforgeError::MissingDependency { .. }));

    // Nothing was written and no state exists
    assert!(!fx.dest.path().join("BepInEx").exists());
    assert!(
        engine
            .states()
            .load("default")
            .expect("state loads")
            .is_empty()
    );
}
