//! Scenario: export after import reproduces the declared state
//!
//! # Invariants under test
//!
//! 1. Every declared Pid comes back, in collation order, under the declared
//!    authority.
//! 2. Importing the export into the same store is a no-op.
//! 3. Importing the export into a fresh store and exporting again yields an
//!    identical bundle.
//! 4. Bundle files written to a directory read back equal; rewriting an
//!    area moves the previous file aside.

use cfx_bundle::{BundleDirectory, BundleSettings};
use cfx_model::{DataNode, DeclaredProperty, Pid};
use cfx_reconcile::{ExportOptions, Exporter};
use cfx_store::{At, MemoryStore};
use cfx_testkit::fixtures::{import, publish, station_area, AREA};

const PARTS: [&str; 2] = ["obj.part.a", "obj.part.b"];

fn export(store: &MemoryStore, at: At) -> anyhow::Result<cfx_model::ConfigurationAreaProperties> {
    Ok(Exporter::new(store, ExportOptions::default()).export_area(&Pid::new(AREA), at)?)
}

#[test]
fn export_reimports_without_changes() -> anyhow::Result<()> {
    cfx_testkit::init_tracing();
    let declared = station_area(&PARTS);
    let mut store = MemoryStore::new()?;
    import(&mut store, std::slice::from_ref(&declared))?;

    let exported = export(&store, At::Modifiable)?;
    assert_eq!(exported.header.pid, declared.header.pid);
    assert_eq!(exported.authority, declared.authority);

    let mut declared_pids: Vec<&str> = declared.objects.iter().map(|o| o.pid().as_str()).collect();
    declared_pids.sort();
    let exported_pids: Vec<&str> = exported.objects.iter().map(|o| o.pid().as_str()).collect();
    assert_eq!(exported_pids, declared_pids);

    let station = exported
        .objects
        .iter()
        .find_map(|o| match o {
            DeclaredProperty::Object(o) if o.header.pid.as_str() == "obj.station" => Some(o),
            _ => None,
        })
        .expect("station exported");
    assert_eq!(
        station.datasets[0].data,
        vec![DataNode::value("limit", "250"), DataNode::value("label", "North")]
    );
    assert_eq!(station.sets[0].elements.len(), 2);

    let before = store.mutation_count();
    let report = import(&mut store, &[exported.clone()])?;
    assert!(report.is_unchanged(), "unexpected actions: {:?}", report.actions);
    assert_eq!(store.mutation_count(), before);

    let mut fresh = MemoryStore::new()?;
    import(&mut fresh, &[exported.clone()])?;
    assert_eq!(export(&fresh, At::Modifiable)?, exported);
    Ok(())
}

#[test]
fn exported_bundles_survive_the_directory() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let settings = BundleSettings {
        directory: tmp.path().join("bundles"),
        ..BundleSettings::default()
    };
    let dir = BundleDirectory::open(&settings)?;

    let mut store = MemoryStore::new()?;
    import(&mut store, &[station_area(&PARTS)])?;
    let version = publish(&mut store, AREA)?;

    let exporter = Exporter::new(&store, ExportOptions::default());
    let written = exporter.export_to_directory(&dir, &[Pid::new(AREA)], At::Version(version))?;
    assert_eq!(written, vec![dir.path_for(&Pid::new(AREA))?]);

    let read = dir.read_all()?;
    assert_eq!(read, vec![export(&store, At::Version(version))?]);

    exporter.export_to_directory(&dir, &[Pid::new(AREA)], At::Version(version))?;
    let backup = written[0].with_file_name(format!("{AREA}.json.bak"));
    assert!(backup.exists());
    assert_eq!(dir.read_all()?.len(), 1);
    Ok(())
}
