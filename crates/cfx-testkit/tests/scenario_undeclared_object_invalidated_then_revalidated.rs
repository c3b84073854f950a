//! Scenario: an object disappears from the bundle and comes back
//!
//! # Invariants under test
//!
//! 1. A published object no longer declared is invalidated, not deleted.
//! 2. Declared again before the invalidation is published, the very same
//!    object is revalidated; no new identity is created.
//! 3. An undeclared draft is deleted outright.
//! 4. An undeclared object carrying a dataset of a hidden attribute group is
//!    left alone.

use cfx_model::{ConfigurationAreaProperties, DeclaredProperty, Pid};
use cfx_reconcile::{ActionKind, ImportOptions};
use cfx_store::{At, MemoryStore, ObjectStore};
use cfx_testkit::fixtures::{
    area, current, import, import_with, object, object_type, publish, station_area, AREA,
};

fn bundle(objects: &[&str]) -> ConfigurationAreaProperties {
    let mut props = vec![DeclaredProperty::SystemObjectType(object_type("typ.plain", true, &[]))];
    props.extend(objects.iter().map(|p| DeclaredProperty::Object(object(p, "typ.plain"))));
    area(AREA, props)
}

#[test]
fn dropped_object_is_invalidated_and_revalidated_with_same_id() -> anyhow::Result<()> {
    cfx_testkit::init_tracing();
    let mut store = MemoryStore::new()?;
    import(&mut store, &[bundle(&["obj.a", "obj.b"])])?;
    publish(&mut store, AREA)?;
    let b = current(&store, "obj.b")?;

    // Run 2: obj.b dropped.
    let dropped = import(&mut store, &[bundle(&["obj.a"])])?;
    let invalidated: Vec<_> = dropped.actions_of(ActionKind::Invalidated).collect();
    assert_eq!(invalidated.len(), 1);
    assert_eq!(invalidated[0].id, b);
    assert_ne!(store.object(b, At::Modifiable)?.not_valid_since, 0);

    // Run 3: obj.b declared again.
    let restored = import(&mut store, &[bundle(&["obj.a", "obj.b"])])?;
    assert_eq!(current(&store, "obj.b")?, b);
    assert_eq!(restored.count(ActionKind::Created), 0);
    assert!(restored
        .actions_of(ActionKind::Revalidated)
        .any(|a| a.id == b));
    assert_eq!(store.object(b, At::Modifiable)?.not_valid_since, 0);
    Ok(())
}

#[test]
fn undeclared_draft_is_deleted() -> anyhow::Result<()> {
    let mut store = MemoryStore::new()?;
    import(&mut store, &[bundle(&["obj.a", "obj.b"])])?;
    let b = current(&store, "obj.b")?;

    let report = import(&mut store, &[bundle(&["obj.a"])])?;

    assert!(report.actions_of(ActionKind::Deleted).any(|a| a.id == b));
    assert!(store.object(b, At::Modifiable).is_err());
    assert!(current(&store, "obj.b").is_err());
    Ok(())
}

#[test]
fn object_with_hidden_dataset_survives_undeclared() -> anyhow::Result<()> {
    let mut options = ImportOptions::default();
    options.hidden_attribute_groups.push(Pid::new("atg.limits"));

    let mut store = MemoryStore::new()?;
    import_with(&mut store, options.clone(), &[station_area(&[])])?;
    publish(&mut store, AREA)?;
    let station = current(&store, "obj.station")?;

    let mut without_station = station_area(&[]);
    without_station
        .objects
        .retain(|o| o.pid().as_str() != "obj.station");
    let report = import_with(&mut store, options, &[without_station.clone()])?;
    assert!(!report.actions_of(ActionKind::Invalidated).any(|a| a.id == station));
    assert_eq!(store.object(station, At::Modifiable)?.not_valid_since, 0);

    // Without the exemption the same run retires it.
    let report = import(&mut store, &[without_station])?;
    assert!(report.actions_of(ActionKind::Invalidated).any(|a| a.id == station));
    Ok(())
}
