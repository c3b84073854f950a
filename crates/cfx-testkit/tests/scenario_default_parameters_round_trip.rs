//! Scenario: default parameters of an object type
//!
//! # Invariants under test
//!
//! 1. Declared default parameters are stored in their embedded binary form
//!    and come back unchanged on export, nested structure included.
//! 2. Re-importing the same declaration changes nothing.
//! 3. Changing the defaults patches the type in place.

use cfx_model::{
    ConfigurationAreaProperties, DataNode, DeclaredProperty, DefaultParameterDecl, Pid,
    SystemObjectTypeProperties,
};
use cfx_reconcile::{ActionKind, ExportOptions, Exporter};
use cfx_store::{At, MemoryStore};
use cfx_testkit::fixtures::{current, import, station_area, AREA};

fn with_defaults(limit: &str) -> ConfigurationAreaProperties {
    let mut area = station_area(&[]);
    for o in &mut area.objects {
        if let DeclaredProperty::SystemObjectType(t) = o {
            if t.header.pid.as_str() == "typ.station" {
                t.default_parameters.push(DefaultParameterDecl {
                    object_type: Pid::new("typ.station"),
                    attribute_group: Pid::new("atg.limits"),
                    data: vec![DataNode::value("limit", limit), DataNode::value("label", "Grüße")],
                });
            }
        }
    }
    area
}

fn exported_station_type(store: &MemoryStore) -> anyhow::Result<SystemObjectTypeProperties> {
    let exported = Exporter::new(store, ExportOptions::default()).export_area(&Pid::new(AREA), At::Modifiable)?;
    let station = exported
        .objects
        .into_iter()
        .find_map(|o| match o {
            DeclaredProperty::SystemObjectType(t) if t.header.pid.as_str() == "typ.station" => Some(t),
            _ => None,
        })
        .expect("station type exported");
    Ok(station)
}

#[test]
fn defaults_survive_import_and_export() -> anyhow::Result<()> {
    cfx_testkit::init_tracing();
    let declared = with_defaults("100");
    let mut store = MemoryStore::new()?;
    import(&mut store, std::slice::from_ref(&declared))?;

    let station = exported_station_type(&store)?;
    assert_eq!(station.default_parameters.len(), 1);
    assert_eq!(station.default_parameters[0].object_type, Pid::new("typ.station"));
    assert_eq!(
        station.default_parameters[0].data,
        vec![DataNode::value("limit", "100"), DataNode::value("label", "Grüße")]
    );

    let before = store.mutation_count();
    let report = import(&mut store, &[declared])?;
    assert!(report.is_unchanged(), "unexpected actions: {:?}", report.actions);
    assert_eq!(store.mutation_count(), before);
    Ok(())
}

#[test]
fn changed_defaults_patch_the_type() -> anyhow::Result<()> {
    let mut store = MemoryStore::new()?;
    import(&mut store, &[with_defaults("100")])?;
    let station_type = current(&store, "typ.station")?;

    let report = import(&mut store, &[with_defaults("120")])?;
    assert!(report
        .actions_of(ActionKind::Patched)
        .any(|a| a.id == station_type && a.detail == "default_parameters"));
    assert_eq!(current(&store, "typ.station")?, station_type);
    assert_eq!(
        exported_station_type(&store)?.default_parameters[0].data[0],
        DataNode::value("limit", "120")
    );
    Ok(())
}
