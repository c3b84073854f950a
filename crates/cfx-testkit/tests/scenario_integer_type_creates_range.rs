//! Scenario: importing an integer attribute type into an empty store
//!
//! # Invariants under test
//!
//! 1. The type and its value range are created; the range is owned by the
//!    type and carries the declared window and unit.
//! 2. The report lists the area and the type as created, nothing refused.
//! 3. Exporting the area yields the declared type unchanged.

use cfx_model::Pid;
use cfx_reconcile::{ActionKind, ExportOptions, Exporter};
use cfx_store::{At, MemoryStore, ObjectBody, ObjectStore};
use cfx_testkit::fixtures::{area, current, import, integer_type, value_range, AREA};

#[test]
fn integer_type_is_created_with_its_range() -> anyhow::Result<()> {
    cfx_testkit::init_tracing();
    let mut store = MemoryStore::new()?;
    let declared = integer_type("att.distance", 2, Some(value_range(0, 1000, "m")));
    let bundle = area(AREA, vec![declared.clone()]);

    let report = import(&mut store, &[bundle])?;

    let id = current(&store, "att.distance")?;
    let ObjectBody::IntegerType {
        byte_count,
        range: Some(range),
    } = store.object(id, At::Modifiable)?.body
    else {
        panic!("integer type without range");
    };
    assert_eq!(byte_count, 2);

    let range_view = store.object(range, At::Modifiable)?;
    assert_eq!(range_view.owner, Some(id));
    match range_view.body {
        ObjectBody::IntegerValueRange {
            minimum,
            maximum,
            scale,
            unit,
        } => {
            assert_eq!((minimum, maximum), (0, 1000));
            assert_eq!(scale, 1.0);
            assert_eq!(unit, "m");
        }
        other => panic!("unexpected range body {other:?}"),
    }

    let created: Vec<&str> = report
        .actions_of(ActionKind::Created)
        .map(|a| a.pid.as_str())
        .collect();
    assert_eq!(created, vec![AREA, "att.distance"]);
    assert!(report.refused.is_empty());

    let exported = Exporter::new(&store, ExportOptions::default())
        .export_area(&Pid::new(AREA), At::Modifiable)?;
    assert_eq!(exported.objects, vec![declared]);
    Ok(())
}
