//! Scenario: dataset integers that the attribute type cannot hold
//!
//! # Invariants under test
//!
//! 1. Text outside the declared range, beyond the storage width, or not a
//!    finite number aborts the import with a codec error naming the
//!    attribute and the text.
//! 2. A fraction declared for an unscaled integer is rejected rather than
//!    rounded.
//! 3. The published dataset is untouched by the aborted run.
//! 4. A whole number written with a decimal point is the same value, so
//!    re-importing it changes nothing.

use cfx_model::{ConfigurationAreaProperties, DataNode, DeclaredProperty, Pid};
use cfx_reconcile::{ExportOptions, Exporter, ImportError};
use cfx_store::{At, MemoryStore};
use cfx_testkit::fixtures::{import, publish, station_area, AREA};

fn with_limit(limit: &str) -> ConfigurationAreaProperties {
    let mut area = station_area(&[]);
    for o in &mut area.objects {
        if let DeclaredProperty::Object(o) = o {
            if o.header.pid.as_str() == "obj.station" {
                o.datasets[0].data[0] = DataNode::value("limit", limit);
            }
        }
    }
    area
}

fn exported_limit(store: &MemoryStore, at: At) -> anyhow::Result<DataNode> {
    let exported = Exporter::new(store, ExportOptions::default()).export_area(&Pid::new(AREA), at)?;
    let station = exported
        .objects
        .iter()
        .find_map(|o| match o {
            DeclaredProperty::Object(o) if o.header.pid.as_str() == "obj.station" => Some(o),
            _ => None,
        })
        .expect("station exported");
    Ok(station.datasets[0].data[0].clone())
}

#[test]
fn unrepresentable_integers_abort_the_import() -> anyhow::Result<()> {
    cfx_testkit::init_tracing();
    let mut store = MemoryStore::new()?;
    import(&mut store, &[with_limit("250")])?;
    let version = publish(&mut store, AREA)?;

    for text in ["5000", "-1", "70000", "NaN", "inf", "1e30", "249.6"] {
        let err = import(&mut store, &[with_limit(text)]).unwrap_err();
        match err.downcast_ref::<ImportError>() {
            Some(ImportError::Codec { attribute, text: rejected, .. }) => {
                assert_eq!(attribute, "limit");
                assert_eq!(rejected, text);
            }
            other => panic!("{text}: expected a codec error, got {other:?}"),
        }
    }

    assert_eq!(
        exported_limit(&store, At::Version(version))?,
        DataNode::value("limit", "250")
    );
    Ok(())
}

#[test]
fn whole_number_with_decimal_point_is_unchanged() -> anyhow::Result<()> {
    let mut store = MemoryStore::new()?;
    import(&mut store, &[with_limit("250")])?;
    publish(&mut store, AREA)?;

    let before = store.mutation_count();
    let report = import(&mut store, &[with_limit("250.0")])?;
    assert!(report.is_unchanged(), "unexpected actions: {:?}", report.actions);
    assert_eq!(store.mutation_count(), before);
    Ok(())
}
