//! Scenario: importing the same bundle twice
//!
//! # Invariants under test
//!
//! 1. The second run performs no store mutation at all.
//! 2. Its report only binds (kept), it creates, patches and refuses nothing.
//! 3. The same holds after the first import was published.

use cfx_reconcile::ActionKind;
use cfx_store::MemoryStore;
use cfx_testkit::fixtures::{current, import, publish, station_area, AREA};

const PARTS: [&str; 2] = ["obj.part.a", "obj.part.b"];

#[test]
fn second_import_of_drafts_changes_nothing() -> anyhow::Result<()> {
    cfx_testkit::init_tracing();
    let mut store = MemoryStore::new()?;
    let bundle = station_area(&PARTS);

    let first = import(&mut store, std::slice::from_ref(&bundle))?;
    assert!(first.count(ActionKind::Created) > 0);
    let station = current(&store, "obj.station")?;

    let before = store.mutation_count();
    let second = import(&mut store, &[bundle])?;
    assert_eq!(store.mutation_count(), before);
    assert!(second.is_unchanged(), "unexpected actions: {:?}", second.actions);
    assert_eq!(current(&store, "obj.station")?, station);
    Ok(())
}

#[test]
fn import_after_publish_changes_nothing() -> anyhow::Result<()> {
    let mut store = MemoryStore::new()?;
    let bundle = station_area(&PARTS);
    import(&mut store, std::slice::from_ref(&bundle))?;
    publish(&mut store, AREA)?;

    let before = store.mutation_count();
    let report = import(&mut store, &[bundle])?;
    assert_eq!(store.mutation_count(), before);
    assert!(report.is_unchanged(), "unexpected actions: {:?}", report.actions);
    assert_eq!(report.passes, 2);
    Ok(())
}
