//! Scenario: area-level facets of a published configuration area
//!
//! # Invariants under test
//!
//! 1. A differing declared authority is recorded as pending, effective from
//!    the modifiable version; the live authority is left as it is.
//! 2. Exports at the modifiable version name the pending authority, exports
//!    of the published version the live one.
//! 3. Declared change-log entries are stored and exported verbatim.
//! 4. Importing the same bundle again changes nothing.

use chrono::{TimeZone, Utc};
use cfx_model::{ChangeLogEntry, ConfigurationAreaProperties, DeclaredProperty, ObjectProperties, Pid, PropertyHeader};
use cfx_reconcile::{lookup_current, ExportOptions, Exporter, ImportOptions, ImportReport, Importer};
use cfx_store::meta::{DEFAULT_AUTHORITY, TYPE_AUTHORITY};
use cfx_store::{At, MemoryStore, ObjectBody, ObjectStore};

const AREA: &str = "kv.site";

fn bundle(authority: &str, change_log: Vec<ChangeLogEntry>) -> ConfigurationAreaProperties {
    let mut area = ConfigurationAreaProperties::new(PropertyHeader::new(AREA, "site"), authority);
    area.change_log = change_log;
    area.objects.push(DeclaredProperty::Object(ObjectProperties {
        header: PropertyHeader::new("authority.ops", "operations"),
        object_type: Pid::new(TYPE_AUTHORITY),
        datasets: Vec::new(),
        sets: Vec::new(),
    }));
    area
}

fn import(store: &mut MemoryStore, area: ConfigurationAreaProperties) -> cfx_reconcile::Result<ImportReport> {
    Importer::new(store, ImportOptions::default()).run(&[area])
}

fn entry(version: u32, text: &str) -> ChangeLogEntry {
    ChangeLogEntry {
        version,
        author: "ops".to_string(),
        reason: String::new(),
        text: text.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

#[test]
fn authority_change_stays_pending_until_published() -> anyhow::Result<()> {
    let mut store = MemoryStore::new()?;
    import(&mut store, bundle(DEFAULT_AUTHORITY, Vec::new()))?;
    let area = lookup_current(&store, &Pid::new(AREA)).expect("area imported");
    let published = store.publish(area)?;
    let default_authority = store.meta_id(DEFAULT_AUTHORITY)?;

    import(&mut store, bundle("authority.ops", Vec::new()))?;

    match store.object(area, At::Modifiable)?.body {
        ObjectBody::ConfigurationArea { authority } => assert_eq!(authority, Some(default_authority)),
        other => panic!("unexpected area body {other:?}"),
    }
    let exporter = Exporter::new(&store, ExportOptions::default());
    let pending = exporter.export_area(&Pid::new(AREA), At::Modifiable)?;
    assert_eq!(pending.authority, Pid::new("authority.ops"));
    let live = exporter.export_area(&Pid::new(AREA), At::Version(published))?;
    assert_eq!(live.authority, Pid::new(DEFAULT_AUTHORITY));

    let before = store.mutation_count();
    let again = import(&mut store, bundle("authority.ops", Vec::new()))?;
    assert!(again.is_unchanged(), "unexpected actions: {:?}", again.actions);
    assert_eq!(store.mutation_count(), before);
    Ok(())
}

#[test]
fn change_log_round_trips() -> anyhow::Result<()> {
    let mut store = MemoryStore::new()?;
    let log = vec![entry(1, "initial"), entry(2, "added operations authority")];
    import(&mut store, bundle(DEFAULT_AUTHORITY, log.clone()))?;

    let exported = Exporter::new(&store, ExportOptions::default())
        .export_area(&Pid::new(AREA), At::Modifiable)?;
    assert_eq!(exported.change_log, log);
    assert_eq!(exported.authority, Pid::new(DEFAULT_AUTHORITY));
    Ok(())
}
