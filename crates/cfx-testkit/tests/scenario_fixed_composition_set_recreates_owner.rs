//! Scenario: shrinking a version-fixed composition set of a published object
//!
//! # Invariants under test
//!
//! 1. The membership change cannot be applied to the published object: the
//!    change is refused and the object is recreated under a new identity.
//! 2. The new object carries the declared members; the old one is
//!    invalidated and keeps its members in the published version.
//! 3. A free-form association set is edited in place instead.

use cfx_model::{ConfigurationAreaProperties, DeclaredProperty, ReferenceKind};
use cfx_reconcile::ActionKind;
use cfx_store::{At, MemoryStore, ObjectStore};
use cfx_testkit::fixtures::{
    area, current, import, object, object_set, object_type, publish, set_type, set_use, AREA,
};

const ITEMS: [&str; 3] = ["obj.item.1", "obj.item.2", "obj.item.3"];

fn bundle(members: &[&str], mutable: bool, kind: ReferenceKind) -> ConfigurationAreaProperties {
    let mut box_type = object_type("typ.box", true, &[]);
    box_type.set_uses.push(set_use("items", "set.items"));
    let mut boxed = object("obj.box", "typ.box");
    boxed.sets.push(object_set("items", members));

    let mut objects = vec![
        set_type("set.items", &["typ.item"], mutable, kind),
        DeclaredProperty::SystemObjectType(object_type("typ.item", true, &[])),
        DeclaredProperty::SystemObjectType(box_type),
        DeclaredProperty::Object(boxed),
    ];
    objects.extend(ITEMS.iter().map(|p| DeclaredProperty::Object(object(p, "typ.item"))));
    area(AREA, objects)
}

#[test]
fn fixed_composition_change_recreates_the_owner() -> anyhow::Result<()> {
    cfx_testkit::init_tracing();
    let mut store = MemoryStore::new()?;
    import(&mut store, &[bundle(&ITEMS, false, ReferenceKind::Composition)])?;
    let published = publish(&mut store, AREA)?;
    let old_box = current(&store, "obj.box")?;
    let old_set = store.set_of(old_box, "items").expect("items set");

    let report = import(&mut store, &[bundle(&ITEMS[..2], false, ReferenceKind::Composition)])?;

    assert!(report
        .refused
        .iter()
        .any(|r| r.pid.as_str() == "obj.box" && r.candidate == old_box));
    let replaced: Vec<_> = report
        .actions_of(ActionKind::Replaced)
        .filter(|a| a.pid.as_str() == "obj.box")
        .collect();
    assert_eq!(replaced.len(), 1);
    let new_box = replaced[0].id;
    assert_ne!(new_box, old_box);

    let new_set = store.set_of(new_box, "items").expect("items set on new box");
    let mut members = store.members(new_set, At::Modifiable)?;
    members.sort();
    let mut expected = vec![current(&store, ITEMS[0])?, current(&store, ITEMS[1])?];
    expected.sort();
    assert_eq!(members, expected);

    let modifiable = store.area_versions(store.object(old_box, At::Modifiable)?.area)?.modifiable();
    assert_eq!(store.object(old_box, At::Modifiable)?.not_valid_since, modifiable);
    assert!(report
        .actions_of(ActionKind::Invalidated)
        .any(|a| a.id == old_box));
    assert_eq!(store.members(old_set, At::Version(published))?.len(), 3);
    Ok(())
}

#[test]
fn free_form_association_is_edited_in_place() -> anyhow::Result<()> {
    let mut store = MemoryStore::new()?;
    import(&mut store, &[bundle(&ITEMS, true, ReferenceKind::Association)])?;
    publish(&mut store, AREA)?;
    let old_box = current(&store, "obj.box")?;

    let report = import(&mut store, &[bundle(&ITEMS[..2], true, ReferenceKind::Association)])?;

    assert!(report.refused.is_empty());
    assert_eq!(report.count(ActionKind::Replaced), 0);
    assert_eq!(current(&store, "obj.box")?, old_box);
    let set = store.set_of(old_box, "items").expect("items set");
    assert_eq!(store.members(set, At::Modifiable)?.len(), 2);
    Ok(())
}
