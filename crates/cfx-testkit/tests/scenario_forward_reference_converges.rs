//! Scenario: dynamic objects referencing each other out of declaration order
//!
//! # Invariants under test
//!
//! 1. An object whose dataset references a later declaration is deferred and
//!    created in a following pass; the run still reaches a fixed point.
//! 2. Declaration order costs at most one extra pass.
//! 3. A pass budget too small for the batch aborts with `NoConvergence`
//!    instead of looping.
//! 4. Re-importing the converged state changes nothing.

use cfx_model::{AttributeDecl, ConfigurationAreaProperties, DataNode, DeclaredProperty};
use cfx_reconcile::{ImportError, ImportOptions, StructuralConflict};
use cfx_store::{query, At, Data, MemoryStore, ObjectStore};
use cfx_testkit::fixtures::{
    area, current, dataset, group, import, import_with, object, object_type, reference_type, AREA,
};

/// `first` references `second`; both are dynamic.
fn bundle(first: &str, second: &str) -> ConfigurationAreaProperties {
    let mut a = object(first, "typ.node");
    a.datasets.push(dataset("atg.link", vec![DataNode::value("next", second)]));
    let mut b = object(second, "typ.node");
    b.datasets.push(dataset("atg.link", vec![DataNode::value("next", "")]));
    area(
        AREA,
        vec![
            reference_type("att.next"),
            group("atg.link", false, vec![AttributeDecl::new("next", "att.next")]),
            DeclaredProperty::SystemObjectType(object_type("typ.node", false, &["atg.link"])),
            DeclaredProperty::Object(a),
            DeclaredProperty::Object(b),
        ],
    )
}

fn reference_of(store: &MemoryStore, pid: &str) -> anyhow::Result<Option<cfx_store::ObjectId>> {
    let id = current(store, pid)?;
    let atg = current(store, "atg.link")?;
    let aspect = store.meta_id(cfx_store::meta::DEFAULT_ASPECT)?;
    let usage = query::usage_of(store, atg, aspect, At::Modifiable)?
        .ok_or_else(|| anyhow::anyhow!("no usage"))?;
    match store.dataset(id, usage.id, At::Modifiable)? {
        Some(Data::List(fields)) => match fields.as_slice() {
            [(name, Data::Reference(target))] if name == "next" => Ok(*target),
            other => anyhow::bail!("unexpected fields {other:?}"),
        },
        other => anyhow::bail!("unexpected dataset {other:?}"),
    }
}

#[test]
fn forward_reference_is_resolved_in_a_later_pass() -> anyhow::Result<()> {
    cfx_testkit::init_tracing();
    let mut store = MemoryStore::new()?;
    let report = import(&mut store, &[bundle("obj.head", "obj.tail")])?;

    assert_eq!(report.passes, 3);
    assert!(report.passes <= ImportOptions::default().max_passes);
    let tail = current(&store, "obj.tail")?;
    assert_eq!(reference_of(&store, "obj.head")?, Some(tail));
    assert_eq!(reference_of(&store, "obj.tail")?, None);

    let before = store.mutation_count();
    let again = import(&mut store, &[bundle("obj.head", "obj.tail")])?;
    assert!(again.is_unchanged(), "unexpected actions: {:?}", again.actions);
    assert_eq!(store.mutation_count(), before);
    Ok(())
}

#[test]
fn backward_reference_needs_no_extra_pass() -> anyhow::Result<()> {
    let mut store = MemoryStore::new()?;
    // Declared in dependency order: the referenced node comes first.
    let mut bundle = bundle("obj.head", "obj.tail");
    let tail = bundle.objects.pop().expect("tail declared");
    bundle.objects.insert(3, tail);

    let report = import(&mut store, &[bundle])?;
    assert_eq!(report.passes, 2);
    Ok(())
}

#[test]
fn pass_budget_bounds_the_run() {
    let mut store = MemoryStore::new().unwrap();
    let options = ImportOptions {
        max_passes: 2,
        ..ImportOptions::default()
    };
    let err = import_with(&mut store, options, &[bundle("obj.head", "obj.tail")]).unwrap_err();
    match err.downcast_ref::<ImportError>() {
        Some(ImportError::StructuralConflict(StructuralConflict::NoConvergence(2))) => {}
        other => panic!("expected NoConvergence, got {other:?}"),
    }
}
