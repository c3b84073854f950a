//! Bundle builders and store helpers for scenario tests.
//!
//! Builders return plain model values; tests tweak fields directly before
//! wrapping them into a [`ConfigurationAreaProperties`].

use anyhow::{Context, Result};
use cfx_model::{
    AspectProperties, AttributeDecl, AttributeGroupProperties, AttributeTypeKind,
    AttributeTypeProperties, ConfigurationAreaProperties, DataNode, DatasetDecl, DeclaredProperty,
    IntegerTypeDecl, ObjectProperties, ObjectSetDecl, ObjectSetTypeProperties, PersistenceMode,
    Pid, PropertyHeader, ReferenceKind, SetUseDecl, SystemObjectTypeProperties, ValueRangeDecl,
};
use cfx_reconcile::{lookup_current, ImportOptions, ImportReport, Importer};
use cfx_store::meta::{DEFAULT_ASPECT, DEFAULT_AUTHORITY};
use cfx_store::{MemoryStore, ObjectId, Version};

/// Area every fixture bundle declares into.
pub const AREA: &str = "kv.test";

fn header(pid: &str) -> PropertyHeader {
    PropertyHeader::new(pid, pid.rsplit('.').next().unwrap_or(pid))
}

pub fn area(pid: &str, objects: Vec<DeclaredProperty>) -> ConfigurationAreaProperties {
    let mut area = ConfigurationAreaProperties::new(header(pid), DEFAULT_AUTHORITY);
    area.objects = objects;
    area
}

pub fn aspect(pid: &str) -> DeclaredProperty {
    DeclaredProperty::Aspect(AspectProperties {
        header: header(pid),
    })
}

pub fn value_range(minimum: i64, maximum: i64, unit: &str) -> ValueRangeDecl {
    ValueRangeDecl {
        minimum,
        maximum,
        scale: 1.0,
        unit: unit.to_string(),
        info: Default::default(),
    }
}

pub fn integer_type(pid: &str, byte_count: u8, range: Option<ValueRangeDecl>) -> DeclaredProperty {
    DeclaredProperty::AttributeType(AttributeTypeProperties {
        header: header(pid),
        kind: AttributeTypeKind::Integer(IntegerTypeDecl {
            byte_count,
            range,
            states: Vec::new(),
        }),
    })
}

pub fn string_type(pid: &str, max_length: u32) -> DeclaredProperty {
    DeclaredProperty::AttributeType(AttributeTypeProperties {
        header: header(pid),
        kind: AttributeTypeKind::String {
            max_length,
            encoding: String::new(),
        },
    })
}

/// Reference type accepting any object, undefined allowed.
pub fn reference_type(pid: &str) -> DeclaredProperty {
    DeclaredProperty::AttributeType(AttributeTypeProperties {
        header: header(pid),
        kind: AttributeTypeKind::Reference {
            referenced_type: None,
            undefined_allowed: true,
            reference_kind: ReferenceKind::Association,
        },
    })
}

/// Group using the default aspect with the kind's default class.
pub fn group(pid: &str, configuring: bool, attributes: Vec<AttributeDecl>) -> DeclaredProperty {
    DeclaredProperty::AttributeGroup(AttributeGroupProperties {
        header: header(pid),
        configuring,
        parameter: false,
        aspects: Vec::new(),
        attributes,
    })
}

pub fn set_type(pid: &str, element_types: &[&str], mutable: bool, kind: ReferenceKind) -> DeclaredProperty {
    DeclaredProperty::ObjectSetType(ObjectSetTypeProperties {
        header: header(pid),
        element_types: element_types.iter().map(|p| Pid::new(*p)).collect(),
        minimum: 0,
        maximum: 0,
        mutable,
        reference_kind: kind,
    })
}

pub fn object_type(pid: &str, configuring: bool, groups: &[&str]) -> SystemObjectTypeProperties {
    SystemObjectTypeProperties {
        header: header(pid),
        configuring,
        persistence_mode: (!configuring).then_some(PersistenceMode::Persistent),
        supertypes: Vec::new(),
        attribute_groups: groups.iter().map(|p| Pid::new(*p)).collect(),
        set_uses: Vec::new(),
        default_parameters: Vec::new(),
    }
}

pub fn set_use(name: &str, set_type: &str) -> SetUseDecl {
    SetUseDecl {
        name: name.to_string(),
        set_type: Pid::new(set_type),
        required: false,
    }
}

pub fn object(pid: &str, object_type: &str) -> ObjectProperties {
    ObjectProperties {
        header: header(pid),
        object_type: Pid::new(object_type),
        datasets: Vec::new(),
        sets: Vec::new(),
    }
}

/// Dataset of `group` under the default aspect.
pub fn dataset(group: &str, data: Vec<DataNode>) -> DatasetDecl {
    DatasetDecl {
        attribute_group: Pid::new(group),
        aspect: Pid::new(DEFAULT_ASPECT),
        data,
    }
}

pub fn object_set(name: &str, elements: &[&str]) -> ObjectSetDecl {
    ObjectSetDecl {
        name: name.to_string(),
        elements: elements.iter().map(|p| Pid::new(*p)).collect(),
    }
}

/// Station/part configuration exercising types, groups, datasets and sets.
///
/// `parts` lists the members of the station's association set.
pub fn station_area(parts: &[&str]) -> ConfigurationAreaProperties {
    let mut station_type = object_type("typ.station", true, &["atg.limits"]);
    station_type.set_uses.push(set_use("parts", "set.parts"));

    let mut station = object("obj.station", "typ.station");
    station.datasets.push(dataset(
        "atg.limits",
        vec![DataNode::value("limit", "250"), DataNode::value("label", "North")],
    ));
    station.sets.push(object_set("parts", parts));

    let mut objects = vec![
        integer_type("att.distance", 2, Some(value_range(0, 1000, "m"))),
        string_type("att.label", 40),
        group(
            "atg.limits",
            true,
            vec![
                AttributeDecl::new("limit", "att.distance"),
                AttributeDecl::new("label", "att.label"),
            ],
        ),
        set_type("set.parts", &["typ.part"], true, ReferenceKind::Association),
        DeclaredProperty::SystemObjectType(object_type("typ.part", true, &[])),
        DeclaredProperty::SystemObjectType(station_type),
        DeclaredProperty::Object(station),
    ];
    for part in parts {
        objects.push(DeclaredProperty::Object(object(part, "typ.part")));
    }
    area(AREA, objects)
}

// ---------------------------------------------------------------------------
// Store helpers
// ---------------------------------------------------------------------------

pub fn import(store: &mut MemoryStore, areas: &[ConfigurationAreaProperties]) -> Result<ImportReport> {
    import_with(store, ImportOptions::default(), areas)
}

pub fn import_with(
    store: &mut MemoryStore,
    options: ImportOptions,
    areas: &[ConfigurationAreaProperties],
) -> Result<ImportReport> {
    Ok(Importer::new(store, options).run(areas)?)
}

/// Object `pid` currently denotes.
pub fn current(store: &MemoryStore, pid: &str) -> Result<ObjectId> {
    lookup_current(store, &Pid::new(pid)).with_context(|| format!("no object for '{pid}'"))
}

/// Activates the modifiable version of area `pid`.
pub fn publish(store: &mut MemoryStore, pid: &str) -> Result<Version> {
    let area = current(store, pid)?;
    Ok(store.publish(area)?)
}
