//! Meta model: bootstrapped types, set types, the default aspect, and the
//! per-field mutability policy.
//!
//! # Design
//! Every structural field of a type-like object is governed by a meta
//! attribute group (`atg.meta.<field>`) whose usage carries a
//! [`MutabilityClass`]. The comparator asks the store for that class instead
//! of hard-coding which fields may be patched, so the object model itself
//! decides. [`MetaPolicy`] is only the seed written at bootstrap.

use std::collections::BTreeMap;

use cfx_model::{MutabilityClass, ReferenceKind};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Well-known Pids
// ---------------------------------------------------------------------------

pub const META_AREA: &str = "area.meta";
pub const DEFAULT_AUTHORITY: &str = "authority.default";
pub const DEFAULT_ASPECT: &str = "asp.properties";

pub const TYPE_TYPE: &str = "type.type";
pub const TYPE_ASPECT: &str = "type.aspect";
pub const TYPE_ATTRIBUTE_LIST: &str = "type.attributeList";
pub const TYPE_ATTRIBUTE_GROUP: &str = "type.attributeGroup";
pub const TYPE_ATTRIBUTE: &str = "type.attribute";
pub const TYPE_STRING: &str = "type.stringAttributeType";
pub const TYPE_INTEGER: &str = "type.integerAttributeType";
pub const TYPE_VALUE_RANGE: &str = "type.integerValueRange";
pub const TYPE_VALUE_STATE: &str = "type.integerValueState";
pub const TYPE_DOUBLE: &str = "type.doubleAttributeType";
pub const TYPE_TIME: &str = "type.timeAttributeType";
pub const TYPE_REFERENCE: &str = "type.referenceAttributeType";
pub const TYPE_USAGE: &str = "type.attributeGroupUsage";
pub const TYPE_SET_TYPE: &str = "type.objectSetType";
pub const TYPE_SET_USE: &str = "type.objectSetUse";
pub const TYPE_SET: &str = "type.objectSet";
pub const TYPE_AREA: &str = "type.configurationArea";
pub const TYPE_CONFIGURATION_OBJECT: &str = "type.configurationObject";
pub const TYPE_DYNAMIC_OBJECT: &str = "type.dynamicObject";
pub const TYPE_AUTHORITY: &str = "type.configurationAuthority";

/// Meta types other than `type.type` itself, with their `configuring` flag.
pub(crate) const META_TYPES: [(&str, bool); 19] = [
    (TYPE_ASPECT, true),
    (TYPE_ATTRIBUTE_LIST, true),
    (TYPE_ATTRIBUTE_GROUP, true),
    (TYPE_ATTRIBUTE, true),
    (TYPE_STRING, true),
    (TYPE_INTEGER, true),
    (TYPE_VALUE_RANGE, true),
    (TYPE_VALUE_STATE, true),
    (TYPE_DOUBLE, true),
    (TYPE_TIME, true),
    (TYPE_REFERENCE, true),
    (TYPE_USAGE, true),
    (TYPE_SET_TYPE, true),
    (TYPE_SET_USE, true),
    (TYPE_SET, true),
    (TYPE_AREA, true),
    (TYPE_CONFIGURATION_OBJECT, true),
    (TYPE_DYNAMIC_OBJECT, false),
    (TYPE_AUTHORITY, true),
];

// Names of the meta sets owned by type-like objects.
pub const SET_ATTRIBUTES: &str = "attributes";
pub const SET_STATES: &str = "states";
pub const SET_USAGES: &str = "usages";
pub const SET_SUPERTYPES: &str = "superTypes";
pub const SET_ATTRIBUTE_GROUPS: &str = "attributeGroups";
pub const SET_SET_USES: &str = "setUses";
pub const SET_OBJECT_TYPES: &str = "objectTypes";

/// (set name, set type Pid, reference kind) of every meta set.
///
/// Owned substructure is a composition; references to independent type-like
/// objects are associations.
pub const META_SETS: [(&str, &str, ReferenceKind); 7] = [
    (SET_ATTRIBUTES, "settype.meta.attributes", ReferenceKind::Composition),
    (SET_STATES, "settype.meta.states", ReferenceKind::Composition),
    (SET_USAGES, "settype.meta.usages", ReferenceKind::Composition),
    (SET_SET_USES, "settype.meta.setUses", ReferenceKind::Composition),
    (SET_SUPERTYPES, "settype.meta.superTypes", ReferenceKind::Association),
    (SET_ATTRIBUTE_GROUPS, "settype.meta.attributeGroups", ReferenceKind::Association),
    (SET_OBJECT_TYPES, "settype.meta.objectTypes", ReferenceKind::Association),
];

pub fn meta_set_type(set_name: &str) -> Option<&'static str> {
    META_SETS
        .iter()
        .find(|(name, _, _)| *name == set_name)
        .map(|(_, set_type, _)| *set_type)
}

// Housekeeping groups maintained by the service itself.
pub const ATG_PENDING_AUTHORITY: &str = "atg.pendingAuthorityChange";
pub const ATG_AREA_TRANSFER: &str = "atg.areaTransferInfo";

pub const ATT_META_REFERENCE: &str = "att.meta.reference";
pub const ATT_META_VERSION: &str = "att.meta.version";

// ---------------------------------------------------------------------------
// MetaField
// ---------------------------------------------------------------------------

/// Structural field of a type-like object governed by the meta model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaField {
    Name,
    Info,
    StringTypeProperties,
    IntegerTypeProperties,
    ValueRange,
    ValueStates,
    DoubleTypeProperties,
    TimeTypeProperties,
    ReferenceTypeProperties,
    AttributeProperties,
    AttributeMembership,
    AttributeGroupProperties,
    AttributeGroupUsages,
    ObjectSetTypeProperties,
    SetTypeElementTypes,
    TypeSupertypes,
    TypeAttributeGroups,
    TypeSetUses,
    DynamicTypeProperties,
    DefaultParameters,
    AreaChangeLog,
}

impl MetaField {
    pub const ALL: [MetaField; 21] = [
        MetaField::Name,
        MetaField::Info,
        MetaField::StringTypeProperties,
        MetaField::IntegerTypeProperties,
        MetaField::ValueRange,
        MetaField::ValueStates,
        MetaField::DoubleTypeProperties,
        MetaField::TimeTypeProperties,
        MetaField::ReferenceTypeProperties,
        MetaField::AttributeProperties,
        MetaField::AttributeMembership,
        MetaField::AttributeGroupProperties,
        MetaField::AttributeGroupUsages,
        MetaField::ObjectSetTypeProperties,
        MetaField::SetTypeElementTypes,
        MetaField::TypeSupertypes,
        MetaField::TypeAttributeGroups,
        MetaField::TypeSetUses,
        MetaField::DynamicTypeProperties,
        MetaField::DefaultParameters,
        MetaField::AreaChangeLog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetaField::Name => "name",
            MetaField::Info => "info",
            MetaField::StringTypeProperties => "stringType",
            MetaField::IntegerTypeProperties => "integerType",
            MetaField::ValueRange => "valueRange",
            MetaField::ValueStates => "valueStates",
            MetaField::DoubleTypeProperties => "doubleType",
            MetaField::TimeTypeProperties => "timeType",
            MetaField::ReferenceTypeProperties => "referenceType",
            MetaField::AttributeProperties => "attribute",
            MetaField::AttributeMembership => "attributeMembership",
            MetaField::AttributeGroupProperties => "attributeGroup",
            MetaField::AttributeGroupUsages => "attributeGroupUsages",
            MetaField::ObjectSetTypeProperties => "objectSetType",
            MetaField::SetTypeElementTypes => "setTypeElements",
            MetaField::TypeSupertypes => "supertypes",
            MetaField::TypeAttributeGroups => "typeAttributeGroups",
            MetaField::TypeSetUses => "typeSetUses",
            MetaField::DynamicTypeProperties => "dynamicType",
            MetaField::DefaultParameters => "defaultParameters",
            MetaField::AreaChangeLog => "areaChangeLog",
        }
    }

    /// Pid of the meta attribute group governing this field.
    pub fn attribute_group_pid(self) -> String {
        format!("atg.meta.{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MetaPolicy
// ---------------------------------------------------------------------------

/// Seed classes registered for each [`MetaField`] at bootstrap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaPolicy {
    classes: BTreeMap<MetaField, MutabilityClass>,
}

impl Default for MetaPolicy {
    fn default() -> Self {
        let classes = MetaField::ALL
            .iter()
            .map(|f| (*f, default_class(*f)))
            .collect();
        Self { classes }
    }
}

fn default_class(field: MetaField) -> MutabilityClass {
    match field {
        MetaField::Name
        | MetaField::Info
        | MetaField::DefaultParameters
        | MetaField::AreaChangeLog => MutabilityClass::OptionalChangeable,
        MetaField::AttributeMembership
        | MetaField::SetTypeElementTypes
        | MetaField::TypeAttributeGroups
        | MetaField::TypeSetUses => MutabilityClass::RequiredChangeable,
        MetaField::StringTypeProperties
        | MetaField::IntegerTypeProperties
        | MetaField::ValueRange
        | MetaField::ValueStates
        | MetaField::DoubleTypeProperties
        | MetaField::TimeTypeProperties
        | MetaField::ReferenceTypeProperties
        | MetaField::AttributeProperties
        | MetaField::AttributeGroupProperties
        | MetaField::AttributeGroupUsages
        | MetaField::ObjectSetTypeProperties
        | MetaField::TypeSupertypes
        | MetaField::DynamicTypeProperties => MutabilityClass::RequiredImmutable,
    }
}

impl MetaPolicy {
    pub fn with(mut self, field: MetaField, class: MutabilityClass) -> Self {
        self.classes.insert(field, class);
        self
    }

    pub fn class(&self, field: MetaField) -> MutabilityClass {
        self.classes
            .get(&field)
            .copied()
            .unwrap_or_else(|| default_class(field))
    }
}
