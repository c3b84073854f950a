use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    DataNode, DoubleAccuracy, Info, MutabilityClass, PersistenceMode, Pid, ReferenceKind,
    TimeAccuracy,
};

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Fields every declared kind carries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyHeader {
    pub pid: Pid,
    pub name: String,
    #[serde(default)]
    pub info: Info,
}

impl PropertyHeader {
    pub fn new(pid: impl Into<Pid>, name: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            name: name.into(),
            info: Info::default(),
        }
    }

    pub fn with_info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }
}

// ---------------------------------------------------------------------------
// Kind discriminant
// ---------------------------------------------------------------------------

/// Fieldless discriminant of [`DeclaredProperty`].
///
/// The declaration order is the order in which the importer resolves kinds
/// within one pass: everything a concrete object may reference comes first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKind {
    ConfigurationArea,
    Aspect,
    AttributeType,
    AttributeList,
    AttributeGroup,
    ObjectSetType,
    SystemObjectType,
    Object,
}

impl PropertyKind {
    /// Types, attribute groups and set types: everything that is not a concrete object.
    pub fn is_type_like(self) -> bool {
        !matches!(self, PropertyKind::Object | PropertyKind::ConfigurationArea)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyKind::ConfigurationArea => "configuration_area",
            PropertyKind::Aspect => "aspect",
            PropertyKind::AttributeType => "attribute_type",
            PropertyKind::AttributeList => "attribute_list",
            PropertyKind::AttributeGroup => "attribute_group",
            PropertyKind::ObjectSetType => "object_set_type",
            PropertyKind::SystemObjectType => "system_object_type",
            PropertyKind::Object => "object",
        }
    }
}

// ---------------------------------------------------------------------------
// DeclaredProperty
// ---------------------------------------------------------------------------

/// One declared node of a configuration bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "property", rename_all = "snake_case")]
pub enum DeclaredProperty {
    Aspect(AspectProperties),
    AttributeList(AttributeListProperties),
    AttributeType(AttributeTypeProperties),
    AttributeGroup(AttributeGroupProperties),
    ObjectSetType(ObjectSetTypeProperties),
    SystemObjectType(SystemObjectTypeProperties),
    ConfigurationArea(ConfigurationAreaProperties),
    Object(ObjectProperties),
}

impl DeclaredProperty {
    pub fn header(&self) -> &PropertyHeader {
        match self {
            DeclaredProperty::Aspect(p) => &p.header,
            DeclaredProperty::AttributeList(p) => &p.header,
            DeclaredProperty::AttributeType(p) => &p.header,
            DeclaredProperty::AttributeGroup(p) => &p.header,
            DeclaredProperty::ObjectSetType(p) => &p.header,
            DeclaredProperty::SystemObjectType(p) => &p.header,
            DeclaredProperty::ConfigurationArea(p) => &p.header,
            DeclaredProperty::Object(p) => &p.header,
        }
    }

    pub fn pid(&self) -> &Pid {
        &self.header().pid
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            DeclaredProperty::Aspect(_) => PropertyKind::Aspect,
            DeclaredProperty::AttributeList(_) => PropertyKind::AttributeList,
            DeclaredProperty::AttributeType(_) => PropertyKind::AttributeType,
            DeclaredProperty::AttributeGroup(_) => PropertyKind::AttributeGroup,
            DeclaredProperty::ObjectSetType(_) => PropertyKind::ObjectSetType,
            DeclaredProperty::SystemObjectType(_) => PropertyKind::SystemObjectType,
            DeclaredProperty::ConfigurationArea(_) => PropertyKind::ConfigurationArea,
            DeclaredProperty::Object(_) => PropertyKind::Object,
        }
    }
}

// ---------------------------------------------------------------------------
// Aspect
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectProperties {
    pub header: PropertyHeader,
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// One attribute of an attribute list or attribute group.
///
/// An attribute is an array when `max_count != 1` or `variable_count` is set;
/// `max_count == 0` with `variable_count` means "unbounded".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    #[serde(default)]
    pub info: Info,
    pub attribute_type: Pid,
    #[serde(default = "one")]
    pub max_count: u32,
    #[serde(default)]
    pub variable_count: bool,
    #[serde(default)]
    pub default: Option<String>,
}

fn one() -> u32 {
    1
}

impl AttributeDecl {
    pub fn new(name: impl Into<String>, attribute_type: impl Into<Pid>) -> Self {
        Self {
            name: name.into(),
            info: Info::default(),
            attribute_type: attribute_type.into(),
            max_count: 1,
            variable_count: false,
            default: None,
        }
    }

    pub fn array(mut self, max_count: u32, variable_count: bool) -> Self {
        self.max_count = max_count;
        self.variable_count = variable_count;
        self
    }

    pub fn is_array(&self) -> bool {
        self.max_count != 1 || self.variable_count
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeListProperties {
    pub header: PropertyHeader,
    pub attributes: Vec<AttributeDecl>,
}

// ---------------------------------------------------------------------------
// Attribute types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeTypeProperties {
    pub header: PropertyHeader,
    pub kind: AttributeTypeKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeTypeKind {
    String {
        max_length: u32,
        #[serde(default)]
        encoding: String,
    },
    Integer(IntegerTypeDecl),
    Double {
        #[serde(default)]
        unit: String,
        #[serde(default)]
        accuracy: DoubleAccuracy,
    },
    Time {
        relative: bool,
        #[serde(default)]
        accuracy: TimeAccuracy,
    },
    Reference {
        #[serde(default)]
        referenced_type: Option<Pid>,
        #[serde(default)]
        undefined_allowed: bool,
        reference_kind: ReferenceKind,
    },
}

impl AttributeTypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeTypeKind::String { .. } => "string",
            AttributeTypeKind::Integer(_) => "integer",
            AttributeTypeKind::Double { .. } => "double",
            AttributeTypeKind::Time { .. } => "time",
            AttributeTypeKind::Reference { .. } => "reference",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegerTypeDecl {
    /// Storage width: 1, 2, 4 or 8.
    pub byte_count: u8,
    #[serde(default)]
    pub range: Option<ValueRangeDecl>,
    #[serde(default)]
    pub states: Vec<ValueStateDecl>,
}

/// Permitted numeric window of an integer type with its display scaling.
///
/// Stored values are unscaled; the presented value is `stored * scale`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueRangeDecl {
    pub minimum: i64,
    pub maximum: i64,
    #[serde(default = "unit_scale")]
    pub scale: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub info: Info,
}

fn unit_scale() -> f64 {
    1.0
}

/// Named value of an integer type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueStateDecl {
    pub name: String,
    pub value: i64,
    #[serde(default)]
    pub info: Info,
}

// ---------------------------------------------------------------------------
// Attribute groups
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectUsageDecl {
    pub aspect: Pid,
    pub usage: MutabilityClass,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeGroupProperties {
    pub header: PropertyHeader,
    pub configuring: bool,
    #[serde(default)]
    pub parameter: bool,
    /// Empty means "the default aspect with the kind's default class".
    #[serde(default)]
    pub aspects: Vec<AspectUsageDecl>,
    pub attributes: Vec<AttributeDecl>,
}

// ---------------------------------------------------------------------------
// Object-set types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSetTypeProperties {
    pub header: PropertyHeader,
    pub element_types: Vec<Pid>,
    #[serde(default)]
    pub minimum: u32,
    /// `0` means unbounded.
    #[serde(default)]
    pub maximum: u32,
    /// Free-form (edited immediately) when `true`, version-fixed otherwise.
    pub mutable: bool,
    pub reference_kind: ReferenceKind,
}

// ---------------------------------------------------------------------------
// System object types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetUseDecl {
    pub name: String,
    pub set_type: Pid,
    #[serde(default)]
    pub required: bool,
}

/// Per-type fallback values for a parameter attribute group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultParameterDecl {
    pub object_type: Pid,
    pub attribute_group: Pid,
    pub data: Vec<DataNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemObjectTypeProperties {
    pub header: PropertyHeader,
    pub configuring: bool,
    #[serde(default)]
    pub persistence_mode: Option<PersistenceMode>,
    #[serde(default)]
    pub supertypes: Vec<Pid>,
    #[serde(default)]
    pub attribute_groups: Vec<Pid>,
    #[serde(default)]
    pub set_uses: Vec<SetUseDecl>,
    #[serde(default)]
    pub default_parameters: Vec<DefaultParameterDecl>,
}

// ---------------------------------------------------------------------------
// Configuration area (bundle root)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub version: u32,
    pub author: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Complete intended state of one configuration area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationAreaProperties {
    pub header: PropertyHeader,
    /// Pid of the configuring authority owning the area.
    pub authority: Pid,
    #[serde(default)]
    pub change_log: Vec<ChangeLogEntry>,
    #[serde(default)]
    pub objects: Vec<DeclaredProperty>,
}

impl ConfigurationAreaProperties {
    pub fn new(header: PropertyHeader, authority: impl Into<Pid>) -> Self {
        Self {
            header,
            authority: authority.into(),
            change_log: Vec::new(),
            objects: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Concrete objects
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDecl {
    pub attribute_group: Pid,
    pub aspect: Pid,
    pub data: Vec<DataNode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSetDecl {
    pub name: String,
    pub elements: Vec<Pid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectProperties {
    pub header: PropertyHeader,
    pub object_type: Pid,
    #[serde(default)]
    pub datasets: Vec<DatasetDecl>,
    #[serde(default)]
    pub sets: Vec<ObjectSetDecl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_order_puts_type_like_before_objects() {
        assert!(PropertyKind::Aspect < PropertyKind::AttributeType);
        assert!(PropertyKind::AttributeGroup < PropertyKind::SystemObjectType);
        assert!(PropertyKind::SystemObjectType < PropertyKind::Object);
        assert!(!PropertyKind::Object.is_type_like());
        assert!(PropertyKind::ObjectSetType.is_type_like());
    }

    #[test]
    fn declared_property_serializes_with_property_tag() {
        let prop = DeclaredProperty::Aspect(AspectProperties {
            header: PropertyHeader::new("asp.x", "X"),
        });
        let json = serde_json::to_value(&prop).unwrap();
        assert_eq!(json["property"], "aspect");
        assert_eq!(json["header"]["pid"], "asp.x");

        let back: DeclaredProperty = serde_json::from_value(json).unwrap();
        assert_eq!(back, prop);
    }

    #[test]
    fn attribute_array_detection() {
        let plain = AttributeDecl::new("a", "att.x");
        assert!(!plain.is_array());
        assert!(plain.clone().array(3, false).is_array());
        assert!(plain.array(1, true).is_array());
    }
}
