use cfx_model::{
    DoubleAccuracy, Info, MutabilityClass, PersistenceMode, Pid, ReferenceKind, TimeAccuracy,
};
use serde::{Deserialize, Serialize};

use crate::{AreaVersions, Data, ObjectId, Version};

// ---------------------------------------------------------------------------
// Kind / lifecycle
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Versioned configuration object with a draft phase.
    Configuring,
    /// Live immediately on creation; never versioned.
    Dynamic,
}

/// Where an object stands relative to its area's versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Created in the modifiable version, not yet published.
    Draft,
    /// Approved for a future version, not yet active.
    Released,
    /// Valid in the active version (dynamic objects: live).
    Active,
    /// No longer usable as a candidate (invalidated in a published version).
    Retired,
}

/// Lifecycle of an object with validity `[valid_since, not_valid_since)`.
pub(crate) fn classify(
    kind: ObjectKind,
    valid_since: Version,
    not_valid_since: Version,
    versions: &AreaVersions,
) -> Lifecycle {
    let modifiable = versions.modifiable();
    match kind {
        ObjectKind::Dynamic => {
            if not_valid_since == 0 {
                Lifecycle::Active
            } else {
                Lifecycle::Retired
            }
        }
        ObjectKind::Configuring => {
            // An invalidation at `modifiable` is not published yet and can be undone.
            let survives = not_valid_since == 0 || not_valid_since >= modifiable;
            if valid_since >= modifiable {
                Lifecycle::Draft
            } else if !survives {
                Lifecycle::Retired
            } else if valid_since > versions.active {
                Lifecycle::Released
            } else {
                Lifecycle::Active
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectBody
// ---------------------------------------------------------------------------

/// Kind-specific structure of a stored object.
///
/// Substructure bodies (attributes, value ranges and states, usages, set uses,
/// sets) belong to an owner and are never addressed by Pid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectBody {
    Plain,
    ConfigurationArea {
        authority: Option<ObjectId>,
    },
    StringType {
        max_length: u32,
        encoding: String,
    },
    IntegerType {
        byte_count: u8,
        range: Option<ObjectId>,
    },
    IntegerValueRange {
        minimum: i64,
        maximum: i64,
        scale: f64,
        unit: String,
    },
    IntegerValueState {
        value: i64,
    },
    DoubleType {
        unit: String,
        accuracy: DoubleAccuracy,
    },
    TimeType {
        relative: bool,
        accuracy: TimeAccuracy,
    },
    ReferenceType {
        referenced_type: Option<ObjectId>,
        undefined_allowed: bool,
        reference_kind: ReferenceKind,
    },
    Attribute {
        position: u32,
        max_count: u32,
        variable_count: bool,
        attribute_type: ObjectId,
        default: Option<String>,
    },
    AttributeList,
    AttributeGroup {
        configuring: bool,
        parameter: bool,
    },
    AttributeGroupUsage {
        attribute_group: ObjectId,
        aspect: ObjectId,
        usage: MutabilityClass,
        explicit: bool,
    },
    ObjectSetType {
        minimum: u32,
        maximum: u32,
        mutable: bool,
        reference_kind: ReferenceKind,
    },
    ObjectSetUse {
        set_name: String,
        set_type: ObjectId,
        required: bool,
    },
    SystemObjectType {
        configuring: bool,
        persistence_mode: Option<PersistenceMode>,
    },
    ObjectSet {
        set_type: ObjectId,
    },
}

impl ObjectBody {
    /// Entities emitted as nested structure of their owner, never top-level.
    pub fn is_substructure(&self) -> bool {
        matches!(
            self,
            ObjectBody::Attribute { .. }
                | ObjectBody::IntegerValueRange { .. }
                | ObjectBody::IntegerValueState { .. }
                | ObjectBody::AttributeGroupUsage { .. }
                | ObjectBody::ObjectSetUse { .. }
                | ObjectBody::ObjectSet { .. }
        )
    }

    /// Types usable as the type of an attribute.
    pub fn is_attribute_type(&self) -> bool {
        matches!(
            self,
            ObjectBody::StringType { .. }
                | ObjectBody::IntegerType { .. }
                | ObjectBody::DoubleType { .. }
                | ObjectBody::TimeType { .. }
                | ObjectBody::ReferenceType { .. }
                | ObjectBody::AttributeList
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ObjectBody::Plain => "plain",
            ObjectBody::ConfigurationArea { .. } => "configuration_area",
            ObjectBody::StringType { .. } => "string_type",
            ObjectBody::IntegerType { .. } => "integer_type",
            ObjectBody::IntegerValueRange { .. } => "integer_value_range",
            ObjectBody::IntegerValueState { .. } => "integer_value_state",
            ObjectBody::DoubleType { .. } => "double_type",
            ObjectBody::TimeType { .. } => "time_type",
            ObjectBody::ReferenceType { .. } => "reference_type",
            ObjectBody::Attribute { .. } => "attribute",
            ObjectBody::AttributeList => "attribute_list",
            ObjectBody::AttributeGroup { .. } => "attribute_group",
            ObjectBody::AttributeGroupUsage { .. } => "attribute_group_usage",
            ObjectBody::ObjectSetType { .. } => "object_set_type",
            ObjectBody::ObjectSetUse { .. } => "object_set_use",
            ObjectBody::SystemObjectType { .. } => "system_object_type",
            ObjectBody::ObjectSet { .. } => "object_set",
        }
    }
}

// ---------------------------------------------------------------------------
// Views / creation requests
// ---------------------------------------------------------------------------

/// Snapshot of one object as read at a given version.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectView {
    pub id: ObjectId,
    pub pid: Pid,
    pub name: String,
    pub info: Info,
    pub type_id: ObjectId,
    pub area: ObjectId,
    pub kind: ObjectKind,
    pub owner: Option<ObjectId>,
    pub valid_since: Version,
    pub not_valid_since: Version,
    pub body: ObjectBody,
}

impl ObjectView {
    pub fn is_valid_at(&self, version: Version) -> bool {
        match self.kind {
            ObjectKind::Dynamic => self.not_valid_since == 0,
            ObjectKind::Configuring => {
                self.valid_since <= version
                    && (self.not_valid_since == 0 || self.not_valid_since > version)
            }
        }
    }

    pub fn lifecycle(&self, versions: &AreaVersions) -> Lifecycle {
        classify(self.kind, self.valid_since, self.not_valid_since, versions)
    }

    /// `true` once the object appears in any published version.
    pub fn is_published(&self, versions: &AreaVersions) -> bool {
        match self.kind {
            ObjectKind::Dynamic => true,
            ObjectKind::Configuring => self.valid_since < versions.modifiable(),
        }
    }
}

/// Everything needed to create an object.
///
/// Dynamic objects are live immediately, so `datasets` must already hold every
/// required dataset of their type.
#[derive(Clone, Debug, PartialEq)]
pub struct NewObject {
    pub area: ObjectId,
    pub type_id: ObjectId,
    pub pid: Pid,
    pub name: String,
    pub info: Info,
    pub kind: ObjectKind,
    pub owner: Option<ObjectId>,
    pub body: ObjectBody,
    /// (usage id, value) pairs written together with the object.
    pub datasets: Vec<(ObjectId, Data)>,
}

impl NewObject {
    pub fn configuring(area: ObjectId, type_id: ObjectId, pid: Pid, name: impl Into<String>, body: ObjectBody) -> Self {
        Self {
            area,
            type_id,
            pid,
            name: name.into(),
            info: Info::default(),
            kind: ObjectKind::Configuring,
            owner: None,
            body,
            datasets: Vec::new(),
        }
    }

    pub fn owned_by(mut self, owner: ObjectId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(valid_since: Version, not_valid_since: Version) -> ObjectView {
        ObjectView {
            id: ObjectId(1),
            pid: Pid::new("p"),
            name: String::new(),
            info: Info::default(),
            type_id: ObjectId(0),
            area: ObjectId(0),
            kind: ObjectKind::Configuring,
            owner: None,
            valid_since,
            not_valid_since,
            body: ObjectBody::Plain,
        }
    }

    #[test]
    fn lifecycle_classification_against_area_versions() {
        // active 2, released up to 3, modifiable 4
        let versions = AreaVersions {
            active: 2,
            activatable: 3,
            transferable: 3,
        };
        assert_eq!(view(4, 0).lifecycle(&versions), Lifecycle::Draft);
        assert_eq!(view(3, 0).lifecycle(&versions), Lifecycle::Released);
        assert_eq!(view(1, 0).lifecycle(&versions), Lifecycle::Active);
        // invalidated only in the draft version: still a candidate
        assert_eq!(view(1, 4).lifecycle(&versions), Lifecycle::Active);
        // invalidated in a released version: gone
        assert_eq!(view(1, 3).lifecycle(&versions), Lifecycle::Retired);
    }

    #[test]
    fn validity_window_is_half_open() {
        let v = view(2, 5);
        assert!(!v.is_valid_at(1));
        assert!(v.is_valid_at(2));
        assert!(v.is_valid_at(4));
        assert!(!v.is_valid_at(5));
        assert!(view(2, 0).is_valid_at(99));
    }
}
