//! Declared-vs-live comparison.
//!
//! # Purpose
//! Decide, per field, whether a stored object still matches its declaration
//! and whether each mismatch may be patched in place.
//!
//! # Design
//! - Every [`Difference`] names the [`Governor`] that rules on it: a meta or
//!   dataset-usage [`MutabilityClass`], a set's reference kind and
//!   mutability, or object identity (never patchable).
//! - A narrow set of changes is *relaxed*: accepted even under an immutable
//!   class when relaxed changes are enabled (enlarging a variable array,
//!   adding an integer state, renaming an integer state).
//! - Pure: reads the modifiable version, never writes.

use std::collections::BTreeSet;
use std::fmt;

use cfx_model::{
    AttributeDecl, AttributeGroupProperties, AttributeTypeKind, AttributeTypeProperties,
    ConfigurationAreaProperties, DeclaredProperty, MutabilityClass, ObjectProperties,
    ObjectSetTypeProperties, Pid, ReferenceKind, SystemObjectTypeProperties, ValueStateDecl,
};
use cfx_store::meta::{
    self, SET_ATTRIBUTE_GROUPS, SET_OBJECT_TYPES, SET_SET_USES, SET_SUPERTYPES,
};
use cfx_store::{query, At, MetaField, ObjectBody, ObjectId, ObjectKind, ObjectStore, ObjectView};

use crate::schema::group_schema;
use crate::values::tree_matches;
use crate::{defaults, ImportError, ResolveContext, Result};

// ---------------------------------------------------------------------------
// Difference / Governor
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetMutability {
    /// Edits take effect immediately.
    FreeForm,
    /// Membership is fixed per version.
    VersionFixed,
}

/// What decides whether a difference may be patched in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Governor {
    Class(MutabilityClass),
    Set {
        reference_kind: ReferenceKind,
        mutability: SetMutability,
    },
    Identity,
}

impl Governor {
    pub fn permits_patch(self) -> bool {
        match self {
            Governor::Class(class) => class.is_changeable(),
            Governor::Set {
                reference_kind,
                mutability,
            } => mutability == SetMutability::FreeForm || reference_kind == ReferenceKind::Association,
            Governor::Identity => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Difference {
    pub field: String,
    pub governor: Governor,
    /// Accepted under the relaxed-change policy even when the governor refuses.
    pub relaxed: bool,
    pub detail: String,
}

impl Difference {
    fn new(field: impl Into<String>, governor: Governor, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            governor,
            relaxed: false,
            detail: detail.into(),
        }
    }

    fn relaxed(mut self, relaxed: bool) -> Self {
        self.relaxed = relaxed;
        self
    }

    pub fn is_permitted(&self, relaxed_changes: bool) -> bool {
        self.governor.permits_patch() || (relaxed_changes && self.relaxed)
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.detail)
    }
}

/// `true` if every difference may be patched.
pub fn processable(diffs: &[Difference], relaxed_changes: bool) -> bool {
    diffs.iter().all(|d| d.is_permitted(relaxed_changes))
}

fn meta(store: &dyn ObjectStore, field: MetaField) -> Governor {
    Governor::Class(store.meta_class(field))
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

pub fn is_different(prop: &DeclaredProperty, obj: &ObjectView, ctx: &dyn ResolveContext) -> Result<bool> {
    Ok(!compare(prop, obj, ctx)?.is_empty())
}

pub fn is_processable(
    prop: &DeclaredProperty,
    obj: &ObjectView,
    ctx: &dyn ResolveContext,
) -> Result<bool> {
    Ok(processable(&compare(prop, obj, ctx)?, ctx.relaxed_changes()))
}

/// All differences between a declaration and a stored object.
pub fn compare(
    prop: &DeclaredProperty,
    obj: &ObjectView,
    ctx: &dyn ResolveContext,
) -> Result<Vec<Difference>> {
    let store = ctx.store();
    let mut diffs = Vec::new();

    let expected_type = match meta_type_of(prop) {
        Some(pid) => Some(store.meta_id(pid)?),
        None => match prop {
            DeclaredProperty::Object(o) => ctx.resolve(&o.object_type),
            _ => None,
        },
    };
    if expected_type != Some(obj.type_id) {
        diffs.push(Difference::new("type", Governor::Identity, "object type differs"));
    }
    if let Some(area) = ctx.declaring_area(prop.pid()) {
        if area != obj.area {
            diffs.push(Difference::new("area", Governor::Identity, "declared in another area"));
        }
    }
    if !diffs.is_empty() {
        return Ok(diffs);
    }

    let header = prop.header();
    if header.name != obj.name {
        diffs.push(Difference::new(
            "name",
            meta(store, MetaField::Name),
            format!("'{}' -> '{}'", obj.name, header.name),
        ));
    }
    if header.info != obj.info {
        diffs.push(Difference::new("info", meta(store, MetaField::Info), "info text"));
    }

    match prop {
        DeclaredProperty::Aspect(_) => {}
        DeclaredProperty::AttributeType(t) => compare_attribute_type(t, obj, ctx, &mut diffs)?,
        DeclaredProperty::AttributeList(l) => {
            compare_attributes(&l.attributes, obj.id, ctx, &mut diffs)?
        }
        DeclaredProperty::AttributeGroup(g) => compare_attribute_group(g, obj, ctx, &mut diffs)?,
        DeclaredProperty::ObjectSetType(s) => compare_set_type(s, obj, ctx, &mut diffs)?,
        DeclaredProperty::SystemObjectType(t) => compare_object_type(t, obj, ctx, &mut diffs)?,
        DeclaredProperty::ConfigurationArea(a) => compare_area(a, obj, ctx, &mut diffs)?,
        DeclaredProperty::Object(o) => compare_object(o, obj, ctx, &mut diffs)?,
    }
    Ok(diffs)
}

/// Meta type Pid a declared kind is stored as; `None` for concrete objects.
pub(crate) fn meta_type_of(prop: &DeclaredProperty) -> Option<&'static str> {
    Some(match prop {
        DeclaredProperty::Aspect(_) => meta::TYPE_ASPECT,
        DeclaredProperty::AttributeList(_) => meta::TYPE_ATTRIBUTE_LIST,
        DeclaredProperty::AttributeType(t) => match t.kind {
            AttributeTypeKind::String { .. } => meta::TYPE_STRING,
            AttributeTypeKind::Integer(_) => meta::TYPE_INTEGER,
            AttributeTypeKind::Double { .. } => meta::TYPE_DOUBLE,
            AttributeTypeKind::Time { .. } => meta::TYPE_TIME,
            AttributeTypeKind::Reference { .. } => meta::TYPE_REFERENCE,
        },
        DeclaredProperty::AttributeGroup(_) => meta::TYPE_ATTRIBUTE_GROUP,
        DeclaredProperty::ObjectSetType(_) => meta::TYPE_SET_TYPE,
        DeclaredProperty::SystemObjectType(_) => meta::TYPE_TYPE,
        DeclaredProperty::ConfigurationArea(_) => meta::TYPE_AREA,
        DeclaredProperty::Object(_) => return None,
    })
}

// ---------------------------------------------------------------------------
// Attribute types
// ---------------------------------------------------------------------------

fn compare_attribute_type(
    t: &AttributeTypeProperties,
    obj: &ObjectView,
    ctx: &dyn ResolveContext,
    diffs: &mut Vec<Difference>,
) -> Result<()> {
    let store = ctx.store();
    match (&t.kind, &obj.body) {
        (
            AttributeTypeKind::String {
                max_length,
                encoding,
            },
            ObjectBody::StringType {
                max_length: m,
                encoding: e,
            },
        ) => {
            if max_length != m || encoding != e {
                diffs.push(Difference::new(
                    "string",
                    meta(store, MetaField::StringTypeProperties),
                    format!("max length {m} -> {max_length}"),
                ));
            }
        }
        (AttributeTypeKind::Integer(decl), ObjectBody::IntegerType { byte_count, range }) => {
            if decl.byte_count != *byte_count {
                diffs.push(Difference::new(
                    "byte_count",
                    meta(store, MetaField::IntegerTypeProperties),
                    format!("{byte_count} -> {}", decl.byte_count),
                ));
            }
            match (&decl.range, range) {
                (None, None) => {}
                (Some(r), Some(id)) => {
                    let stored = store.object(*id, At::Modifiable)?;
                    let same = matches!(
                        &stored.body,
                        ObjectBody::IntegerValueRange { minimum, maximum, scale, unit }
                            if *minimum == r.minimum
                                && *maximum == r.maximum
                                && *scale == r.scale
                                && *unit == r.unit
                    );
                    if !same {
                        diffs.push(Difference::new(
                            "range",
                            meta(store, MetaField::ValueRange),
                            "value range bounds, scale or unit",
                        ));
                    }
                    if stored.info != r.info {
                        diffs.push(Difference::new(
                            "range.info",
                            meta(store, MetaField::Info),
                            "value range info",
                        ));
                    }
                }
                _ => diffs.push(Difference::new(
                    "range",
                    meta(store, MetaField::ValueRange),
                    "value range added or removed",
                )),
            }
            compare_states(&decl.states, obj.id, store, diffs)?;
        }
        (
            AttributeTypeKind::Double { unit, accuracy },
            ObjectBody::DoubleType {
                unit: u,
                accuracy: a,
            },
        ) => {
            if unit != u || accuracy != a {
                diffs.push(Difference::new(
                    "double",
                    meta(store, MetaField::DoubleTypeProperties),
                    "unit or accuracy",
                ));
            }
        }
        (
            AttributeTypeKind::Time { relative, accuracy },
            ObjectBody::TimeType {
                relative: r,
                accuracy: a,
            },
        ) => {
            if relative != r || accuracy != a {
                diffs.push(Difference::new(
                    "time",
                    meta(store, MetaField::TimeTypeProperties),
                    "relative flag or accuracy",
                ));
            }
        }
        (
            AttributeTypeKind::Reference {
                referenced_type,
                undefined_allowed,
                reference_kind,
            },
            ObjectBody::ReferenceType {
                referenced_type: rt,
                undefined_allowed: u,
                reference_kind: k,
            },
        ) => {
            let declared = referenced_type.as_ref().map(|p| ctx.resolve(p));
            let stored = rt.map(Some);
            if declared != stored || undefined_allowed != u || reference_kind != k {
                diffs.push(Difference::new(
                    "reference",
                    meta(store, MetaField::ReferenceTypeProperties),
                    "referenced type, undefined flag or kind",
                ));
            }
        }
        (kind, body) => diffs.push(Difference::new(
            "attribute_type",
            Governor::Identity,
            format!("{} declared, {} stored", kind.as_str(), body.label()),
        )),
    }
    Ok(())
}

fn compare_states(
    declared: &[ValueStateDecl],
    integer_type: ObjectId,
    store: &dyn ObjectStore,
    diffs: &mut Vec<Difference>,
) -> Result<()> {
    let governor = meta(store, MetaField::ValueStates);
    let stored: Vec<(String, i64, cfx_model::Info)> = query::states_of(store, integer_type, At::Modifiable)?
        .into_iter()
        .filter_map(|s| match s.body {
            ObjectBody::IntegerValueState { value } => Some((s.name, value, s.info)),
            _ => None,
        })
        .collect();

    for d in declared {
        match stored.iter().find(|(name, _, _)| *name == d.name) {
            Some((_, value, _)) if *value != d.value => diffs.push(Difference::new(
                "states",
                governor,
                format!("state '{}' value {} -> {}", d.name, value, d.value),
            )),
            Some((_, _, info)) if *info != d.info => diffs.push(Difference::new(
                "states",
                meta(store, MetaField::Info),
                format!("state '{}' info", d.name),
            )),
            Some(_) => {}
            None => {
                let renamed = stored.iter().find(|(name, value, _)| {
                    *value == d.value && !declared.iter().any(|o| o.name == *name)
                });
                let detail = match renamed {
                    Some((old, _, _)) => format!("state '{}' renamed to '{}'", old, d.name),
                    None => format!("state '{}' added", d.name),
                };
                diffs.push(Difference::new("states", governor, detail).relaxed(true));
            }
        }
    }
    for (name, value, _) in &stored {
        let declared_by_name = declared.iter().any(|d| d.name == *name);
        let renamed = declared.iter().any(|d| d.value == *value);
        if !declared_by_name && !renamed {
            diffs.push(Difference::new(
                "states",
                governor,
                format!("state '{name}' removed"),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Differences between one declared attribute at `position` and a stored attribute object.
pub fn compare_attribute(
    decl: &AttributeDecl,
    position: u32,
    attr: &ObjectView,
    ctx: &dyn ResolveContext,
) -> Result<Vec<Difference>> {
    let store = ctx.store();
    let governor = meta(store, MetaField::AttributeProperties);
    let mut diffs = Vec::new();
    let ObjectBody::Attribute {
        position: p,
        max_count,
        variable_count,
        attribute_type,
        default,
    } = &attr.body
    else {
        diffs.push(Difference::new("attribute", Governor::Identity, "not an attribute"));
        return Ok(diffs);
    };

    if *p != position {
        diffs.push(Difference::new(
            "position",
            meta(store, MetaField::AttributeMembership),
            format!("{p} -> {position}"),
        ));
    }
    if ctx.resolve(&decl.attribute_type) != Some(*attribute_type) {
        diffs.push(Difference::new(
            "attribute_type",
            governor,
            format!("type -> '{}'", decl.attribute_type),
        ));
    }
    if decl.variable_count != *variable_count {
        diffs.push(Difference::new("variable_count", governor, "array kind"));
    } else if decl.max_count != *max_count {
        let enlarges = *max_count != 0 && (decl.max_count == 0 || decl.max_count > *max_count);
        diffs.push(
            Difference::new(
                "max_count",
                governor,
                format!("{max_count} -> {}", decl.max_count),
            )
            .relaxed(decl.variable_count && enlarges),
        );
    }
    if decl.default != *default {
        diffs.push(Difference::new("default", governor, "default value"));
    }
    if decl.info != attr.info {
        diffs.push(Difference::new("info", meta(store, MetaField::Info), "attribute info"));
    }
    Ok(diffs)
}

fn compare_attributes(
    decls: &[AttributeDecl],
    owner: ObjectId,
    ctx: &dyn ResolveContext,
    diffs: &mut Vec<Difference>,
) -> Result<()> {
    let store = ctx.store();
    let membership = meta(store, MetaField::AttributeMembership);
    let stored = query::attributes_of(store, owner, At::Modifiable)?;

    for (i, decl) in decls.iter().enumerate() {
        match stored.iter().find(|a| a.name == decl.name) {
            None => diffs.push(Difference::new(
                "attributes",
                membership,
                format!("attribute '{}' added", decl.name),
            )),
            Some(attr) => {
                let attr_diffs = compare_attribute(decl, i as u32 + 1, attr, ctx)?;
                if processable(&attr_diffs, ctx.relaxed_changes()) {
                    diffs.extend(attr_diffs.into_iter().map(|mut d| {
                        d.field = format!("attributes.{}.{}", decl.name, d.field);
                        d
                    }));
                } else {
                    diffs.push(Difference::new(
                        "attributes",
                        membership,
                        format!("replace attribute '{}'", decl.name),
                    ));
                }
            }
        }
    }
    for attr in &stored {
        if !decls.iter().any(|d| d.name == attr.name) {
            diffs.push(Difference::new(
                "attributes",
                membership,
                format!("attribute '{}' removed", attr.name),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Attribute groups
// ---------------------------------------------------------------------------

/// (aspect, class, explicit) usages a group declaration calls for.
pub(crate) fn desired_usages(
    g: &AttributeGroupProperties,
    ctx: &dyn ResolveContext,
) -> Vec<(Pid, Option<ObjectId>, MutabilityClass, bool)> {
    if g.aspects.is_empty() {
        let class = if g.configuring {
            MutabilityClass::RequiredImmutable
        } else {
            MutabilityClass::OnlineEither
        };
        let aspect = ctx.default_aspect().clone();
        let id = ctx.resolve(&aspect);
        return vec![(aspect, id, class, false)];
    }
    g.aspects
        .iter()
        .map(|a| (a.aspect.clone(), ctx.resolve(&a.aspect), a.usage, true))
        .collect()
}

fn compare_attribute_group(
    g: &AttributeGroupProperties,
    obj: &ObjectView,
    ctx: &dyn ResolveContext,
    diffs: &mut Vec<Difference>,
) -> Result<()> {
    let store = ctx.store();
    match obj.body {
        ObjectBody::AttributeGroup {
            configuring,
            parameter,
        } => {
            if configuring != g.configuring || parameter != g.parameter {
                diffs.push(Difference::new(
                    "attribute_group",
                    meta(store, MetaField::AttributeGroupProperties),
                    "configuring or parameter flag",
                ));
            }
        }
        _ => {
            diffs.push(Difference::new("attribute_group", Governor::Identity, "not a group"));
            return Ok(());
        }
    }

    let desired: BTreeSet<(Option<ObjectId>, MutabilityClass, bool)> = desired_usages(g, ctx)
        .into_iter()
        .map(|(_, id, class, explicit)| (id, class, explicit))
        .collect();
    let stored: BTreeSet<(Option<ObjectId>, MutabilityClass, bool)> =
        query::usages_of(store, obj.id, At::Modifiable)?
            .into_iter()
            .filter_map(|u| match u.body {
                ObjectBody::AttributeGroupUsage {
                    aspect,
                    usage,
                    explicit,
                    ..
                } => Some((Some(aspect), usage, explicit)),
                _ => None,
            })
            .collect();
    if desired != stored {
        diffs.push(Difference::new(
            "usages",
            meta(store, MetaField::AttributeGroupUsages),
            "aspect usages",
        ));
    }
    compare_attributes(&g.attributes, obj.id, ctx, diffs)
}

// ---------------------------------------------------------------------------
// Set types / object types / areas
// ---------------------------------------------------------------------------

fn resolved_set(pids: &[Pid], ctx: &dyn ResolveContext) -> BTreeSet<Option<ObjectId>> {
    pids.iter().map(|p| ctx.resolve(p)).collect()
}

fn stored_set(
    store: &dyn ObjectStore,
    owner: ObjectId,
    set_name: &str,
) -> Result<BTreeSet<Option<ObjectId>>> {
    Ok(query::members_of(store, owner, set_name, At::Modifiable)?
        .into_iter()
        .map(Some)
        .collect())
}

fn compare_set_type(
    s: &ObjectSetTypeProperties,
    obj: &ObjectView,
    ctx: &dyn ResolveContext,
    diffs: &mut Vec<Difference>,
) -> Result<()> {
    let store = ctx.store();
    let same = matches!(
        obj.body,
        ObjectBody::ObjectSetType { minimum, maximum, mutable, reference_kind }
            if minimum == s.minimum
                && maximum == s.maximum
                && mutable == s.mutable
                && reference_kind == s.reference_kind
    );
    if !same {
        diffs.push(Difference::new(
            "object_set_type",
            meta(store, MetaField::ObjectSetTypeProperties),
            "bounds, mutability or reference kind",
        ));
    }
    if resolved_set(&s.element_types, ctx) != stored_set(store, obj.id, SET_OBJECT_TYPES)? {
        diffs.push(Difference::new(
            "element_types",
            meta(store, MetaField::SetTypeElementTypes),
            "element types",
        ));
    }
    Ok(())
}

fn compare_object_type(
    t: &SystemObjectTypeProperties,
    obj: &ObjectView,
    ctx: &dyn ResolveContext,
    diffs: &mut Vec<Difference>,
) -> Result<()> {
    let store = ctx.store();
    let same = matches!(
        obj.body,
        ObjectBody::SystemObjectType { configuring, persistence_mode }
            if configuring == t.configuring && persistence_mode == t.persistence_mode
    );
    if !same {
        diffs.push(Difference::new(
            "object_type",
            meta(store, MetaField::DynamicTypeProperties),
            "configuring flag or persistence mode",
        ));
    }
    if resolved_set(&t.supertypes, ctx) != stored_set(store, obj.id, SET_SUPERTYPES)? {
        diffs.push(Difference::new(
            "supertypes",
            meta(store, MetaField::TypeSupertypes),
            "supertypes",
        ));
    }
    if resolved_set(&t.attribute_groups, ctx) != stored_set(store, obj.id, SET_ATTRIBUTE_GROUPS)? {
        diffs.push(Difference::new(
            "attribute_groups",
            meta(store, MetaField::TypeAttributeGroups),
            "attribute groups",
        ));
    }

    let stored_uses = query::member_views(store, obj.id, SET_SET_USES, At::Modifiable)?;
    let uses_match = stored_uses.len() == t.set_uses.len()
        && t.set_uses.iter().all(|d| {
            stored_uses.iter().any(|u| {
                matches!(
                    u.body,
                    ObjectBody::ObjectSetUse { ref set_name, set_type, required }
                        if *set_name == d.name
                            && Some(set_type) == ctx.resolve(&d.set_type)
                            && required == d.required
                )
            })
        });
    if !uses_match {
        diffs.push(Difference::new(
            "set_uses",
            meta(store, MetaField::TypeSetUses),
            "set uses",
        ));
    }

    let usage = defaults::usage(store)?;
    let declared = defaults::encode(&t.default_parameters, ctx)?;
    if declared != store.dataset(obj.id, usage, At::Modifiable)? {
        diffs.push(Difference::new(
            "default_parameters",
            meta(store, MetaField::DefaultParameters),
            "default parameters",
        ));
    }
    Ok(())
}

fn compare_area(
    a: &ConfigurationAreaProperties,
    obj: &ObjectView,
    ctx: &dyn ResolveContext,
    diffs: &mut Vec<Difference>,
) -> Result<()> {
    let store = ctx.store();
    if store.change_log(obj.id, At::Modifiable)? != a.change_log {
        diffs.push(Difference::new(
            "change_log",
            meta(store, MetaField::AreaChangeLog),
            "change log",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Concrete objects
// ---------------------------------------------------------------------------

/// `configuring` flag of a type, declaration first.
pub(crate) fn type_is_configuring(ctx: &dyn ResolveContext, type_pid: &Pid) -> Result<bool> {
    if let Some(DeclaredProperty::SystemObjectType(t)) = ctx.declared(type_pid) {
        return Ok(t.configuring);
    }
    let id = ctx
        .resolve(type_pid)
        .ok_or_else(|| ImportError::unresolved(type_pid, "object type"))?;
    match ctx.store().object(id, At::Modifiable)?.body {
        ObjectBody::SystemObjectType { configuring, .. } => Ok(configuring),
        other => Err(ImportError::invalid(
            type_pid,
            format!("{} used as object type", other.label()),
        )),
    }
}

/// Usage id and class a declared dataset is stored under, if it exists yet.
pub(crate) fn dataset_usage(
    ctx: &dyn ResolveContext,
    attribute_group: &Pid,
    aspect: &Pid,
) -> Result<Option<(ObjectId, MutabilityClass)>> {
    let atg = ctx
        .resolve(attribute_group)
        .ok_or_else(|| ImportError::unresolved(attribute_group, "dataset attribute group"))?;
    let aspect = ctx
        .resolve(aspect)
        .ok_or_else(|| ImportError::unresolved(aspect, "dataset aspect"))?;
    Ok(query::usage_of(ctx.store(), atg, aspect, At::Modifiable)?.and_then(|u| match u.body {
        ObjectBody::AttributeGroupUsage { usage, .. } => Some((u.id, usage)),
        _ => None,
    }))
}

/// Governor of the set named `set_name` on `obj`.
pub(crate) fn set_governor(
    store: &dyn ObjectStore,
    obj: &ObjectView,
    set_name: &str,
) -> Result<Option<Governor>> {
    let set_type = match store.set_of(obj.id, set_name) {
        Some(set) => match store.object(set, At::Modifiable)?.body {
            ObjectBody::ObjectSet { set_type } => Some(set_type),
            _ => None,
        },
        None => query::set_uses_of_type(store, obj.type_id, At::Modifiable)?
            .into_iter()
            .find_map(|u| match u.body {
                ObjectBody::ObjectSetUse { set_name: n, set_type, .. } if n == set_name => {
                    Some(set_type)
                }
                _ => None,
            }),
    };
    let Some(set_type) = set_type else {
        return Ok(None);
    };
    Ok(match store.object(set_type, At::Modifiable)?.body {
        ObjectBody::ObjectSetType {
            mutable,
            reference_kind,
            ..
        } => Some(Governor::Set {
            reference_kind,
            mutability: if mutable {
                SetMutability::FreeForm
            } else {
                SetMutability::VersionFixed
            },
        }),
        _ => None,
    })
}

fn compare_object(
    o: &ObjectProperties,
    obj: &ObjectView,
    ctx: &dyn ResolveContext,
    diffs: &mut Vec<Difference>,
) -> Result<()> {
    let store = ctx.store();
    let expected_kind = if type_is_configuring(ctx, &o.object_type)? {
        ObjectKind::Configuring
    } else {
        ObjectKind::Dynamic
    };
    if expected_kind != obj.kind {
        diffs.push(Difference::new("kind", Governor::Identity, "configuring/dynamic kind"));
        return Ok(());
    }

    let mut declared_usages = BTreeSet::new();
    for ds in &o.datasets {
        let Some((usage, class)) = dataset_usage(ctx, &ds.attribute_group, &ds.aspect)? else {
            diffs.push(Difference::new(
                "datasets",
                Governor::Identity,
                format!("no usage of '{}' for '{}'", ds.attribute_group, ds.aspect),
            ));
            continue;
        };
        declared_usages.insert(usage);
        let governor = Governor::Class(class);
        match store.dataset(obj.id, usage, At::Modifiable)? {
            None => diffs.push(Difference::new(
                "datasets",
                governor,
                format!("dataset '{}' added", ds.attribute_group),
            )),
            Some(stored) => {
                let schema = group_schema(ctx, &ds.attribute_group)?;
                if !tree_matches(&schema, &ds.data, &stored, ctx) {
                    diffs.push(Difference::new(
                        "datasets",
                        governor,
                        format!("dataset '{}' value", ds.attribute_group),
                    ));
                }
            }
        }
    }
    for (usage, _) in store.datasets(obj.id, At::Modifiable)? {
        if declared_usages.contains(&usage) {
            continue;
        }
        if let ObjectBody::AttributeGroupUsage {
            attribute_group,
            usage: class,
            ..
        } = store.object(usage, At::Modifiable)?.body
        {
            let group = query::pid_of(store, attribute_group);
            if ctx.is_hidden_group(&group) || !class.is_configuring() {
                continue;
            }
            diffs.push(Difference::new(
                "datasets",
                Governor::Class(class),
                format!("dataset '{group}' removed"),
            ));
        }
    }

    for sd in &o.sets {
        let Some(governor) = set_governor(store, obj, &sd.name)? else {
            diffs.push(Difference::new(
                "sets",
                Governor::Identity,
                format!("type has no set '{}'", sd.name),
            ));
            continue;
        };
        if resolved_set(&sd.elements, ctx) != stored_set(store, obj.id, &sd.name)? {
            diffs.push(Difference::new(
                "sets",
                governor,
                format!("set '{}' membership", sd.name),
            ));
        }
    }
    for (name, set) in store.sets_of(obj.id) {
        if o.sets.iter().any(|s| s.name == name) {
            continue;
        }
        if !store.members(set, At::Modifiable)?.is_empty() {
            let governor = set_governor(store, obj, &name)?.unwrap_or(Governor::Identity);
            diffs.push(Difference::new(
                "sets",
                governor,
                format!("set '{name}' no longer declared"),
            ));
        }
    }
    Ok(())
}
