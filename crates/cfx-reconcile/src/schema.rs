//! Attribute-group schemas used to type dataset trees.
//!
//! # Design
//! A schema can be derived from the batch (declared-first) or from the store.
//! The importer always prefers the declaration: a group that is being
//! reworked in the same run must type its datasets by the new attribute
//! layout, not the one still stored.

use cfx_model::{AttributeDecl, AttributeTypeKind, DeclaredProperty, Pid};
use cfx_store::{query, At, ObjectBody, ObjectId, ObjectStore};

use crate::{ImportError, ResolveContext, Result, StructuralConflict};

/// Lists nested deeper than this are treated as self-containing.
const MAX_NESTING: usize = 32;

/// Leaf or nested shape of one attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeSpec {
    String,
    Integer {
        scale: f64,
        states: Vec<(String, i64)>,
        byte_count: u8,
        /// Inclusive unscaled bounds; `None` leaves only the storage width.
        range: Option<(i64, i64)>,
    },
    Double,
    Time {
        relative: bool,
    },
    Reference,
    List(Vec<AttributeSpec>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSpec {
    pub name: String,
    pub array: bool,
    pub default: Option<String>,
    pub spec: TypeSpec,
}

// ---------------------------------------------------------------------------
// Declared-first resolution
// ---------------------------------------------------------------------------

/// Attributes of attribute group `atg`, declaration first, store second.
pub fn group_schema(ctx: &dyn ResolveContext, atg: &Pid) -> Result<Vec<AttributeSpec>> {
    match ctx.declared(atg) {
        Some(DeclaredProperty::AttributeGroup(g)) => declared_attributes(ctx, &g.attributes, 0),
        Some(other) => Err(ImportError::invalid(
            atg,
            format!("expected an attribute group, found {}", other.kind().as_str()),
        )),
        None => {
            let id = ctx
                .resolve(atg)
                .ok_or_else(|| ImportError::unresolved(atg, "attribute group"))?;
            stored_attributes(ctx.store(), id, At::Modifiable)
        }
    }
}

fn declared_attributes(
    ctx: &dyn ResolveContext,
    decls: &[AttributeDecl],
    depth: usize,
) -> Result<Vec<AttributeSpec>> {
    decls
        .iter()
        .map(|d| {
            Ok(AttributeSpec {
                name: d.name.clone(),
                array: d.is_array(),
                default: d.default.clone(),
                spec: declared_type_spec(ctx, &d.attribute_type, depth)?,
            })
        })
        .collect()
}

fn declared_type_spec(ctx: &dyn ResolveContext, pid: &Pid, depth: usize) -> Result<TypeSpec> {
    if depth > MAX_NESTING {
        return Err(StructuralConflict::AttributeListCycle(pid.clone()).into());
    }
    match ctx.declared(pid) {
        Some(DeclaredProperty::AttributeType(t)) => Ok(match &t.kind {
            AttributeTypeKind::String { .. } => TypeSpec::String,
            AttributeTypeKind::Integer(i) => TypeSpec::Integer {
                scale: i.range.as_ref().map(|r| r.scale).unwrap_or(1.0),
                states: i.states.iter().map(|s| (s.name.clone(), s.value)).collect(),
                byte_count: i.byte_count,
                range: i.range.as_ref().map(|r| (r.minimum, r.maximum)),
            },
            AttributeTypeKind::Double { .. } => TypeSpec::Double,
            AttributeTypeKind::Time { relative, .. } => TypeSpec::Time {
                relative: *relative,
            },
            AttributeTypeKind::Reference { .. } => TypeSpec::Reference,
        }),
        Some(DeclaredProperty::AttributeList(l)) => Ok(TypeSpec::List(declared_attributes(
            ctx,
            &l.attributes,
            depth + 1,
        )?)),
        Some(other) => Err(ImportError::invalid(
            pid,
            format!("{} used as attribute type", other.kind().as_str()),
        )),
        None => {
            let id = ctx
                .resolve(pid)
                .ok_or_else(|| ImportError::unresolved(pid, "attribute type"))?;
            stored_type_spec(ctx.store(), id, At::Modifiable, depth)
        }
    }
}

// ---------------------------------------------------------------------------
// Store resolution
// ---------------------------------------------------------------------------

/// Attributes of a stored list or group as read at `at`.
pub fn stored_attributes<S: ObjectStore + ?Sized>(
    store: &S,
    owner: ObjectId,
    at: At,
) -> Result<Vec<AttributeSpec>> {
    stored_attributes_at_depth(store, owner, at, 0)
}

fn stored_attributes_at_depth<S: ObjectStore + ?Sized>(
    store: &S,
    owner: ObjectId,
    at: At,
    depth: usize,
) -> Result<Vec<AttributeSpec>> {
    let mut out = Vec::new();
    for attr in query::attributes_of(store, owner, at)? {
        if let ObjectBody::Attribute {
            max_count,
            variable_count,
            attribute_type,
            default,
            ..
        } = &attr.body
        {
            out.push(AttributeSpec {
                name: attr.name.clone(),
                array: *max_count != 1 || *variable_count,
                default: default.clone(),
                spec: stored_type_spec(store, *attribute_type, at, depth)?,
            });
        }
    }
    Ok(out)
}

pub fn stored_type_spec<S: ObjectStore + ?Sized>(
    store: &S,
    type_id: ObjectId,
    at: At,
    depth: usize,
) -> Result<TypeSpec> {
    let view = store.object(type_id, at)?;
    if depth > MAX_NESTING {
        return Err(StructuralConflict::AttributeListCycle(view.pid).into());
    }
    Ok(match view.body {
        ObjectBody::StringType { .. } => TypeSpec::String,
        ObjectBody::IntegerType { byte_count, range } => {
            let (scale, range) = match range {
                Some(r) => match store.object(r, at)?.body {
                    ObjectBody::IntegerValueRange {
                        minimum,
                        maximum,
                        scale,
                        ..
                    } => (scale, Some((minimum, maximum))),
                    _ => (1.0, None),
                },
                None => (1.0, None),
            };
            let states = query::states_of(store, type_id, at)?
                .into_iter()
                .filter_map(|s| match s.body {
                    ObjectBody::IntegerValueState { value } => Some((s.name, value)),
                    _ => None,
                })
                .collect();
            TypeSpec::Integer {
                scale,
                states,
                byte_count,
                range,
            }
        }
        ObjectBody::DoubleType { .. } => TypeSpec::Double,
        ObjectBody::TimeType { relative, .. } => TypeSpec::Time { relative },
        ObjectBody::ReferenceType { .. } => TypeSpec::Reference,
        ObjectBody::AttributeList => {
            TypeSpec::List(stored_attributes_at_depth(store, type_id, at, depth + 1)?)
        }
        other => {
            return Err(ImportError::invalid(
                &view.pid,
                format!("{} used as attribute type", other.label()),
            ))
        }
    })
}
