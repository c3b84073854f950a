//! Read helpers over [`ObjectStore`] that walk the meta sets.
//!
//! Shared by the store's own integrity checks and by the reconciliation
//! engine. All helpers are read-only.

use std::collections::BTreeSet;

use crate::meta::{
    SET_ATTRIBUTES, SET_ATTRIBUTE_GROUPS, SET_SET_USES, SET_STATES, SET_SUPERTYPES, SET_USAGES,
};
use crate::{At, ObjectBody, ObjectId, ObjectStore, ObjectView, StoreResult};

/// Members of `owner`'s set `set_name`; empty if the set does not exist.
pub fn members_of<S: ObjectStore + ?Sized>(
    store: &S,
    owner: ObjectId,
    set_name: &str,
    at: At,
) -> StoreResult<Vec<ObjectId>> {
    match store.set_of(owner, set_name) {
        Some(set) => store.members(set, at),
        None => Ok(Vec::new()),
    }
}

pub fn member_views<S: ObjectStore + ?Sized>(
    store: &S,
    owner: ObjectId,
    set_name: &str,
    at: At,
) -> StoreResult<Vec<ObjectView>> {
    members_of(store, owner, set_name, at)?
        .into_iter()
        .map(|id| store.object(id, at))
        .collect()
}

/// Attribute objects of a list or group, in position order.
pub fn attributes_of<S: ObjectStore + ?Sized>(
    store: &S,
    owner: ObjectId,
    at: At,
) -> StoreResult<Vec<ObjectView>> {
    let mut attrs = member_views(store, owner, SET_ATTRIBUTES, at)?;
    attrs.sort_by_key(|a| match a.body {
        ObjectBody::Attribute { position, .. } => position,
        _ => u32::MAX,
    });
    Ok(attrs)
}

/// Named states of an integer type, ordered by value.
pub fn states_of<S: ObjectStore + ?Sized>(
    store: &S,
    integer_type: ObjectId,
    at: At,
) -> StoreResult<Vec<ObjectView>> {
    let mut states = member_views(store, integer_type, SET_STATES, at)?;
    states.sort_by(|a, b| {
        let va = match a.body {
            ObjectBody::IntegerValueState { value } => value,
            _ => i64::MAX,
        };
        let vb = match b.body {
            ObjectBody::IntegerValueState { value } => value,
            _ => i64::MAX,
        };
        va.cmp(&vb).then_with(|| a.name.cmp(&b.name))
    });
    Ok(states)
}

pub fn usages_of<S: ObjectStore + ?Sized>(
    store: &S,
    attribute_group: ObjectId,
    at: At,
) -> StoreResult<Vec<ObjectView>> {
    member_views(store, attribute_group, SET_USAGES, at)
}

pub fn usage_of<S: ObjectStore + ?Sized>(
    store: &S,
    attribute_group: ObjectId,
    aspect: ObjectId,
    at: At,
) -> StoreResult<Option<ObjectView>> {
    Ok(usages_of(store, attribute_group, at)?.into_iter().find(|u| {
        matches!(u.body, ObjectBody::AttributeGroupUsage { aspect: a, .. } if a == aspect)
    }))
}

/// `type_id` followed by all of its transitive supertypes, breadth first.
///
/// Tolerates cycles in stored data; each type appears once.
pub fn type_closure<S: ObjectStore + ?Sized>(
    store: &S,
    type_id: ObjectId,
    at: At,
) -> StoreResult<Vec<ObjectId>> {
    let mut seen = BTreeSet::new();
    let mut order = Vec::new();
    let mut queue = vec![type_id];
    while !queue.is_empty() {
        let mut next = Vec::new();
        for t in queue {
            if !seen.insert(t) {
                continue;
            }
            order.push(t);
            next.extend(members_of(store, t, SET_SUPERTYPES, at)?);
        }
        queue = next;
    }
    Ok(order)
}

/// Own and inherited attribute groups of a type, without duplicates.
pub fn attribute_groups_of_type<S: ObjectStore + ?Sized>(
    store: &S,
    type_id: ObjectId,
    at: At,
) -> StoreResult<Vec<ObjectId>> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for t in type_closure(store, type_id, at)? {
        for atg in members_of(store, t, SET_ATTRIBUTE_GROUPS, at)? {
            if seen.insert(atg) {
                out.push(atg);
            }
        }
    }
    Ok(out)
}

/// Own and inherited set uses of a type.
pub fn set_uses_of_type<S: ObjectStore + ?Sized>(
    store: &S,
    type_id: ObjectId,
    at: At,
) -> StoreResult<Vec<ObjectView>> {
    let mut out: Vec<ObjectView> = Vec::new();
    for t in type_closure(store, type_id, at)? {
        for set_use in member_views(store, t, SET_SET_USES, at)? {
            let duplicate = out.iter().any(|u| u.name == set_use.name);
            if !duplicate {
                out.push(set_use);
            }
        }
    }
    Ok(out)
}

/// Usages of `type_id`'s attribute groups whose class demands a dataset.
pub fn required_usages<S: ObjectStore + ?Sized>(
    store: &S,
    type_id: ObjectId,
    at: At,
) -> StoreResult<Vec<ObjectId>> {
    let mut out = Vec::new();
    for atg in attribute_groups_of_type(store, type_id, at)? {
        for usage in usages_of(store, atg, at)? {
            if let ObjectBody::AttributeGroupUsage { usage: class, .. } = usage.body {
                if class.is_required() {
                    out.push(usage.id);
                }
            }
        }
    }
    Ok(out)
}

/// Pid of `id`, or an empty Pid for unknown objects.
pub fn pid_of<S: ObjectStore + ?Sized>(store: &S, id: ObjectId) -> cfx_model::Pid {
    store
        .object(id, At::Modifiable)
        .map(|v| v.pid)
        .unwrap_or_default()
}
