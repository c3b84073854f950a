//! Default-parameter datasets of object types.
//!
//! Stored on the type object under the meta usage of
//! [`MetaField::DefaultParameters`] as an array of
//! `{objectType, attributeGroup, payload}` lists, where `payload` is the
//! declared tree in its embedded binary form (one integer per byte).

use cfx_model::{binary, DataNode, DefaultParameterDecl, Pid};
use cfx_store::{query, At, Data, MetaField, ObjectId, ObjectStore};

use crate::{ImportError, ResolveContext, Result};

const OBJECT_TYPE: &str = "objectType";
const ATTRIBUTE_GROUP: &str = "attributeGroup";
const PAYLOAD: &str = "payload";

/// Usage the default parameters of every type are stored under.
pub fn usage<S: ObjectStore + ?Sized>(store: &S) -> Result<ObjectId> {
    let pid = MetaField::DefaultParameters.attribute_group_pid();
    let atg = store.meta_id(&pid)?;
    query::usages_of(store, atg, At::Modifiable)?
        .first()
        .map(|u| u.id)
        .ok_or_else(|| ImportError::unresolved(&Pid::new(pid), "meta usage"))
}

/// Stored form of the declared defaults; `None` when there are none.
///
/// Unresolvable Pids encode as undefined references so that comparing
/// against a not-yet-bound type simply reports a difference.
pub fn encode(decls: &[DefaultParameterDecl], ctx: &dyn ResolveContext) -> Result<Option<Data>> {
    if decls.is_empty() {
        return Ok(None);
    }
    let entries = decls
        .iter()
        .map(|d| -> Result<Data> {
            let payload = binary::encode(&d.data)
                .map_err(|e| ImportError::codec(PAYLOAD, d.object_type.as_str(), e.to_string()))?
                .into_iter()
                .map(|b| Data::Integer(i64::from(b)))
                .collect();
            Ok(Data::List(vec![
                (OBJECT_TYPE.to_string(), Data::Reference(ctx.resolve(&d.object_type))),
                (
                    ATTRIBUTE_GROUP.to_string(),
                    Data::Reference(ctx.resolve(&d.attribute_group)),
                ),
                (PAYLOAD.to_string(), Data::Array(payload)),
            ]))
        })
        .collect::<Result<_>>()?;
    Ok(Some(Data::Array(entries)))
}

/// Declared form of a stored defaults dataset.
pub fn decode<S: ObjectStore + ?Sized>(data: &Data, store: &S) -> Result<Vec<DefaultParameterDecl>> {
    let Data::Array(entries) = data else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let pid_at = |field: &str| {
            entry
                .field(field)
                .and_then(Data::as_reference)
                .map(|id| query::pid_of(store, id))
                .unwrap_or_default()
        };
        let bytes: Vec<u8> = match entry.field(PAYLOAD) {
            Some(Data::Array(items)) => items
                .iter()
                .filter_map(Data::as_integer)
                .map(|b| b as u8)
                .collect(),
            _ => Vec::new(),
        };
        let object_type = pid_at(OBJECT_TYPE);
        let data: Vec<DataNode> = binary::decode(&bytes).map_err(|e| {
            ImportError::codec(PAYLOAD, object_type.as_str(), e.to_string())
        })?;
        out.push(DefaultParameterDecl {
            object_type,
            attribute_group: pid_at(ATTRIBUTE_GROUP),
            data,
        });
    }
    Ok(out)
}
