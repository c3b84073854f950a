//! Pending authority changes of configuration areas.
//!
//! The live authority of an area is never rewritten by an import. A differing
//! declared authority is recorded as a `atg.pendingAuthorityChange` dataset
//! on the area object, `{authority, effectiveFrom}`, and takes effect once
//! the version `effectiveFrom` is published.

use cfx_model::Pid;
use cfx_store::meta::{ATG_PENDING_AUTHORITY, DEFAULT_ASPECT};
use cfx_store::{query, At, Data, ObjectId, ObjectStore, Version};

use crate::{ImportError, Result};

const AUTHORITY: &str = "authority";
const EFFECTIVE_FROM: &str = "effectiveFrom";

/// Usage the pending authority dataset is stored under.
pub fn usage(store: &dyn ObjectStore) -> Result<ObjectId> {
    let atg = store.meta_id(ATG_PENDING_AUTHORITY)?;
    let aspect = store.meta_id(DEFAULT_ASPECT)?;
    query::usage_of(store, atg, aspect, At::Modifiable)?
        .map(|u| u.id)
        .ok_or_else(|| ImportError::unresolved(&Pid::new(ATG_PENDING_AUTHORITY), "meta usage"))
}

pub fn encode(authority: ObjectId, effective_from: Version) -> Data {
    Data::List(vec![
        (AUTHORITY.to_string(), Data::Reference(Some(authority))),
        (EFFECTIVE_FROM.to_string(), Data::Integer(i64::from(effective_from))),
    ])
}

/// (authority, effectiveFrom) of a pending change recorded on `area`.
pub fn pending(store: &dyn ObjectStore, area: ObjectId, at: At) -> Result<Option<(ObjectId, Version)>> {
    let Some(data) = store.dataset(area, usage(store)?, at)? else {
        return Ok(None);
    };
    let authority = data.field(AUTHORITY).and_then(Data::as_reference);
    let effective_from = data
        .field(EFFECTIVE_FROM)
        .and_then(Data::as_integer)
        .and_then(|v| Version::try_from(v).ok());
    Ok(authority.zip(effective_from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfx_store::MemoryStore;

    #[test]
    fn encoded_change_reads_back_as_pending() {
        let mut store = MemoryStore::new().unwrap();
        let area = store.create_area(&Pid::new("kv.a"), "a", None).unwrap();
        let authority = store.meta_id(cfx_store::meta::DEFAULT_AUTHORITY).unwrap();
        assert_eq!(pending(&store, area, At::Modifiable).unwrap(), None);

        let usage = usage(&store).unwrap();
        store.set_dataset(area, usage, encode(authority, 1)).unwrap();
        assert_eq!(
            pending(&store, area, At::Modifiable).unwrap(),
            Some((authority, 1))
        );
    }
}
