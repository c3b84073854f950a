use cfx_model::{ChangeLogEntry, Info, MutabilityClass, Pid};

use crate::{
    AreaVersions, Data, Lifecycle, MetaField, NewObject, ObjectBody, ObjectId, ObjectView,
    StoreResult, Version,
};

/// Version a read is evaluated at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum At {
    /// The modifiable (draft) version of the object's area.
    Modifiable,
    Version(Version),
}

/// Lifecycle bucket a Pid lookup is restricted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LookupScope {
    Draft,
    Released,
    Active,
}

impl LookupScope {
    pub fn matches(self, lifecycle: Lifecycle) -> bool {
        matches!(
            (self, lifecycle),
            (LookupScope::Draft, Lifecycle::Draft)
                | (LookupScope::Released, Lifecycle::Released)
                | (LookupScope::Active, Lifecycle::Active)
        )
    }
}

/// Operations the reconciliation engine needs from the versioned object graph.
///
/// Every mutation of a configuring object targets its area's modifiable
/// version; dynamic objects are written immediately. Implementations must
/// never change what a published version reads.
pub trait ObjectStore {
    // --- areas --------------------------------------------------------------

    fn area_versions(&self, area: ObjectId) -> StoreResult<AreaVersions>;

    /// Create a new configuration area; its first modifiable version is 1.
    fn create_area(
        &mut self,
        pid: &Pid,
        name: &str,
        authority: Option<ObjectId>,
    ) -> StoreResult<ObjectId>;

    fn change_log(&self, area: ObjectId, at: At) -> StoreResult<Vec<ChangeLogEntry>>;

    fn set_change_log(&mut self, area: ObjectId, entries: Vec<ChangeLogEntry>) -> StoreResult<()>;

    // --- lookup / reads -----------------------------------------------------

    /// Newest top-level object with `pid` in the given lifecycle bucket.
    fn lookup(&self, pid: &Pid, scope: LookupScope) -> Option<ObjectId>;

    fn object(&self, id: ObjectId, at: At) -> StoreResult<ObjectView>;

    /// Every object recorded in `area`, whatever its validity.
    fn objects_in_area(&self, area: ObjectId) -> StoreResult<Vec<ObjectId>>;

    fn lifecycle(&self, id: ObjectId) -> StoreResult<Lifecycle> {
        let view = self.object(id, At::Modifiable)?;
        let versions = self.area_versions(view.area)?;
        Ok(view.lifecycle(&versions))
    }

    // --- object mutations ---------------------------------------------------

    fn create_object(&mut self, new: NewObject) -> StoreResult<ObjectId>;
    fn set_name(&mut self, id: ObjectId, name: &str) -> StoreResult<()>;
    fn set_info(&mut self, id: ObjectId, info: &Info) -> StoreResult<()>;
    fn set_body(&mut self, id: ObjectId, body: ObjectBody) -> StoreResult<()>;

    /// Soft-invalidate a published object from the modifiable version on.
    fn invalidate(&mut self, id: ObjectId) -> StoreResult<()>;

    /// Undo an invalidation that has not been published yet.
    fn revalidate(&mut self, id: ObjectId) -> StoreResult<()>;

    /// Remove a draft object together with everything it owns.
    fn delete(&mut self, id: ObjectId) -> StoreResult<()>;

    // --- sets ---------------------------------------------------------------

    fn set_of(&self, owner: ObjectId, name: &str) -> Option<ObjectId>;

    /// (name, set id) of every set owned by `owner` that exists in the modifiable version.
    fn sets_of(&self, owner: ObjectId) -> Vec<(String, ObjectId)>;

    fn create_set(&mut self, owner: ObjectId, name: &str, set_type: ObjectId)
        -> StoreResult<ObjectId>;

    fn members(&self, set: ObjectId, at: At) -> StoreResult<Vec<ObjectId>>;
    fn add_member(&mut self, set: ObjectId, member: ObjectId) -> StoreResult<()>;
    fn remove_member(&mut self, set: ObjectId, member: ObjectId) -> StoreResult<()>;

    // --- datasets -----------------------------------------------------------

    fn dataset(&self, object: ObjectId, usage: ObjectId, at: At) -> StoreResult<Option<Data>>;

    /// (usage id, value) of every dataset present on `object`.
    fn datasets(&self, object: ObjectId, at: At) -> StoreResult<Vec<(ObjectId, Data)>>;

    fn set_dataset(&mut self, object: ObjectId, usage: ObjectId, data: Data) -> StoreResult<()>;
    fn remove_dataset(&mut self, object: ObjectId, usage: ObjectId) -> StoreResult<()>;

    // --- meta model ---------------------------------------------------------

    /// Mutability class the meta model registers for `field`.
    fn meta_class(&self, field: MetaField) -> MutabilityClass;

    /// Id of a bootstrapped meta object (types, set types, aspects, groups).
    fn meta_id(&self, pid: &str) -> StoreResult<ObjectId>;
}
