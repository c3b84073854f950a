use std::collections::BTreeMap;

use cfx_model::{ChangeLogEntry, Info, MutabilityClass, Pid, ReferenceKind};
use tracing::debug;

use crate::meta::{self, MetaField, MetaPolicy};
use crate::object::classify;
use crate::query;
use crate::{
    At, AreaVersions, Data, Lifecycle, LookupScope, NewObject, ObjectBody, ObjectId, ObjectKind,
    ObjectStore, ObjectView, StoreError, StoreResult, Version, Versioned,
};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct ObjectRecord {
    pid: Pid,
    type_id: ObjectId,
    area: ObjectId,
    kind: ObjectKind,
    owner: Option<ObjectId>,
    valid_since: Version,
    not_valid_since: Version,
    name: Versioned<String>,
    info: Versioned<Info>,
    body: Versioned<ObjectBody>,
}

#[derive(Clone, Debug, Default)]
struct AreaRecord {
    versions: AreaVersions,
    change_log: Versioned<Vec<ChangeLogEntry>>,
}

/// One membership interval of a set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MemberEntry {
    object: ObjectId,
    valid_since: Version,
    not_valid_since: Version,
}

impl MemberEntry {
    fn is_valid_at(&self, v: Version) -> bool {
        self.valid_since <= v && (self.not_valid_since == 0 || self.not_valid_since > v)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process [`ObjectStore`] with a bootstrapped meta model.
///
/// Also offers the publication helpers ([`MemoryStore::publish`],
/// [`MemoryStore::release`]) that a real store performs outside the engine.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    next_id: u64,
    objects: BTreeMap<ObjectId, ObjectRecord>,
    areas: BTreeMap<ObjectId, AreaRecord>,
    members: BTreeMap<ObjectId, Vec<MemberEntry>>,
    datasets: BTreeMap<(ObjectId, ObjectId), Versioned<Option<Data>>>,
    meta: BTreeMap<String, ObjectId>,
    meta_usages: BTreeMap<MetaField, ObjectId>,
    mutations: u64,
}

impl MemoryStore {
    /// Store with the default meta policy.
    pub fn new() -> StoreResult<Self> {
        Self::with_policy(MetaPolicy::default())
    }

    /// Store whose meta usages are seeded from `policy`.
    pub fn with_policy(policy: MetaPolicy) -> StoreResult<Self> {
        let mut store = Self {
            next_id: 1,
            objects: BTreeMap::new(),
            areas: BTreeMap::new(),
            members: BTreeMap::new(),
            datasets: BTreeMap::new(),
            meta: BTreeMap::new(),
            meta_usages: BTreeMap::new(),
            mutations: 0,
        };
        store.bootstrap(&policy)?;
        store.mutations = 0;
        Ok(store)
    }

    /// Number of mutating calls since construction.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Make the modifiable version of `area` active (and thus released).
    pub fn publish(&mut self, area: ObjectId) -> StoreResult<Version> {
        let rec = self.areas.get_mut(&area).ok_or(StoreError::NotAnArea(area))?;
        let m = rec.versions.modifiable();
        rec.versions = AreaVersions {
            active: m,
            activatable: m,
            transferable: m,
        };
        debug!(area = %area, version = m, "area published");
        Ok(m)
    }

    /// Approve the modifiable version of `area` without activating it.
    pub fn release(&mut self, area: ObjectId) -> StoreResult<Version> {
        let rec = self.areas.get_mut(&area).ok_or(StoreError::NotAnArea(area))?;
        let m = rec.versions.modifiable();
        rec.versions.activatable = m;
        rec.versions.transferable = m;
        debug!(area = %area, version = m, "area released");
        Ok(m)
    }

    pub fn meta_area(&self) -> StoreResult<ObjectId> {
        self.meta_id(meta::META_AREA)
    }

    // --- internals ----------------------------------------------------------

    fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    fn record(&self, id: ObjectId) -> StoreResult<&ObjectRecord> {
        self.objects.get(&id).ok_or(StoreError::UnknownObject(id))
    }

    fn record_mut(&mut self, id: ObjectId) -> StoreResult<&mut ObjectRecord> {
        self.objects.get_mut(&id).ok_or(StoreError::UnknownObject(id))
    }

    fn versions_of(&self, area: ObjectId) -> StoreResult<AreaVersions> {
        self.areas
            .get(&area)
            .map(|a| a.versions)
            .ok_or(StoreError::NotAnArea(area))
    }

    fn read_version(&self, rec: &ObjectRecord, at: At) -> StoreResult<Version> {
        match at {
            At::Version(v) => Ok(v),
            At::Modifiable => Ok(self.versions_of(rec.area)?.modifiable()),
        }
    }

    /// Version every write to `id` lands in.
    fn write_version(&self, id: ObjectId) -> StoreResult<Version> {
        let rec = self.record(id)?;
        match rec.kind {
            ObjectKind::Dynamic => Ok(0),
            ObjectKind::Configuring => Ok(self.versions_of(rec.area)?.modifiable()),
        }
    }

    fn lifecycle_of(&self, rec: &ObjectRecord) -> StoreResult<Lifecycle> {
        let versions = self.versions_of(rec.area)?;
        Ok(classify(
            rec.kind,
            rec.valid_since,
            rec.not_valid_since,
            &versions,
        ))
    }

    fn set_type_of(&self, set: ObjectId) -> StoreResult<ObjectId> {
        let rec = self.record(set)?;
        match rec.body.latest() {
            Some(ObjectBody::ObjectSet { set_type }) => Ok(*set_type),
            _ => Err(StoreError::NotASet(set)),
        }
    }

    fn is_free_form(&self, set: ObjectId) -> StoreResult<bool> {
        let set_type = self.set_type_of(set)?;
        match self.record(set_type)?.body.latest() {
            Some(ObjectBody::ObjectSetType { mutable, .. }) => Ok(*mutable),
            _ => Ok(false),
        }
    }

    fn children_of(&self, owner: ObjectId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, r)| r.owner == Some(owner))
            .map(|(id, _)| *id)
            .collect()
    }

    fn check_required_datasets(&self, new: &NewObject) -> StoreResult<()> {
        for usage in query::required_usages(self, new.type_id, At::Modifiable)? {
            if !new.datasets.iter().any(|(u, _)| *u == usage) {
                return Err(StoreError::MissingRequiredDataset {
                    pid: new.pid.clone(),
                    usage,
                });
            }
        }
        Ok(())
    }

    fn remove_recursive(&mut self, id: ObjectId) {
        for child in self.children_of(id) {
            self.remove_recursive(child);
        }
        self.objects.remove(&id);
        self.members.remove(&id);
        for entries in self.members.values_mut() {
            entries.retain(|e| e.object != id);
        }
        self.datasets.retain(|(object, usage), _| *object != id && *usage != id);
    }

    fn illegal(id: ObjectId, action: &'static str, reason: impl Into<String>) -> StoreError {
        StoreError::IllegalTransition {
            id,
            action,
            reason: reason.into(),
        }
    }

    // --- bootstrap ----------------------------------------------------------

    fn bootstrap(&mut self, policy: &MetaPolicy) -> StoreResult<()> {
        // The meta area and `type.type` reference themselves, so they are
        // inserted directly; everything else goes through the regular API.
        let area = self.allocate();
        let type_type = self.allocate();
        self.areas.insert(area, AreaRecord::default());
        let seed = |pid: &str, type_id: ObjectId, body: ObjectBody| ObjectRecord {
            pid: Pid::new(pid),
            type_id,
            area,
            kind: ObjectKind::Configuring,
            owner: None,
            valid_since: 1,
            not_valid_since: 0,
            name: Versioned::new(1, pid.to_string()),
            info: Versioned::default(),
            body: Versioned::new(1, body),
        };
        self.objects.insert(
            area,
            seed(
                meta::META_AREA,
                type_type,
                ObjectBody::ConfigurationArea { authority: None },
            ),
        );
        self.objects.insert(
            type_type,
            seed(
                meta::TYPE_TYPE,
                type_type,
                ObjectBody::SystemObjectType {
                    configuring: true,
                    persistence_mode: None,
                },
            ),
        );
        self.meta.insert(meta::META_AREA.to_string(), area);
        self.meta.insert(meta::TYPE_TYPE.to_string(), type_type);

        self.bootstrap_model(area, type_type, policy)
    }

    fn meta_object(&mut self, new: NewObject) -> StoreResult<ObjectId> {
        let pid = new.pid.clone();
        let id = self.create_object(new)?;
        if !pid.is_empty() {
            self.meta.insert(pid.0, id);
        }
        Ok(id)
    }

    fn bootstrap_model(
        &mut self,
        area: ObjectId,
        type_type: ObjectId,
        policy: &MetaPolicy,
    ) -> StoreResult<()> {
        for (pid, configuring) in meta::META_TYPES {
            self.meta_object(NewObject::configuring(
                area,
                type_type,
                Pid::new(pid),
                pid,
                ObjectBody::SystemObjectType {
                    configuring,
                    persistence_mode: None,
                },
            ))?;
        }
        let area_type = self.meta_id(meta::TYPE_AREA)?;
        self.record_mut(area)?.type_id = area_type;

        let set_type_type = self.meta_id(meta::TYPE_SET_TYPE)?;
        for (name, pid, reference_kind) in meta::META_SETS {
            self.meta_object(NewObject::configuring(
                area,
                set_type_type,
                Pid::new(pid),
                name,
                ObjectBody::ObjectSetType {
                    minimum: 0,
                    maximum: 0,
                    mutable: false,
                    reference_kind,
                },
            ))?;
        }

        let aspect = self.meta_object(NewObject::configuring(
            area,
            self.meta_id(meta::TYPE_ASPECT)?,
            Pid::new(meta::DEFAULT_ASPECT),
            "properties",
            ObjectBody::Plain,
        ))?;
        let authority = self.meta_object(NewObject::configuring(
            area,
            self.meta_id(meta::TYPE_AUTHORITY)?,
            Pid::new(meta::DEFAULT_AUTHORITY),
            "default authority",
            ObjectBody::Plain,
        ))?;
        self.set_body(
            area,
            ObjectBody::ConfigurationArea {
                authority: Some(authority),
            },
        )?;

        let reference = self.meta_object(NewObject::configuring(
            area,
            self.meta_id(meta::TYPE_REFERENCE)?,
            Pid::new(meta::ATT_META_REFERENCE),
            "reference",
            ObjectBody::ReferenceType {
                referenced_type: None,
                undefined_allowed: true,
                reference_kind: ReferenceKind::Association,
            },
        ))?;
        let version = self.meta_object(NewObject::configuring(
            area,
            self.meta_id(meta::TYPE_INTEGER)?,
            Pid::new(meta::ATT_META_VERSION),
            "version",
            ObjectBody::IntegerType {
                byte_count: 4,
                range: None,
            },
        ))?;

        for field in MetaField::ALL {
            let atg = self.meta_group(area, &field.attribute_group_pid(), &[])?;
            let usage = self.meta_usage(area, atg, aspect, policy.class(field))?;
            self.meta_usages.insert(field, usage);
        }

        let pending = self.meta_group(
            area,
            meta::ATG_PENDING_AUTHORITY,
            &[("authority", reference), ("effectiveFrom", version)],
        )?;
        self.meta_usage(area, pending, aspect, MutabilityClass::OptionalChangeable)?;
        let transfer = self.meta_group(
            area,
            meta::ATG_AREA_TRANSFER,
            &[("authority", reference), ("version", version)],
        )?;
        self.meta_usage(area, transfer, aspect, MutabilityClass::OptionalChangeable)?;

        self.publish(area)?;
        Ok(())
    }

    fn meta_group(
        &mut self,
        area: ObjectId,
        pid: &str,
        attributes: &[(&str, ObjectId)],
    ) -> StoreResult<ObjectId> {
        let atg = self.meta_object(NewObject::configuring(
            area,
            self.meta_id(meta::TYPE_ATTRIBUTE_GROUP)?,
            Pid::new(pid),
            pid,
            ObjectBody::AttributeGroup {
                configuring: true,
                parameter: false,
            },
        ))?;
        if !attributes.is_empty() {
            let set = self.create_set(
                atg,
                meta::SET_ATTRIBUTES,
                self.meta_id("settype.meta.attributes")?,
            )?;
            for (position, (name, attribute_type)) in attributes.iter().enumerate() {
                let attr = self.create_object(
                    NewObject::configuring(
                        area,
                        self.meta_id(meta::TYPE_ATTRIBUTE)?,
                        Pid::default(),
                        *name,
                        ObjectBody::Attribute {
                            position: position as u32 + 1,
                            max_count: 1,
                            variable_count: false,
                            attribute_type: *attribute_type,
                            default: None,
                        },
                    )
                    .owned_by(atg),
                )?;
                self.add_member(set, attr)?;
            }
        }
        Ok(atg)
    }

    fn meta_usage(
        &mut self,
        area: ObjectId,
        atg: ObjectId,
        aspect: ObjectId,
        class: MutabilityClass,
    ) -> StoreResult<ObjectId> {
        let set = self.create_set(atg, meta::SET_USAGES, self.meta_id("settype.meta.usages")?)?;
        let usage = self.create_object(
            NewObject::configuring(
                area,
                self.meta_id(meta::TYPE_USAGE)?,
                Pid::default(),
                "",
                ObjectBody::AttributeGroupUsage {
                    attribute_group: atg,
                    aspect,
                    usage: class,
                    explicit: true,
                },
            )
            .owned_by(atg),
        )?;
        self.add_member(set, usage)?;
        Ok(usage)
    }
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

impl ObjectStore for MemoryStore {
    fn area_versions(&self, area: ObjectId) -> StoreResult<AreaVersions> {
        self.versions_of(area)
    }

    fn create_area(
        &mut self,
        pid: &Pid,
        name: &str,
        authority: Option<ObjectId>,
    ) -> StoreResult<ObjectId> {
        self.mutations += 1;
        if self.lookup(pid, LookupScope::Draft).is_some() {
            return Err(StoreError::DuplicatePid(pid.clone()));
        }
        let type_id = self.meta_id(meta::TYPE_AREA)?;
        let id = self.allocate();
        let versions = AreaVersions::default();
        let m = versions.modifiable();
        self.areas.insert(
            id,
            AreaRecord {
                versions,
                change_log: Versioned::default(),
            },
        );
        self.objects.insert(
            id,
            ObjectRecord {
                pid: pid.clone(),
                type_id,
                area: id,
                kind: ObjectKind::Configuring,
                owner: None,
                valid_since: m,
                not_valid_since: 0,
                name: Versioned::new(m, name.to_string()),
                info: Versioned::new(m, Info::default()),
                body: Versioned::new(m, ObjectBody::ConfigurationArea { authority }),
            },
        );
        debug!(area = %id, pid = %pid, "area created");
        Ok(id)
    }

    fn change_log(&self, area: ObjectId, at: At) -> StoreResult<Vec<ChangeLogEntry>> {
        let rec = self.areas.get(&area).ok_or(StoreError::NotAnArea(area))?;
        let v = match at {
            At::Version(v) => v,
            At::Modifiable => rec.versions.modifiable(),
        };
        Ok(rec.change_log.at(v).cloned().unwrap_or_default())
    }

    fn set_change_log(&mut self, area: ObjectId, entries: Vec<ChangeLogEntry>) -> StoreResult<()> {
        self.mutations += 1;
        let rec = self
            .areas
            .get_mut(&area)
            .ok_or(StoreError::NotAnArea(area))?;
        let m = rec.versions.modifiable();
        rec.change_log.write(m, entries);
        Ok(())
    }

    fn lookup(&self, pid: &Pid, scope: LookupScope) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .filter(|(_, r)| r.owner.is_none() && r.pid == *pid)
            .find(|(_, r)| {
                self.lifecycle_of(r)
                    .map(|l| scope.matches(l))
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
    }

    fn object(&self, id: ObjectId, at: At) -> StoreResult<ObjectView> {
        let rec = self.record(id)?;
        let v = self.read_version(rec, at)?;
        Ok(ObjectView {
            id,
            pid: rec.pid.clone(),
            name: rec.name.at_or_first(v).cloned().unwrap_or_default(),
            info: rec.info.at_or_first(v).cloned().unwrap_or_default(),
            type_id: rec.type_id,
            area: rec.area,
            kind: rec.kind,
            owner: rec.owner,
            valid_since: rec.valid_since,
            not_valid_since: rec.not_valid_since,
            body: rec
                .body
                .at_or_first(v)
                .cloned()
                .unwrap_or(ObjectBody::Plain),
        })
    }

    fn objects_in_area(&self, area: ObjectId) -> StoreResult<Vec<ObjectId>> {
        self.versions_of(area)?;
        Ok(self
            .objects
            .iter()
            .filter(|(_, r)| r.area == area)
            .map(|(id, _)| *id)
            .collect())
    }

    fn create_object(&mut self, new: NewObject) -> StoreResult<ObjectId> {
        self.mutations += 1;
        let versions = self.versions_of(new.area)?;
        self.record(new.type_id)?;
        if let Some(owner) = new.owner {
            self.record(owner)?;
        }
        if new.owner.is_none()
            && !new.pid.is_empty()
            && self.lookup(&new.pid, LookupScope::Draft).is_some()
        {
            return Err(StoreError::DuplicatePid(new.pid));
        }
        let (valid_since, write) = match new.kind {
            ObjectKind::Configuring => {
                let m = versions.modifiable();
                (m, m)
            }
            ObjectKind::Dynamic => {
                self.check_required_datasets(&new)?;
                (0, 0)
            }
        };

        let id = self.allocate();
        self.objects.insert(
            id,
            ObjectRecord {
                pid: new.pid,
                type_id: new.type_id,
                area: new.area,
                kind: new.kind,
                owner: new.owner,
                valid_since,
                not_valid_since: 0,
                name: Versioned::new(write, new.name),
                info: Versioned::new(write, new.info),
                body: Versioned::new(write, new.body),
            },
        );
        for (usage, data) in new.datasets {
            self.datasets
                .insert((id, usage), Versioned::new(write, Some(data)));
        }
        Ok(id)
    }

    fn set_name(&mut self, id: ObjectId, name: &str) -> StoreResult<()> {
        self.mutations += 1;
        let w = self.write_version(id)?;
        self.record_mut(id)?.name.write(w, name.to_string());
        Ok(())
    }

    fn set_info(&mut self, id: ObjectId, info: &Info) -> StoreResult<()> {
        self.mutations += 1;
        let w = self.write_version(id)?;
        self.record_mut(id)?.info.write(w, info.clone());
        Ok(())
    }

    fn set_body(&mut self, id: ObjectId, body: ObjectBody) -> StoreResult<()> {
        self.mutations += 1;
        let w = self.write_version(id)?;
        let rec = self.record_mut(id)?;
        if std::mem::discriminant(&body)
            != std::mem::discriminant(rec.body.latest().unwrap_or(&ObjectBody::Plain))
            && rec.body.latest().is_some()
        {
            return Err(Self::illegal(id, "patched", "object body kind cannot change"));
        }
        rec.body.write(w, body);
        Ok(())
    }

    fn invalidate(&mut self, id: ObjectId) -> StoreResult<()> {
        self.mutations += 1;
        let rec = self.record(id)?;
        let m = self.versions_of(rec.area)?.modifiable();
        match rec.kind {
            ObjectKind::Dynamic => {
                if rec.not_valid_since != 0 {
                    return Err(Self::illegal(id, "invalidated", "already invalid"));
                }
            }
            ObjectKind::Configuring => {
                if rec.valid_since >= m {
                    return Err(Self::illegal(
                        id,
                        "invalidated",
                        "draft objects are deleted, not invalidated",
                    ));
                }
                if rec.not_valid_since == m {
                    return Ok(());
                }
                if rec.not_valid_since != 0 {
                    return Err(Self::illegal(
                        id,
                        "invalidated",
                        "already invalid in a published version",
                    ));
                }
            }
        }
        self.record_mut(id)?.not_valid_since = m;
        debug!(object = %id, version = m, "object invalidated");
        Ok(())
    }

    fn revalidate(&mut self, id: ObjectId) -> StoreResult<()> {
        self.mutations += 1;
        let rec = self.record(id)?;
        let m = self.versions_of(rec.area)?.modifiable();
        if rec.kind != ObjectKind::Configuring || rec.not_valid_since != m {
            return Err(Self::illegal(
                id,
                "revalidated",
                "only an unpublished invalidation can be undone",
            ));
        }
        self.record_mut(id)?.not_valid_since = 0;
        debug!(object = %id, "object revalidated");
        Ok(())
    }

    fn delete(&mut self, id: ObjectId) -> StoreResult<()> {
        self.mutations += 1;
        let rec = self.record(id)?;
        if self.lifecycle_of(rec)? != Lifecycle::Draft {
            return Err(Self::illegal(id, "deleted", "object is not a draft"));
        }
        self.remove_recursive(id);
        debug!(object = %id, "object deleted");
        Ok(())
    }

    fn set_of(&self, owner: ObjectId, name: &str) -> Option<ObjectId> {
        self.sets_of(owner)
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| id)
    }

    fn sets_of(&self, owner: ObjectId) -> Vec<(String, ObjectId)> {
        self.objects
            .iter()
            .filter(|(_, r)| r.owner == Some(owner))
            .filter(|(_, r)| matches!(r.body.latest(), Some(ObjectBody::ObjectSet { .. })))
            .filter(|(_, r)| {
                self.lifecycle_of(r)
                    .map(|l| l != Lifecycle::Retired)
                    .unwrap_or(false)
            })
            .filter_map(|(id, r)| r.name.latest().map(|n| (n.clone(), *id)))
            .collect()
    }

    fn create_set(
        &mut self,
        owner: ObjectId,
        name: &str,
        set_type: ObjectId,
    ) -> StoreResult<ObjectId> {
        let owner_rec = self.record(owner)?;
        let (area, kind) = (owner_rec.area, owner_rec.kind);
        match self.record(set_type)?.body.latest() {
            Some(ObjectBody::ObjectSetType { .. }) => {}
            _ => return Err(StoreError::NotASet(set_type)),
        }
        let type_id = self.meta_id(meta::TYPE_SET)?;
        self.create_object(NewObject {
            area,
            type_id,
            pid: Pid::default(),
            name: name.to_string(),
            info: Info::default(),
            kind,
            owner: Some(owner),
            body: ObjectBody::ObjectSet { set_type },
            datasets: Vec::new(),
        })
    }

    fn members(&self, set: ObjectId, at: At) -> StoreResult<Vec<ObjectId>> {
        self.set_type_of(set)?;
        let v = self.read_version(self.record(set)?, at)?;
        Ok(self
            .members
            .get(&set)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.is_valid_at(v))
                    .map(|e| e.object)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn add_member(&mut self, set: ObjectId, member: ObjectId) -> StoreResult<()> {
        self.mutations += 1;
        self.record(member)?;
        let w = if self.is_free_form(set)? {
            0
        } else {
            self.write_version(set)?
        };
        let entries = self.members.entry(set).or_default();
        if let Some(e) = entries
            .iter_mut()
            .find(|e| e.object == member && w != 0 && e.not_valid_since == w)
        {
            e.not_valid_since = 0;
            return Ok(());
        }
        if entries.iter().any(|e| e.object == member && e.is_valid_at(w)) {
            return Ok(());
        }
        entries.push(MemberEntry {
            object: member,
            valid_since: w,
            not_valid_since: 0,
        });
        Ok(())
    }

    fn remove_member(&mut self, set: ObjectId, member: ObjectId) -> StoreResult<()> {
        self.mutations += 1;
        let w = if self.is_free_form(set)? {
            0
        } else {
            self.write_version(set)?
        };
        let entries = self.members.entry(set).or_default();
        entries.retain(|e| !(e.object == member && e.is_valid_at(w) && e.valid_since == w));
        for e in entries.iter_mut() {
            if e.object == member && e.is_valid_at(w) {
                e.not_valid_since = w;
            }
        }
        Ok(())
    }

    fn dataset(&self, object: ObjectId, usage: ObjectId, at: At) -> StoreResult<Option<Data>> {
        let v = self.read_version(self.record(object)?, at)?;
        Ok(self
            .datasets
            .get(&(object, usage))
            .and_then(|h| h.at(v))
            .and_then(|d| d.clone()))
    }

    fn datasets(&self, object: ObjectId, at: At) -> StoreResult<Vec<(ObjectId, Data)>> {
        let v = self.read_version(self.record(object)?, at)?;
        Ok(self
            .datasets
            .range((object, ObjectId(0))..=(object, ObjectId(u64::MAX)))
            .filter_map(|((_, usage), h)| h.at(v).and_then(|d| d.clone()).map(|d| (*usage, d)))
            .collect())
    }

    fn set_dataset(&mut self, object: ObjectId, usage: ObjectId, data: Data) -> StoreResult<()> {
        self.mutations += 1;
        self.record(usage)?;
        let w = self.write_version(object)?;
        self.datasets
            .entry((object, usage))
            .or_default()
            .write(w, Some(data));
        Ok(())
    }

    fn remove_dataset(&mut self, object: ObjectId, usage: ObjectId) -> StoreResult<()> {
        self.mutations += 1;
        let w = self.write_version(object)?;
        if let Some(h) = self.datasets.get_mut(&(object, usage)) {
            h.write(w, None);
        }
        Ok(())
    }

    fn meta_class(&self, field: MetaField) -> MutabilityClass {
        self.meta_usages
            .get(&field)
            .and_then(|usage| self.objects.get(usage))
            .and_then(|rec| match rec.body.latest() {
                Some(ObjectBody::AttributeGroupUsage { usage, .. }) => Some(*usage),
                _ => None,
            })
            .unwrap_or_else(|| MetaPolicy::default().class(field))
    }

    fn meta_id(&self, pid: &str) -> StoreResult<ObjectId> {
        self.meta
            .get(pid)
            .copied()
            .ok_or_else(|| StoreError::UnknownMeta(pid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_type(store: &mut MemoryStore, area: ObjectId, pid: &str) -> ObjectId {
        let type_type = store.meta_id(meta::TYPE_TYPE).unwrap();
        store
            .create_object(NewObject::configuring(
                area,
                type_type,
                Pid::new(pid),
                pid,
                ObjectBody::SystemObjectType {
                    configuring: true,
                    persistence_mode: None,
                },
            ))
            .unwrap()
    }

    fn plain_object(store: &mut MemoryStore, area: ObjectId, ty: ObjectId, pid: &str) -> ObjectId {
        store
            .create_object(NewObject::configuring(
                area,
                ty,
                Pid::new(pid),
                pid,
                ObjectBody::Plain,
            ))
            .unwrap()
    }

    #[test]
    fn bootstrap_publishes_meta_model_and_seeds_policy() {
        let store = MemoryStore::new().unwrap();
        let area = store.meta_area().unwrap();
        assert_eq!(store.area_versions(area).unwrap().active, 1);
        assert!(store.lookup(&Pid::new(meta::TYPE_ATTRIBUTE), LookupScope::Active).is_some());
        assert_eq!(
            store.meta_class(MetaField::AttributeProperties),
            MutabilityClass::RequiredImmutable
        );
        assert_eq!(store.mutation_count(), 0);

        let relaxed = MemoryStore::with_policy(MetaPolicy::default().with(
            MetaField::AttributeProperties,
            MutabilityClass::RequiredChangeable,
        )).unwrap();
        assert!(relaxed.meta_class(MetaField::AttributeProperties).is_changeable());
    }

    #[test]
    fn draft_then_published_lookup_and_duplicate_rejection() {
        let mut store = MemoryStore::new().unwrap();
        let area = store.create_area(&Pid::new("kv.a"), "A", None).unwrap();
        let ty = plain_type(&mut store, area, "typ.x");
        let obj = plain_object(&mut store, area, ty, "obj.1");
        assert_eq!(store.lookup(&Pid::new("obj.1"), LookupScope::Draft), Some(obj));

        let dup = store.create_object(NewObject::configuring(
            area,
            ty,
            Pid::new("obj.1"),
            "again",
            ObjectBody::Plain,
        ));
        assert!(matches!(dup, Err(StoreError::DuplicatePid(_))));

        store.release(area).unwrap();
        assert_eq!(store.lookup(&Pid::new("obj.1"), LookupScope::Released), Some(obj));
        store.publish(area).unwrap();
        assert_eq!(store.lookup(&Pid::new("obj.1"), LookupScope::Active), Some(obj));
        assert_eq!(store.lookup(&Pid::new("obj.1"), LookupScope::Draft), None);
    }

    #[test]
    fn published_names_are_not_rewritten() {
        let mut store = MemoryStore::new().unwrap();
        let area = store.create_area(&Pid::new("kv.a"), "A", None).unwrap();
        let ty = plain_type(&mut store, area, "typ.x");
        let obj = plain_object(&mut store, area, ty, "obj.1");
        let v1 = store.publish(area).unwrap();

        store.set_name(obj, "renamed").unwrap();
        assert_eq!(store.object(obj, At::Modifiable).unwrap().name, "renamed");
        assert_eq!(store.object(obj, At::Version(v1)).unwrap().name, "obj.1");
    }

    #[test]
    fn invalidate_revalidate_and_delete_rules() {
        let mut store = MemoryStore::new().unwrap();
        let area = store.create_area(&Pid::new("kv.a"), "A", None).unwrap();
        let ty = plain_type(&mut store, area, "typ.x");
        let published = plain_object(&mut store, area, ty, "obj.1");
        store.publish(area).unwrap();
        let draft = plain_object(&mut store, area, ty, "obj.2");

        assert!(store.invalidate(draft).is_err());
        assert!(store.delete(published).is_err());

        store.invalidate(published).unwrap();
        assert_eq!(store.object(published, At::Modifiable).unwrap().not_valid_since, 2);
        // not yet published, so still a candidate
        assert_eq!(store.lifecycle(published).unwrap(), Lifecycle::Active);
        store.revalidate(published).unwrap();
        assert_eq!(store.object(published, At::Modifiable).unwrap().not_valid_since, 0);
        assert!(store.revalidate(published).is_err());

        store.delete(draft).unwrap();
        assert!(store.object(draft, At::Modifiable).is_err());
    }

    #[test]
    fn version_fixed_membership_changes_from_modifiable_version() {
        let mut store = MemoryStore::new().unwrap();
        let area = store.create_area(&Pid::new("kv.a"), "A", None).unwrap();
        let ty = plain_type(&mut store, area, "typ.x");
        let a = plain_object(&mut store, area, ty, "obj.a");
        let b = plain_object(&mut store, area, ty, "obj.b");
        let set_type = store.meta_id("settype.meta.attributeGroups").unwrap();
        let set = store.create_set(ty, "attributeGroups", set_type).unwrap();
        store.add_member(set, a).unwrap();
        let v1 = store.publish(area).unwrap();

        store.add_member(set, b).unwrap();
        store.remove_member(set, a).unwrap();
        assert_eq!(store.members(set, At::Modifiable).unwrap(), vec![b]);
        assert_eq!(store.members(set, At::Version(v1)).unwrap(), vec![a]);

        // undoing the removal within the same draft restores the old entry
        store.add_member(set, a).unwrap();
        let mut now = store.members(set, At::Modifiable).unwrap();
        now.sort();
        assert_eq!(now, vec![a, b]);
    }

    #[test]
    fn dynamic_objects_need_required_datasets() {
        let mut store = MemoryStore::new().unwrap();
        let area = store.create_area(&Pid::new("kv.a"), "A", None).unwrap();
        let type_type = store.meta_id(meta::TYPE_TYPE).unwrap();
        let ty = store
            .create_object(NewObject::configuring(
                area,
                type_type,
                Pid::new("typ.dyn"),
                "dyn",
                ObjectBody::SystemObjectType {
                    configuring: false,
                    persistence_mode: None,
                },
            ))
            .unwrap();
        let atg = store.meta_id(ATG_FOR_TEST).unwrap();
        let groups = store
            .create_set(ty, "attributeGroups", store.meta_id("settype.meta.attributeGroups").unwrap())
            .unwrap();
        store.add_member(groups, atg).unwrap();
        let usage = query::usages_of(&store, atg, At::Modifiable).unwrap()[0].id;

        let mut new = NewObject::configuring(area, ty, Pid::new("dyn.1"), "d", ObjectBody::Plain);
        new.kind = ObjectKind::Dynamic;
        let missing = store.create_object(new.clone());
        assert!(matches!(missing, Err(StoreError::MissingRequiredDataset { .. })));

        new.datasets.push((usage, Data::Text("x".into())));
        let id = store.create_object(new).unwrap();
        assert_eq!(store.lifecycle(id).unwrap(), Lifecycle::Active);
        assert_eq!(
            store.dataset(id, usage, At::Version(0)).unwrap(),
            Some(Data::Text("x".into()))
        );
    }

    // Structural meta group whose seeded class is RequiredImmutable.
    const ATG_FOR_TEST: &str = "atg.meta.attribute";
}
