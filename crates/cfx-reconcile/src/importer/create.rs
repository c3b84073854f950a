//! Creation of declared objects that have no usable candidate.
//!
//! Creation writes a skeleton: identity, name, info and whatever the store
//! needs to accept dependants right away (usages of groups, supertypes of
//! types, the datasets of dynamic objects). Everything else is filled in by
//! Completing.

use std::collections::BTreeSet;

use cfx_model::{
    AttributeGroupProperties, AttributeTypeKind, DeclaredProperty, Info, MutabilityClass,
    ObjectProperties, Pid, PropertyHeader, SystemObjectTypeProperties,
};
use cfx_store::meta::{self, SET_ATTRIBUTE_GROUPS, SET_SUPERTYPES, SET_USAGES};
use cfx_store::{query, At, NewObject, ObjectBody, ObjectId, ObjectKind};
use tracing::debug;

use super::Session;
use crate::comparator::{dataset_usage, desired_usages, meta_type_of, type_is_configuring};
use crate::schema::group_schema;
use crate::values::encode_tree;
use crate::{ImportError, ResolveContext, Result, StructuralConflict};

/// Kind body of an attribute type; the integer range is passed in separately.
pub(super) fn attribute_type_body(
    kind: &AttributeTypeKind,
    range: Option<ObjectId>,
    ctx: &dyn ResolveContext,
) -> ObjectBody {
    match kind {
        AttributeTypeKind::String {
            max_length,
            encoding,
        } => ObjectBody::StringType {
            max_length: *max_length,
            encoding: encoding.clone(),
        },
        AttributeTypeKind::Integer(i) => ObjectBody::IntegerType {
            byte_count: i.byte_count,
            range,
        },
        AttributeTypeKind::Double { unit, accuracy } => ObjectBody::DoubleType {
            unit: unit.clone(),
            accuracy: *accuracy,
        },
        AttributeTypeKind::Time { relative, accuracy } => ObjectBody::TimeType {
            relative: *relative,
            accuracy: *accuracy,
        },
        AttributeTypeKind::Reference {
            referenced_type,
            undefined_allowed,
            reference_kind,
        } => ObjectBody::ReferenceType {
            referenced_type: referenced_type.as_ref().and_then(|p| ctx.resolve(p)),
            undefined_allowed: *undefined_allowed,
            reference_kind: *reference_kind,
        },
    }
}

impl Session<'_> {
    /// Create `prop` under the "currently being created" marker.
    ///
    /// `Ok(None)` means the creation was deferred to a later pass.
    pub(super) fn create(&mut self, prop: &DeclaredProperty) -> Result<Option<ObjectId>> {
        let pid = prop.pid().clone();
        if !self.run.creating.insert(pid.clone()) {
            return Err(match prop {
                DeclaredProperty::SystemObjectType(_) => {
                    StructuralConflict::SupertypeCycle(pid).into()
                }
                _ => ImportError::invalid(&pid, "creation depends on itself"),
            });
        }
        let result = self.create_declared(prop);
        self.run.creating.remove(&pid);
        let created = result?;
        if let Some(id) = created {
            self.mark_created(&pid, id);
        }
        Ok(created)
    }

    fn create_declared(&mut self, prop: &DeclaredProperty) -> Result<Option<ObjectId>> {
        let pid = prop.pid();
        let area = self.area_for(pid)?;
        let header = prop.header();
        let id = match prop {
            DeclaredProperty::Aspect(_)
            | DeclaredProperty::AttributeList(_)
            | DeclaredProperty::ObjectSetType(_)
            | DeclaredProperty::AttributeType(_) => {
                let body = match prop {
                    DeclaredProperty::AttributeType(t) => {
                        attribute_type_body(&t.kind, None, &self.ctx())
                    }
                    DeclaredProperty::AttributeList(_) => ObjectBody::AttributeList,
                    DeclaredProperty::ObjectSetType(s) => ObjectBody::ObjectSetType {
                        minimum: s.minimum,
                        maximum: s.maximum,
                        mutable: s.mutable,
                        reference_kind: s.reference_kind,
                    },
                    _ => ObjectBody::Plain,
                };
                self.create_meta_typed(area, prop, body)?
            }
            DeclaredProperty::AttributeGroup(g) => {
                let body = ObjectBody::AttributeGroup {
                    configuring: g.configuring,
                    parameter: g.parameter,
                };
                let id = self.create_meta_typed(area, prop, body)?;
                self.create_usages(id, g)?;
                id
            }
            DeclaredProperty::SystemObjectType(t) => self.create_object_type(area, t)?,
            DeclaredProperty::ConfigurationArea(_) => {
                return Err(ImportError::invalid(pid, "areas are bound, not created as objects"))
            }
            DeclaredProperty::Object(o) => match self.create_object(area, o)? {
                Some(id) => id,
                None => return Ok(None),
            },
        };
        debug!(pid = %header.pid, kind = prop.kind().as_str(), "created");
        Ok(Some(id))
    }

    /// Area object the declaration of `pid` belongs to.
    pub(super) fn area_for(&self, pid: &Pid) -> Result<ObjectId> {
        self.index
            .area_of(pid)
            .and_then(|area| self.run.bindings.get(area))
            .copied()
            .ok_or_else(|| ImportError::unresolved(pid, "declaring area"))
    }

    fn create_meta_typed(
        &mut self,
        area: ObjectId,
        prop: &DeclaredProperty,
        body: ObjectBody,
    ) -> Result<ObjectId> {
        let type_pid = meta_type_of(prop)
            .ok_or_else(|| ImportError::invalid(prop.pid(), "no meta type"))?;
        let type_id = self.store.meta_id(type_pid)?;
        self.create_configuring(area, type_id, prop.header(), body)
    }

    fn create_configuring(
        &mut self,
        area: ObjectId,
        type_id: ObjectId,
        header: &PropertyHeader,
        body: ObjectBody,
    ) -> Result<ObjectId> {
        let new = NewObject::configuring(area, type_id, header.pid.clone(), &header.name, body)
            .with_info(header.info.clone());
        Ok(self.store.create_object(new)?)
    }

    /// Substructure object owned by `owner`, living in the owner's area.
    pub(super) fn create_owned(
        &mut self,
        owner: ObjectId,
        type_pid: &str,
        name: &str,
        info: &Info,
        body: ObjectBody,
    ) -> Result<ObjectId> {
        let area = self.store.object(owner, At::Modifiable)?.area;
        let type_id = self.store.meta_id(type_pid)?;
        let new = NewObject::configuring(area, type_id, Pid::default(), name, body)
            .owned_by(owner)
            .with_info(info.clone());
        Ok(self.store.create_object(new)?)
    }

    /// Meta set `name` of `owner`, created on first use.
    pub(super) fn ensure_meta_set(&mut self, owner: ObjectId, name: &str) -> Result<ObjectId> {
        if let Some(set) = self.store.set_of(owner, name) {
            return Ok(set);
        }
        let set_type_pid = meta::meta_set_type(name)
            .ok_or_else(|| ImportError::invalid(&Pid::new(name), "not a meta set"))?;
        let set_type = self.store.meta_id(set_type_pid)?;
        Ok(self.store.create_set(owner, name, set_type)?)
    }

    pub(super) fn create_usage(
        &mut self,
        atg: ObjectId,
        aspect: ObjectId,
        usage: MutabilityClass,
        explicit: bool,
    ) -> Result<ObjectId> {
        let set = self.ensure_meta_set(atg, SET_USAGES)?;
        let id = self.create_owned(
            atg,
            meta::TYPE_USAGE,
            "",
            &Info::default(),
            ObjectBody::AttributeGroupUsage {
                attribute_group: atg,
                aspect,
                usage,
                explicit,
            },
        )?;
        self.store.add_member(set, id)?;
        Ok(id)
    }

    fn create_usages(&mut self, atg: ObjectId, g: &AttributeGroupProperties) -> Result<()> {
        let desired = desired_usages(g, &self.ctx());
        for (aspect_pid, aspect, class, explicit) in desired {
            let aspect = match aspect {
                Some(id) => id,
                None => self.ensure(&aspect_pid, "usage aspect")?,
            };
            self.create_usage(atg, aspect, class, explicit)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Object types
    // -----------------------------------------------------------------------

    fn create_object_type(
        &mut self,
        area: ObjectId,
        t: &SystemObjectTypeProperties,
    ) -> Result<ObjectId> {
        let mut supertypes = Vec::with_capacity(t.supertypes.len());
        for st in &t.supertypes {
            let id = self.ensure(st, "supertype")?;
            self.check_persistence(t, st, id)?;
            supertypes.push(id);
        }
        let type_type = self.store.meta_id(meta::TYPE_TYPE)?;
        let id = self.create_configuring(
            area,
            type_type,
            &t.header,
            ObjectBody::SystemObjectType {
                configuring: t.configuring,
                persistence_mode: t.persistence_mode,
            },
        )?;
        if !supertypes.is_empty() {
            let set = self.ensure_meta_set(id, SET_SUPERTYPES)?;
            for st in supertypes {
                self.store.add_member(set, st)?;
            }
        }
        Ok(id)
    }

    /// A type must agree with each supertype on being configuring, and
    /// dynamic types on an explicitly declared persistence mode.
    fn check_persistence(
        &self,
        t: &SystemObjectTypeProperties,
        supertype: &Pid,
        supertype_id: ObjectId,
    ) -> Result<()> {
        let conflict = || -> ImportError {
            StructuralConflict::PersistenceMode {
                pid: t.header.pid.clone(),
                supertype: supertype.clone(),
            }
            .into()
        };
        match self.store.object(supertype_id, At::Modifiable)?.body {
            ObjectBody::SystemObjectType {
                configuring,
                persistence_mode,
            } => {
                if configuring != t.configuring {
                    return Err(conflict());
                }
                if let (false, Some(mine), Some(theirs)) =
                    (t.configuring, t.persistence_mode, persistence_mode)
                {
                    if mine != theirs {
                        return Err(conflict());
                    }
                }
                Ok(())
            }
            other => Err(ImportError::invalid(
                supertype,
                format!("{} used as supertype", other.label()),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Concrete objects
    // -----------------------------------------------------------------------

    fn create_object(&mut self, area: ObjectId, o: &ObjectProperties) -> Result<Option<ObjectId>> {
        let type_id = self.ensure(&o.object_type, "object type")?;
        if type_is_configuring(&self.ctx(), &o.object_type)? {
            return self
                .create_configuring(area, type_id, &o.header, ObjectBody::Plain)
                .map(Some);
        }

        // Dynamic objects go live immediately, so they carry their datasets from the start.
        self.check_required_datasets(o)?;
        for ds in &o.datasets {
            self.ensure(&ds.attribute_group, "dataset attribute group")?;
            self.ensure(&ds.aspect, "dataset aspect")?;
        }
        let mut datasets = Vec::with_capacity(o.datasets.len());
        {
            let ctx = self.ctx();
            for ds in &o.datasets {
                let (usage, _) = dataset_usage(&ctx, &ds.attribute_group, &ds.aspect)?
                    .ok_or_else(|| ImportError::unresolved(&ds.aspect, "usage of dataset group"))?;
                let schema = group_schema(&ctx, &ds.attribute_group)?;
                match encode_tree(&schema, &ds.data, &ctx) {
                    Ok(data) => datasets.push((usage, data)),
                    Err(ImportError::UnresolvedReference { pid, .. }) if self.index.contains(&pid) => {
                        debug!(pid = %o.header.pid, waiting_for = %pid, "dynamic object deferred");
                        self.run.changed = true;
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        let new = NewObject {
            area,
            type_id,
            pid: o.header.pid.clone(),
            name: o.header.name.clone(),
            info: o.header.info.clone(),
            kind: ObjectKind::Dynamic,
            owner: None,
            body: ObjectBody::Plain,
            datasets,
        };
        Ok(Some(self.store.create_object(new)?))
    }

    fn check_required_datasets(&self, o: &ObjectProperties) -> Result<()> {
        for group in self.type_groups(&o.object_type)? {
            for (aspect, class) in self.group_usages(&group)? {
                let declared = o
                    .datasets
                    .iter()
                    .any(|d| d.attribute_group == group && d.aspect == aspect);
                if class.is_required() && !declared {
                    return Err(StructuralConflict::MissingRequiredDataset {
                        pid: o.header.pid.clone(),
                        attribute_group: group,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Own and inherited attribute groups of a type, declaration first.
    fn type_groups(&self, type_pid: &Pid) -> Result<Vec<Pid>> {
        let ctx = self.ctx();
        let mut seen = BTreeSet::new();
        let mut out: Vec<Pid> = Vec::new();
        let mut queue = vec![type_pid.clone()];
        while let Some(t) = queue.pop() {
            if !seen.insert(t.clone()) {
                continue;
            }
            if let Some(DeclaredProperty::SystemObjectType(d)) = self.index.get(&t) {
                out.extend(d.attribute_groups.iter().cloned());
                queue.extend(d.supertypes.iter().cloned());
                continue;
            }
            let Some(id) = ctx.resolve(&t) else {
                continue;
            };
            for atg in query::members_of(ctx.store, id, SET_ATTRIBUTE_GROUPS, At::Modifiable)? {
                out.push(query::pid_of(ctx.store, atg));
            }
            for st in query::members_of(ctx.store, id, SET_SUPERTYPES, At::Modifiable)? {
                queue.push(query::pid_of(ctx.store, st));
            }
        }
        let mut unique = BTreeSet::new();
        out.retain(|g| unique.insert(g.clone()));
        Ok(out)
    }

    /// (aspect Pid, class) of every usage of a group, declaration first.
    fn group_usages(&self, group: &Pid) -> Result<Vec<(Pid, MutabilityClass)>> {
        let ctx = self.ctx();
        if let Some(DeclaredProperty::AttributeGroup(g)) = self.index.get(group) {
            return Ok(desired_usages(g, &ctx)
                .into_iter()
                .map(|(aspect, _, class, _)| (aspect, class))
                .collect());
        }
        let id = ctx
            .resolve(group)
            .ok_or_else(|| ImportError::unresolved(group, "attribute group of type"))?;
        Ok(query::usages_of(ctx.store, id, At::Modifiable)?
            .into_iter()
            .filter_map(|u| match u.body {
                ObjectBody::AttributeGroupUsage { aspect, usage, .. } => {
                    Some((query::pid_of(ctx.store, aspect), usage))
                }
                _ => None,
            })
            .collect())
    }
}
