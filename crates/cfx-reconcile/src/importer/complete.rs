//! Completing: bring every bound object in line with its declaration.
//!
//! Only facets that differ are written, so completing an already matching
//! store performs no mutation at all.

use std::collections::BTreeSet;

use cfx_model::{
    AttributeDecl, AttributeGroupProperties, AttributeTypeKind, AttributeTypeProperties,
    ConfigurationAreaProperties, DeclaredProperty, Info, ObjectProperties, Pid, PropertyKind,
    SetUseDecl, SystemObjectTypeProperties, ValueRangeDecl, ValueStateDecl,
};
use cfx_store::meta::{
    self, SET_ATTRIBUTES, SET_ATTRIBUTE_GROUPS, SET_OBJECT_TYPES, SET_SET_USES, SET_STATES,
    SET_SUPERTYPES, SET_USAGES,
};
use cfx_store::{query, At, Lifecycle, ObjectBody, ObjectId, ObjectView};
use tracing::{debug, info, warn};

use super::create::attribute_type_body;
use super::run::ImportPhase;
use super::Session;
use crate::comparator::{
    compare_attribute, dataset_usage, desired_usages, processable, set_governor,
};
use crate::schema::group_schema;
use crate::values::{encode_tree, tree_matches};
use crate::{authority, defaults, ActionKind, ImportError, ResolveContext, Result};

/// Completion order by declared kind. Concrete objects come last.
const ORDER: [PropertyKind; 8] = [
    PropertyKind::AttributeList,
    PropertyKind::AttributeGroup,
    PropertyKind::Aspect,
    PropertyKind::AttributeType,
    PropertyKind::ObjectSetType,
    PropertyKind::SystemObjectType,
    PropertyKind::ConfigurationArea,
    PropertyKind::Object,
];

impl Session<'_> {
    pub(super) fn complete_all(&mut self) -> Result<()> {
        self.enter(ImportPhase::Completing);
        let index = self.index;
        for kind in ORDER {
            for pid in index.ordered() {
                let Some(prop) = index.get(pid) else {
                    continue;
                };
                if prop.kind() != kind {
                    continue;
                }
                let id = self
                    .run
                    .bindings
                    .get(pid)
                    .copied()
                    .ok_or_else(|| ImportError::unresolved(pid, "binding after resolving"))?;
                self.complete_one(prop, id)?;
            }
        }
        info!(patched = self.run.patched.len(), "completing finished");
        Ok(())
    }

    fn complete_one(&mut self, prop: &DeclaredProperty, id: ObjectId) -> Result<()> {
        let pid = prop.pid();
        let header = prop.header();
        let view = self.store.object(id, At::Modifiable)?;
        if view.name != header.name {
            self.store.set_name(id, &header.name)?;
            self.touched(pid, id, "name");
        }
        if view.info != header.info {
            self.store.set_info(id, &header.info)?;
            self.touched(pid, id, "info");
        }

        match prop {
            DeclaredProperty::Aspect(_) => Ok(()),
            DeclaredProperty::AttributeType(t) => self.complete_attribute_type(&view, t),
            DeclaredProperty::AttributeList(l) => self.sync_attributes(pid, id, &l.attributes),
            DeclaredProperty::AttributeGroup(g) => self.complete_group(&view, g),
            DeclaredProperty::ObjectSetType(s) => {
                let body = ObjectBody::ObjectSetType {
                    minimum: s.minimum,
                    maximum: s.maximum,
                    mutable: s.mutable,
                    reference_kind: s.reference_kind,
                };
                self.write_body(pid, &view, body)?;
                self.sync_meta_set(pid, id, SET_OBJECT_TYPES, &s.element_types)
            }
            DeclaredProperty::SystemObjectType(t) => self.complete_object_type(&view, t),
            DeclaredProperty::ConfigurationArea(a) => self.complete_area(&view, a),
            DeclaredProperty::Object(o) => self.complete_object(&view, o),
        }
    }

    /// Record that an existing object was written. Created objects are not "patched".
    fn touched(&mut self, pid: &Pid, id: ObjectId, facet: &str) {
        debug!(pid = %pid, id = %id, facet, "patched");
        if !self.run.is_created(id) && self.run.patched.insert(id) {
            self.run.report.record(ActionKind::Patched, pid, id, facet);
        }
    }

    fn write_body(&mut self, pid: &Pid, view: &ObjectView, body: ObjectBody) -> Result<()> {
        if view.body != body {
            self.store.set_body(view.id, body)?;
            self.touched(pid, view.id, view.body.label());
        }
        Ok(())
    }

    /// Remove an object from the modifiable version: drafts are deleted,
    /// published objects invalidated.
    pub(super) fn retire(&mut self, id: ObjectId) -> Result<()> {
        if self.store.lifecycle(id)? == Lifecycle::Draft {
            self.store.delete(id)?;
        } else if self.store.object(id, At::Modifiable)?.not_valid_since == 0 {
            self.store.invalidate(id)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Attribute types
    // -----------------------------------------------------------------------

    fn complete_attribute_type(
        &mut self,
        view: &ObjectView,
        t: &AttributeTypeProperties,
    ) -> Result<()> {
        let pid = &t.header.pid;
        if let AttributeTypeKind::Reference {
            referenced_type: Some(target),
            ..
        } = &t.kind
        {
            self.ensure(target, "referenced type")?;
        }
        let range = match &t.kind {
            AttributeTypeKind::Integer(decl) => {
                let current = match view.body {
                    ObjectBody::IntegerType { range, .. } => range,
                    _ => None,
                };
                let range = self.sync_range(pid, view.id, current, decl.range.as_ref())?;
                self.sync_states(pid, view.id, &decl.states)?;
                range
            }
            _ => None,
        };
        let body = attribute_type_body(&t.kind, range, &self.ctx());
        self.write_body(pid, view, body)
    }

    fn sync_range(
        &mut self,
        pid: &Pid,
        owner: ObjectId,
        current: Option<ObjectId>,
        decl: Option<&ValueRangeDecl>,
    ) -> Result<Option<ObjectId>> {
        let Some(r) = decl else {
            if let Some(old) = current {
                self.retire(old)?;
                self.touched(pid, owner, "range");
            }
            return Ok(None);
        };
        let body = ObjectBody::IntegerValueRange {
            minimum: r.minimum,
            maximum: r.maximum,
            scale: r.scale,
            unit: r.unit.clone(),
        };
        let Some(id) = current else {
            let id = self.create_owned(owner, meta::TYPE_VALUE_RANGE, "", &r.info, body)?;
            self.touched(pid, owner, "range");
            return Ok(Some(id));
        };
        let stored = self.store.object(id, At::Modifiable)?;
        if stored.body != body {
            self.store.set_body(id, body)?;
            self.touched(pid, owner, "range");
        }
        if stored.info != r.info {
            self.store.set_info(id, &r.info)?;
            self.touched(pid, owner, "range.info");
        }
        Ok(Some(id))
    }

    fn sync_states(&mut self, pid: &Pid, owner: ObjectId, decls: &[ValueStateDecl]) -> Result<()> {
        if decls.is_empty() && self.store.set_of(owner, SET_STATES).is_none() {
            return Ok(());
        }
        let set = self.ensure_meta_set(owner, SET_STATES)?;
        let stored = query::states_of(&*self.store, owner, At::Modifiable)?;

        // Exact names first, then renames (same value, name no longer declared).
        let mut matched: Vec<Option<ObjectId>> = decls
            .iter()
            .map(|d| stored.iter().find(|s| s.name == d.name).map(|s| s.id))
            .collect();
        for (i, d) in decls.iter().enumerate() {
            if matched[i].is_some() {
                continue;
            }
            let renamed = stored.iter().find(|s| {
                matches!(s.body, ObjectBody::IntegerValueState { value } if value == d.value)
                    && !decls.iter().any(|o| o.name == s.name)
                    && !matched.contains(&Some(s.id))
            });
            matched[i] = renamed.map(|s| s.id);
        }

        for (d, found) in decls.iter().zip(&matched) {
            let body = ObjectBody::IntegerValueState { value: d.value };
            let Some(state) = found.and_then(|id| stored.iter().find(|s| s.id == id)) else {
                let id = self.create_owned(owner, meta::TYPE_VALUE_STATE, &d.name, &d.info, body)?;
                self.store.add_member(set, id)?;
                self.touched(pid, owner, "states");
                continue;
            };
            if state.name != d.name {
                self.store.set_name(state.id, &d.name)?;
                self.touched(pid, owner, "states");
            }
            if state.body != body {
                self.store.set_body(state.id, body)?;
                self.touched(pid, owner, "states");
            }
            if state.info != d.info {
                self.store.set_info(state.id, &d.info)?;
                self.touched(pid, owner, "states");
            }
        }
        for state in &stored {
            if !matched.contains(&Some(state.id)) {
                self.store.remove_member(set, state.id)?;
                self.retire(state.id)?;
                self.touched(pid, owner, "states");
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Attributes and groups
    // -----------------------------------------------------------------------

    fn sync_attributes(&mut self, pid: &Pid, owner: ObjectId, decls: &[AttributeDecl]) -> Result<()> {
        if decls.is_empty() && self.store.set_of(owner, SET_ATTRIBUTES).is_none() {
            return Ok(());
        }
        let set = self.ensure_meta_set(owner, SET_ATTRIBUTES)?;
        let stored = query::attributes_of(&*self.store, owner, At::Modifiable)?;
        let relaxed = self.options.relaxed_changes;

        for (i, decl) in decls.iter().enumerate() {
            let position = i as u32 + 1;
            let attribute_type = self.ensure(&decl.attribute_type, "attribute type")?;
            let body = ObjectBody::Attribute {
                position,
                max_count: decl.max_count,
                variable_count: decl.variable_count,
                attribute_type,
                default: decl.default.clone(),
            };
            let Some(attr) = stored.iter().find(|a| a.name == decl.name) else {
                let id = self.create_owned(owner, meta::TYPE_ATTRIBUTE, &decl.name, &decl.info, body)?;
                self.store.add_member(set, id)?;
                self.touched(pid, owner, "attributes");
                continue;
            };
            let diffs = compare_attribute(decl, position, attr, &self.ctx())?;
            if diffs.is_empty() {
                continue;
            }
            let draft = self.store.lifecycle(attr.id)? == Lifecycle::Draft;
            if draft || processable(&diffs, relaxed) {
                if attr.body != body {
                    self.store.set_body(attr.id, body)?;
                }
                if attr.info != decl.info {
                    self.store.set_info(attr.id, &decl.info)?;
                }
                self.touched(pid, owner, "attributes");
                continue;
            }

            info!(pid = %pid, attribute = %decl.name, "attribute replaced");
            self.store.remove_member(set, attr.id)?;
            self.retire(attr.id)?;
            let id = self.create_owned(owner, meta::TYPE_ATTRIBUTE, &decl.name, &decl.info, body)?;
            self.store.add_member(set, id)?;
            self.run
                .report
                .record(ActionKind::Replaced, pid, id, format!("attribute '{}'", decl.name));
            self.touched(pid, owner, "attributes");
        }

        for attr in &stored {
            if !decls.iter().any(|d| d.name == attr.name) {
                self.store.remove_member(set, attr.id)?;
                self.retire(attr.id)?;
                self.touched(pid, owner, "attributes");
            }
        }
        Ok(())
    }

    fn complete_group(&mut self, view: &ObjectView, g: &AttributeGroupProperties) -> Result<()> {
        let pid = &g.header.pid;
        let body = ObjectBody::AttributeGroup {
            configuring: g.configuring,
            parameter: g.parameter,
        };
        self.write_body(pid, view, body)?;
        self.sync_usages(pid, view.id, g)?;
        self.sync_attributes(pid, view.id, &g.attributes)
    }

    fn sync_usages(&mut self, pid: &Pid, atg: ObjectId, g: &AttributeGroupProperties) -> Result<()> {
        let desired = desired_usages(g, &self.ctx());
        let stored = query::usages_of(&*self.store, atg, At::Modifiable)?;
        let mut kept = BTreeSet::new();
        for (aspect_pid, aspect, usage, explicit) in desired {
            let aspect = match aspect {
                Some(id) => id,
                None => self.ensure(&aspect_pid, "usage aspect")?,
            };
            let body = ObjectBody::AttributeGroupUsage {
                attribute_group: atg,
                aspect,
                usage,
                explicit,
            };
            let existing = stored.iter().find(|u| {
                matches!(u.body, ObjectBody::AttributeGroupUsage { aspect: a, .. } if a == aspect)
            });
            match existing {
                Some(u) => {
                    kept.insert(u.id);
                    if u.body != body {
                        self.store.set_body(u.id, body)?;
                        self.touched(pid, atg, "usages");
                    }
                }
                None => {
                    self.create_usage(atg, aspect, usage, explicit)?;
                    self.touched(pid, atg, "usages");
                }
            }
        }
        for u in &stored {
            if kept.contains(&u.id) {
                continue;
            }
            if let Some(set) = self.store.set_of(atg, SET_USAGES) {
                self.store.remove_member(set, u.id)?;
            }
            self.retire(u.id)?;
            self.touched(pid, atg, "usages");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sets of type-like objects
    // -----------------------------------------------------------------------

    /// Make the meta set `set_name` of `owner` hold exactly the objects `pids` denote.
    fn sync_meta_set(&mut self, pid: &Pid, owner: ObjectId, set_name: &str, pids: &[Pid]) -> Result<()> {
        let mut desired = Vec::with_capacity(pids.len());
        for p in pids {
            desired.push(self.ensure(p, set_name)?);
        }
        if desired.is_empty() && self.store.set_of(owner, set_name).is_none() {
            return Ok(());
        }
        let set = self.ensure_meta_set(owner, set_name)?;
        self.sync_members(pid, owner, set, set_name, &desired)
    }

    fn sync_members(
        &mut self,
        pid: &Pid,
        owner: ObjectId,
        set: ObjectId,
        set_name: &str,
        desired: &[ObjectId],
    ) -> Result<()> {
        let current = self.store.members(set, At::Modifiable)?;
        for id in desired {
            if !current.contains(id) {
                self.store.add_member(set, *id)?;
                self.touched(pid, owner, set_name);
            }
        }
        for id in &current {
            if !desired.contains(id) {
                self.store.remove_member(set, *id)?;
                self.touched(pid, owner, set_name);
            }
        }
        Ok(())
    }

    fn complete_object_type(&mut self, view: &ObjectView, t: &SystemObjectTypeProperties) -> Result<()> {
        let pid = &t.header.pid;
        let body = ObjectBody::SystemObjectType {
            configuring: t.configuring,
            persistence_mode: t.persistence_mode,
        };
        self.write_body(pid, view, body)?;
        self.sync_meta_set(pid, view.id, SET_SUPERTYPES, &t.supertypes)?;
        self.sync_meta_set(pid, view.id, SET_ATTRIBUTE_GROUPS, &t.attribute_groups)?;
        self.sync_set_uses(pid, view.id, &t.set_uses)?;

        for d in &t.default_parameters {
            self.ensure(&d.object_type, "default parameter type")?;
            self.ensure(&d.attribute_group, "default parameter group")?;
        }
        let usage = defaults::usage(&*self.store)?;
        let declared = defaults::encode(&t.default_parameters, &self.ctx())?;
        if declared != self.store.dataset(view.id, usage, At::Modifiable)? {
            match declared {
                Some(data) => self.store.set_dataset(view.id, usage, data)?,
                None => self.store.remove_dataset(view.id, usage)?,
            }
            self.touched(pid, view.id, "default_parameters");
        }
        Ok(())
    }

    fn sync_set_uses(&mut self, pid: &Pid, owner: ObjectId, uses: &[SetUseDecl]) -> Result<()> {
        let stored = query::member_views(&*self.store, owner, SET_SET_USES, At::Modifiable)?;
        if uses.is_empty() && stored.is_empty() {
            return Ok(());
        }
        let set = self.ensure_meta_set(owner, SET_SET_USES)?;
        let mut kept = BTreeSet::new();
        for d in uses {
            let set_type = self.ensure(&d.set_type, "set use type")?;
            let body = ObjectBody::ObjectSetUse {
                set_name: d.name.clone(),
                set_type,
                required: d.required,
            };
            let existing = stored.iter().find(|u| {
                matches!(&u.body, ObjectBody::ObjectSetUse { set_name, .. } if *set_name == d.name)
            });
            match existing {
                Some(u) => {
                    kept.insert(u.id);
                    if u.body != body {
                        self.store.set_body(u.id, body)?;
                        self.touched(pid, owner, "set_uses");
                    }
                }
                None => {
                    let id = self.create_owned(owner, meta::TYPE_SET_USE, &d.name, &Info::default(), body)?;
                    self.store.add_member(set, id)?;
                    self.touched(pid, owner, "set_uses");
                }
            }
        }
        for u in &stored {
            if !kept.contains(&u.id) {
                self.store.remove_member(set, u.id)?;
                self.retire(u.id)?;
                self.touched(pid, owner, "set_uses");
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Areas
    // -----------------------------------------------------------------------

    fn complete_area(&mut self, view: &ObjectView, a: &ConfigurationAreaProperties) -> Result<()> {
        let pid = &a.header.pid;
        let id = view.id;
        if self.store.change_log(id, At::Modifiable)? != a.change_log {
            self.store.set_change_log(id, a.change_log.clone())?;
            self.touched(pid, id, "change_log");
        }
        if self.run.is_created(id) {
            return Ok(());
        }

        let declared = self
            .ctx()
            .resolve(&a.authority)
            .ok_or_else(|| ImportError::unresolved(&a.authority, "area authority"))?;
        let live = match view.body {
            ObjectBody::ConfigurationArea { authority } => authority,
            _ => None,
        };
        let usage = authority::usage(&*self.store)?;
        let pending = authority::pending(&*self.store, id, At::Modifiable)?;
        if live == Some(declared) {
            if pending.is_some() {
                self.store.remove_dataset(id, usage)?;
                self.touched(pid, id, "pending_authority");
            }
            return Ok(());
        }
        if pending.map(|(authority, _)| authority) != Some(declared) {
            let effective_from = self.store.area_versions(id)?.modifiable();
            info!(area = %pid, authority = %a.authority, effective_from, "authority change pending");
            self.store
                .set_dataset(id, usage, authority::encode(declared, effective_from))?;
            self.touched(pid, id, "pending_authority");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Concrete objects
    // -----------------------------------------------------------------------

    fn complete_object(&mut self, view: &ObjectView, o: &ObjectProperties) -> Result<()> {
        let pid = &o.header.pid;
        let id = view.id;

        let mut declared_usages = BTreeSet::new();
        for ds in &o.datasets {
            let write = {
                let ctx = self.ctx();
                let (usage, _) = dataset_usage(&ctx, &ds.attribute_group, &ds.aspect)?.ok_or_else(|| {
                    ImportError::invalid(
                        &ds.attribute_group,
                        format!("group has no usage for aspect '{}'", ds.aspect),
                    )
                })?;
                declared_usages.insert(usage);
                let schema = group_schema(&ctx, &ds.attribute_group)?;
                let stored = ctx.store.dataset(id, usage, At::Modifiable)?;
                match stored {
                    Some(s) if tree_matches(&schema, &ds.data, &s, &ctx) => None,
                    _ => Some((usage, encode_tree(&schema, &ds.data, &ctx)?)),
                }
            };
            if let Some((usage, data)) = write {
                self.store.set_dataset(id, usage, data)?;
                self.touched(pid, id, "datasets");
            }
        }

        for (usage, _) in self.store.datasets(id, At::Modifiable)? {
            if declared_usages.contains(&usage) {
                continue;
            }
            let ObjectBody::AttributeGroupUsage {
                attribute_group,
                usage: class,
                ..
            } = self.store.object(usage, At::Modifiable)?.body
            else {
                continue;
            };
            let group = query::pid_of(&*self.store, attribute_group);
            if self.ctx().is_hidden_group(&group) || !class.is_configuring() {
                continue;
            }
            self.store.remove_dataset(id, usage)?;
            self.touched(pid, id, "datasets");
        }

        self.complete_object_sets(view, o)
    }

    fn complete_object_sets(&mut self, view: &ObjectView, o: &ObjectProperties) -> Result<()> {
        let pid = &o.header.pid;
        let id = view.id;
        let editable_owner =
            self.run.is_created(id) || self.store.lifecycle(id)? == Lifecycle::Draft;

        for sd in &o.sets {
            let mut desired = Vec::with_capacity(sd.elements.len());
            for element in &sd.elements {
                desired.push(self.ensure(element, "set element")?);
            }
            let set = match self.store.set_of(id, &sd.name) {
                Some(set) => set,
                None => {
                    let set_type = self.set_type_for(view, &sd.name)?;
                    let set = self.store.create_set(id, &sd.name, set_type)?;
                    self.touched(pid, id, "sets");
                    set
                }
            };
            let current = self.store.members(set, At::Modifiable)?;
            let same = current.len() == desired.len() && desired.iter().all(|d| current.contains(d));
            if same {
                continue;
            }
            let permitted = editable_owner
                || set_governor(&*self.store, view, &sd.name)?.is_some_and(|g| g.permits_patch());
            if !permitted {
                warn!(pid = %pid, set = %sd.name, "set membership left unchanged");
                continue;
            }
            self.sync_members(pid, id, set, "sets", &desired)?;
        }

        for (name, set) in self.store.sets_of(id) {
            if o.sets.iter().any(|s| s.name == name) {
                continue;
            }
            let current = self.store.members(set, At::Modifiable)?;
            if current.is_empty() {
                continue;
            }
            let permitted = editable_owner
                || set_governor(&*self.store, view, &name)?.is_some_and(|g| g.permits_patch());
            if permitted {
                self.sync_members(pid, id, set, "sets", &[])?;
            }
        }
        Ok(())
    }

    /// Set type the owner's type (or one of its supertypes) uses for `set_name`.
    fn set_type_for(&self, view: &ObjectView, set_name: &str) -> Result<ObjectId> {
        query::set_uses_of_type(&*self.store, view.type_id, At::Modifiable)?
            .into_iter()
            .find_map(|u| match u.body {
                ObjectBody::ObjectSetUse { set_name: n, set_type, .. } if n == set_name => Some(set_type),
                _ => None,
            })
            .ok_or_else(|| ImportError::invalid(&view.pid, format!("type has no set use '{set_name}'")))
    }
}
