//! Resolving: bind every declared Pid to a usable object until a pass
//! changes nothing.

use cfx_model::{ConfigurationAreaProperties, DeclaredProperty, Pid};
use cfx_store::{At, LookupScope, ObjectId};
use tracing::{debug, info, warn};

use super::run::ImportPhase;
use super::Session;
use crate::comparator::{compare, processable, Governor};
use crate::context::lookup_current;
use crate::{ActionKind, ImportError, ResolveContext, Result, StructuralConflict};

impl Session<'_> {
    pub(super) fn resolve_all(&mut self) -> Result<()> {
        self.enter(ImportPhase::Resolving);
        let index = self.index;
        loop {
            if self.run.report.passes >= self.options.max_passes {
                return Err(StructuralConflict::NoConvergence(self.options.max_passes).into());
            }
            self.run.report.passes += 1;
            self.run.changed = false;
            for pid in index.ordered() {
                self.resolve_one(pid)?;
            }
            debug!(
                pass = self.run.report.passes,
                bound = self.run.bindings.len(),
                changed = self.run.changed,
                "resolving pass finished"
            );
            if !self.run.changed {
                break;
            }
        }
        info!(passes = self.run.report.passes, "resolving converged");
        Ok(())
    }

    /// Bind `pid` for this pass; `None` when a refused binding was just dropped.
    pub(super) fn resolve_one(&mut self, pid: &Pid) -> Result<Option<ObjectId>> {
        if let Some(id) = self.run.bindings.get(pid).copied() {
            if self.run.is_created(id) {
                return Ok(Some(id));
            }
        }
        let index = self.index;
        let prop = index
            .get(pid)
            .ok_or_else(|| ImportError::unresolved(pid, "declaration"))?;
        if let DeclaredProperty::ConfigurationArea(area) = prop {
            return self.resolve_area(area).map(Some);
        }

        let candidate = self
            .store
            .lookup(pid, LookupScope::Released)
            .or_else(|| self.store.lookup(pid, LookupScope::Active));
        if let Some(candidate) = candidate {
            if self.run.rejected.get(pid) != Some(&candidate) {
                let view = self.store.object(candidate, At::Modifiable)?;
                let diffs = compare(prop, &view, &self.ctx())?;
                let relaxed = self.options.relaxed_changes;
                if processable(&diffs, relaxed) {
                    for d in diffs.iter().filter(|d| !d.governor.permits_patch()) {
                        warn!(pid = %pid, change = %d, "relaxed change accepted");
                    }
                    if let Some(draft) = self.store.lookup(pid, LookupScope::Draft) {
                        self.store.delete(draft)?;
                        self.run.report.record(ActionKind::Deleted, pid, draft, "stray draft");
                    }
                    self.bind(pid, candidate);
                    return Ok(Some(candidate));
                }

                info!(pid = %pid, candidate = %candidate, differences = diffs.len(), "change refused");
                self.run.rejected.insert(pid.clone(), candidate);
                self.run.replaced.insert(candidate);
                self.run.report.refuse(pid, candidate, &diffs);
                if self.run.bindings.get(pid) == Some(&candidate) {
                    // Siblings still holding the old binding re-resolve on the next pass.
                    self.run.bindings.remove(pid);
                    self.run.changed = true;
                    return Ok(None);
                }
            }
        }

        if let Some(draft) = self.store.lookup(pid, LookupScope::Draft) {
            let view = self.store.object(draft, At::Modifiable)?;
            let diffs = compare(prop, &view, &self.ctx())?;
            if !diffs.iter().any(|d| d.governor == Governor::Identity) {
                self.bind(pid, draft);
                return Ok(Some(draft));
            }
            debug!(pid = %pid, draft = %draft, "draft of another kind discarded");
            self.store.delete(draft)?;
            self.run.report.record(ActionKind::Deleted, pid, draft, "draft of another kind");
        }
        self.create(prop)
    }

    /// Areas are bound wherever they are found; they are never replaced.
    fn resolve_area(&mut self, area: &ConfigurationAreaProperties) -> Result<ObjectId> {
        let pid = &area.header.pid;
        if let Some(id) = self.run.bindings.get(pid) {
            return Ok(*id);
        }
        let id = match lookup_current(&*self.store, pid) {
            Some(id) => {
                self.bind(pid, id);
                id
            }
            None => {
                let authority = self
                    .ctx()
                    .resolve(&area.authority)
                    .ok_or_else(|| ImportError::unresolved(&area.authority, "area authority"))?;
                let id = self
                    .store
                    .create_area(pid, &area.header.name, Some(authority))?;
                self.mark_created(pid, id);
                id
            }
        };
        Ok(id)
    }

    /// Object `pid` denotes, creating its declaration on demand.
    pub(super) fn ensure(&mut self, pid: &Pid, context: &str) -> Result<ObjectId> {
        if let Some(id) = self.ctx().resolve(pid) {
            return Ok(id);
        }
        let index = self.index;
        let Some(prop) = index.get(pid) else {
            return Err(ImportError::unresolved(pid, context));
        };
        match self.create(prop)? {
            Some(id) => Ok(id),
            None => Err(ImportError::unresolved(pid, context)),
        }
    }

    pub(super) fn bind(&mut self, pid: &Pid, id: ObjectId) {
        match self.run.bindings.insert(pid.clone(), id) {
            Some(previous) if previous == id => {}
            Some(previous) => {
                self.run.changed = true;
                self.run
                    .report
                    .record(ActionKind::Rebound, pid, id, format!("was {previous}"));
            }
            None => {
                self.run.changed = true;
                self.run.report.record(ActionKind::Kept, pid, id, "");
            }
        }
    }

    pub(super) fn mark_created(&mut self, pid: &Pid, id: ObjectId) {
        self.run.bindings.insert(pid.clone(), id);
        self.run.created.insert(id);
        self.run.changed = true;
        let kind = if self.run.rejected.contains_key(pid) {
            ActionKind::Replaced
        } else {
            ActionKind::Created
        };
        self.run.report.record(kind, pid, id, "");
        debug!(pid = %pid, id = %id, "object created");
    }
}
