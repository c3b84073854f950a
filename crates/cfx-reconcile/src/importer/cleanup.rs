//! CleaningUp: retire what the batch no longer declares.
//!
//! Objects carrying a dataset of a hidden attribute group are exempt; they
//! are neither exported nor expected back in a bundle.

use std::collections::BTreeSet;

use cfx_model::Pid;
use cfx_store::{query, At, Lifecycle, ObjectBody, ObjectId, ObjectKind};
use tracing::{debug, info};

use super::run::ImportPhase;
use super::Session;
use crate::{ActionKind, ResolveContext, Result};

impl Session<'_> {
    pub(super) fn clean_up(&mut self) -> Result<()> {
        self.enter(ImportPhase::CleaningUp);
        let index = self.index;
        let kept: BTreeSet<ObjectId> = self.run.bindings.values().copied().collect();

        let mut candidates = Vec::new();
        for area_pid in index.area_pids() {
            let Some(area) = self.run.bindings.get(area_pid).copied() else {
                continue;
            };
            for id in self.store.objects_in_area(area)? {
                if id != area {
                    candidates.push(id);
                }
            }
        }
        // Refused candidates living outside the declared areas.
        candidates.extend(self.run.replaced.iter().copied());

        let mut seen = BTreeSet::new();
        for id in candidates {
            if !seen.insert(id) || kept.contains(&id) || self.run.is_created(id) {
                continue;
            }
            self.retire_undeclared(id)?;
        }

        for id in kept {
            let Ok(view) = self.store.object(id, At::Modifiable) else {
                continue;
            };
            if view.kind != ObjectKind::Configuring || view.not_valid_since == 0 {
                continue;
            }
            let modifiable = self.store.area_versions(view.area)?.modifiable();
            if view.not_valid_since == modifiable {
                self.store.revalidate(id)?;
                debug!(pid = %view.pid, id = %id, "revalidated");
                self.run.report.record(ActionKind::Revalidated, &view.pid, id, "");
            }
        }
        info!(
            invalidated = self.run.report.count(ActionKind::Invalidated),
            deleted = self.run.report.count(ActionKind::Deleted),
            revalidated = self.run.report.count(ActionKind::Revalidated),
            "cleanup finished"
        );
        Ok(())
    }

    fn retire_undeclared(&mut self, id: ObjectId) -> Result<()> {
        // Already deleted together with its owner, or otherwise unreadable.
        let Ok(view) = self.store.object(id, At::Modifiable) else {
            return Ok(());
        };
        if view.owner.is_some() || view.pid.is_empty() {
            return Ok(());
        }
        if let Some(group) = self.hidden_dataset_group(id)? {
            debug!(pid = %view.pid, id = %id, group = %group, "undeclared object kept for hidden dataset");
            return Ok(());
        }
        match self.store.lifecycle(id)? {
            Lifecycle::Retired => {}
            Lifecycle::Draft => {
                self.store.delete(id)?;
                debug!(pid = %view.pid, id = %id, "undeclared draft deleted");
                self.run.report.record(ActionKind::Deleted, &view.pid, id, "undeclared");
            }
            Lifecycle::Released | Lifecycle::Active => {
                if view.not_valid_since == 0 {
                    self.store.invalidate(id)?;
                    debug!(pid = %view.pid, id = %id, "undeclared object invalidated");
                    self.run.report.record(ActionKind::Invalidated, &view.pid, id, "undeclared");
                }
            }
        }
        Ok(())
    }

    /// First hidden attribute group `id` carries a dataset of, if any.
    /// Such objects hold housekeeping state that bundles never declare.
    fn hidden_dataset_group(&self, id: ObjectId) -> Result<Option<Pid>> {
        for (usage, _) in self.store.datasets(id, At::Modifiable)? {
            if let ObjectBody::AttributeGroupUsage { attribute_group, .. } =
                self.store.object(usage, At::Modifiable)?.body
            {
                let group = query::pid_of(&*self.store, attribute_group);
                if self.ctx().is_hidden_group(&group) {
                    return Ok(Some(group));
                }
            }
        }
        Ok(None)
    }
}
