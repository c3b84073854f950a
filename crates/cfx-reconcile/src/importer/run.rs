use std::collections::{BTreeMap, BTreeSet};

use cfx_model::{DeclaredProperty, Pid};
use cfx_store::{ObjectId, ObjectStore};

use super::index::DeclarationIndex;
use crate::context::lookup_current;
use crate::{ImportOptions, ImportReport, ResolveContext};

/// Phase of an import run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImportPhase {
    #[default]
    Resolving,
    Completing,
    CleaningUp,
    Closed,
}

/// Bookkeeping of one import run. Nothing here outlives the run.
#[derive(Debug, Default)]
pub(crate) struct ImportRun {
    pub phase: ImportPhase,
    /// Declared Pid -> object it currently denotes.
    pub bindings: BTreeMap<Pid, ObjectId>,
    /// Objects created by this run (drafts or live dynamic objects).
    pub created: BTreeSet<ObjectId>,
    /// Candidates refused for a Pid. Sticky for the rest of the run.
    pub rejected: BTreeMap<Pid, ObjectId>,
    /// Refused candidates, retired during cleanup.
    pub replaced: BTreeSet<ObjectId>,
    /// Pids whose creation is in progress.
    pub creating: BTreeSet<Pid>,
    /// Existing objects written during completion.
    pub patched: BTreeSet<ObjectId>,
    /// Set when a pass created, bound or unbound anything.
    pub changed: bool,
    pub report: ImportReport,
}

impl ImportRun {
    pub fn is_created(&self, id: ObjectId) -> bool {
        self.created.contains(&id)
    }
}

/// [`ResolveContext`] over the store, the batch and the run's bindings.
pub(crate) struct RunContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub run: &'a ImportRun,
    pub index: &'a DeclarationIndex<'a>,
    pub options: &'a ImportOptions,
}

impl ResolveContext for RunContext<'_> {
    fn store(&self) -> &dyn ObjectStore {
        self.store
    }

    fn resolve(&self, pid: &Pid) -> Option<ObjectId> {
        if let Some(id) = self.run.bindings.get(pid) {
            return Some(*id);
        }
        // A refused candidate must be forgotten by everything that referenced it.
        if self.run.rejected.contains_key(pid) {
            return None;
        }
        lookup_current(self.store, pid)
    }

    fn declared(&self, pid: &Pid) -> Option<&DeclaredProperty> {
        self.index.get(pid)
    }

    fn declaring_area(&self, pid: &Pid) -> Option<ObjectId> {
        let area = self.index.area_of(pid)?;
        self.run.bindings.get(area).copied()
    }

    fn default_aspect(&self) -> &Pid {
        &self.options.default_aspect
    }

    fn relaxed_changes(&self) -> bool {
        self.options.relaxed_changes
    }

    fn is_hidden_group(&self, pid: &Pid) -> bool {
        self.options.hidden_attribute_groups.contains(pid)
    }
}
