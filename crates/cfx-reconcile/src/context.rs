use cfx_model::{DeclaredProperty, Pid};
use cfx_store::{LookupScope, ObjectId, ObjectStore};

use crate::ImportOptions;

/// What the comparator and value codec may consult while judging a
/// declaration: the store, the run's bindings, and the rest of the batch.
pub trait ResolveContext {
    fn store(&self) -> &dyn ObjectStore;

    /// Object a Pid denotes right now: run binding first, then the store.
    fn resolve(&self, pid: &Pid) -> Option<ObjectId>;

    /// Declaration of `pid` in the current batch, if any.
    fn declared(&self, pid: &Pid) -> Option<&DeclaredProperty>;

    /// Area the declaration of `pid` lives in, once that area is bound.
    fn declaring_area(&self, pid: &Pid) -> Option<ObjectId>;

    fn default_aspect(&self) -> &Pid;

    fn relaxed_changes(&self) -> bool;

    fn is_hidden_group(&self, pid: &Pid) -> bool;
}

/// Candidate a Pid currently denotes in the store: released, then active, then draft.
pub fn lookup_current(store: &dyn ObjectStore, pid: &Pid) -> Option<ObjectId> {
    [LookupScope::Released, LookupScope::Active, LookupScope::Draft]
        .into_iter()
        .find_map(|scope| store.lookup(pid, scope))
}

/// Context without a batch: every Pid resolves against the store only.
pub struct StoreContext<'a> {
    store: &'a dyn ObjectStore,
    options: &'a ImportOptions,
}

impl<'a> StoreContext<'a> {
    pub fn new(store: &'a dyn ObjectStore, options: &'a ImportOptions) -> Self {
        Self { store, options }
    }
}

impl ResolveContext for StoreContext<'_> {
    fn store(&self) -> &dyn ObjectStore {
        self.store
    }

    fn resolve(&self, pid: &Pid) -> Option<ObjectId> {
        lookup_current(self.store, pid)
    }

    fn declared(&self, _pid: &Pid) -> Option<&DeclaredProperty> {
        None
    }

    fn declaring_area(&self, _pid: &Pid) -> Option<ObjectId> {
        None
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
