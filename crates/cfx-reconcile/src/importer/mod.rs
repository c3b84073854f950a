//! Multi-pass import of declared configuration areas.
//!
//! # Phases
//! 1. **Resolving**: bind every declared Pid to a usable object (kept,
//!    reused draft, or freshly created) until a whole pass changes nothing.
//! 2. **Completing**: write the facets of bound objects that still differ.
//! 3. **CleaningUp**: retire undeclared objects of the declared areas and
//!    refused candidates; revalidate kept objects whose invalidation is not
//!    published yet.
//!
//! # Design
//! All bookkeeping of a run lives in one [`ImportRun`](run::ImportRun); two
//! importers never share state. Refusing a candidate is sticky for the rest
//! of the run, which bounds the number of passes.

mod cleanup;
mod complete;
mod create;
mod index;
mod resolve;
mod run;

use cfx_model::ConfigurationAreaProperties;
use cfx_store::ObjectStore;
use tracing::{debug, info};

use crate::{ImportOptions, ImportReport, Result};
use index::DeclarationIndex;
use run::{ImportRun, RunContext};

pub use run::ImportPhase;

pub struct Importer<'s> {
    store: &'s mut dyn ObjectStore,
    options: ImportOptions,
}

impl<'s> Importer<'s> {
    pub fn new(store: &'s mut dyn ObjectStore, options: ImportOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Merge `areas` into the store.
    ///
    /// On error the store may hold new drafts; published versions are never
    /// touched.
    pub fn run(&mut self, areas: &[ConfigurationAreaProperties]) -> Result<ImportReport> {
        let declared: usize = areas.iter().map(|a| a.objects.len()).sum();
        info!(areas = areas.len(), declared, author = %self.options.author, "import started");

        let index = DeclarationIndex::build(areas, &*self.store)?;
        let mut session = Session {
            store: &mut *self.store,
            index: &index,
            options: &self.options,
            run: ImportRun::default(),
        };
        session.resolve_all()?;
        session.complete_all()?;
        session.clean_up()?;
        session.enter(ImportPhase::Closed);

        let report = session.run.report;
        info!(
            passes = report.passes,
            actions = report.actions.len(),
            refused = report.refused.len(),
            "import closed"
        );
        Ok(report)
    }
}

/// One import run over a store.
pub(crate) struct Session<'a> {
    store: &'a mut dyn ObjectStore,
    index: &'a DeclarationIndex<'a>,
    options: &'a ImportOptions,
    run: ImportRun,
}

impl Session<'_> {
    fn ctx(&self) -> RunContext<'_> {
        RunContext {
            store: &*self.store,
            run: &self.run,
            index: self.index,
            options: self.options,
        }
    }

    fn enter(&mut self, phase: ImportPhase) {
        debug!(from = ?self.run.phase, to = ?phase, "import phase");
        self.run.phase = phase;
    }
}
