//! cfx-reconcile
//!
//! Reconciliation engine of the configuration service.
//!
//! - [`compare`]: field-by-field equality of a declaration against a stored
//!   object, each difference tagged with the meta class governing it.
//! - [`Importer`]: multi-pass merge of declared areas into an
//!   [`ObjectStore`](cfx_store::ObjectStore) until a fixed point is reached.
//! - [`Exporter`]: live state back to declared bundles.
//!
//! Published versions are never rewritten. Incompatible changes are absorbed
//! by giving the declaration a fresh identity, never raised.

mod authority;
mod comparator;
mod context;
mod defaults;
mod error;
mod exporter;
mod importer;
mod options;
mod report;
pub mod schema;
pub mod values;

pub use comparator::{
    compare, compare_attribute, is_different, is_processable, processable, Difference, Governor,
    SetMutability,
};
pub use context::{lookup_current, ResolveContext, StoreContext};
pub use error::{ImportError, Result, StructuralConflict};
pub use exporter::Exporter;
pub use importer::{ImportPhase, Importer};
pub use options::{default_hidden_groups, ExportOptions, ImportOptions};
pub use report::{ActionKind, ImportAction, ImportReport, RefusedChange, ReportEvent};
