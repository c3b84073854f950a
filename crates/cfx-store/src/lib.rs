//! cfx-store
//!
//! Versioned, typed object graph of the configuration service.
//!
//! - [`ObjectStore`]: the operations the reconciliation engine needs
//!   (lookup by Pid per lifecycle scope, validity, sets, datasets, creation,
//!   soft-invalidate / revalidate / hard-delete).
//! - [`MemoryStore`]: in-process implementation with a bootstrapped meta model
//!   and a publication helper for hosts and tests.
//! - [`MetaPolicy`]: per-field mutability classes registered as meta
//!   attribute-group usages, so the object model itself decides what may be
//!   patched in place.
//!
//! Every write to a configuring object lands in its area's modifiable
//! version. Published versions are never rewritten.

mod data;
mod error;
mod ids;
mod memory;
pub mod meta;
mod object;
pub mod query;
mod store;
mod versioned;

pub use data::Data;
pub use error::{StoreError, StoreResult};
pub use ids::{AreaVersions, ObjectId, Version};
pub use memory::MemoryStore;
pub use meta::{MetaField, MetaPolicy};
pub use object::{Lifecycle, NewObject, ObjectBody, ObjectKind, ObjectView};
pub use store::{At, LookupScope, ObjectStore};
pub use versioned::Versioned;
