//! cfx-model
//!
//! Declared-state Property Model.
//!
//! A configuration bundle describes the complete intended state of one
//! configuration area. This crate holds the typed nodes such a bundle is made
//! of; it knows nothing about the live object store.
//!
//! - [`Pid`]: permanent textual identifier.
//! - [`DeclaredProperty`]: closed sum of every declarable kind.
//! - [`DataNode`]: three-variant dataset tree (value / list / array).
//! - [`binary`]: embedded binary form used for default-parameter payloads.
//!
//! Pure data. No IO.

pub mod binary;
mod data;
mod pid;
mod property;
mod types;

pub use data::DataNode;
pub use pid::Pid;
pub use property::*;
pub use types::*;
