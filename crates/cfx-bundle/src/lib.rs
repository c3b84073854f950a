//! cfx-bundle
//!
//! File side of configuration bundles: one file per configuration area,
//! named `<AreaPid>.<extension>`.
//!
//! - [`BundleCodec`]: the textual form of a bundle. [`JsonCodec`] is the
//!   default; any other syntax plugs in here.
//! - [`BundleDirectory`]: read and write bundle files. Overwriting a bundle
//!   first moves the existing file to a backup name.

mod codec;
mod directory;

pub use codec::{BundleCodec, JsonCodec};
pub use directory::{BundleDirectory, BundleSettings};
