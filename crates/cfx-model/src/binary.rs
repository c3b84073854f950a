//! Embedded binary form of a [`DataNode`] tree.
//!
//! Default-parameter datasets are stored inside a type object as an opaque
//! byte payload and re-expressed as structure on export.
//!
//! Payload: one format-version byte followed by the bincode encoding of the
//! node list. [`DataNode`] is internally tagged for bundle text, which bincode
//! cannot read back, so the payload goes through an externally tagged mirror.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::DataNode;

pub const FORMAT_VERSION: u8 = 2;

#[derive(Debug, Error)]
pub enum BinaryError {
    #[error("payload is empty")]
    Empty,
    #[error("unsupported payload format version {0}")]
    UnsupportedVersion(u8),
    #[error("payload codec failed: {0}")]
    Codec(#[from] bincode::Error),
}

#[derive(Serialize, Deserialize)]
enum WireNode {
    Value(String, String),
    List(String, Vec<WireNode>),
    Array(String, Vec<WireNode>),
}

impl From<&DataNode> for WireNode {
    fn from(node: &DataNode) -> Self {
        match node {
            DataNode::Value { name, value } => WireNode::Value(name.clone(), value.clone()),
            DataNode::List { name, items } => WireNode::List(name.clone(), items.iter().map(Into::into).collect()),
            DataNode::Array { name, items } => WireNode::Array(name.clone(), items.iter().map(Into::into).collect()),
        }
    }
}

impl From<WireNode> for DataNode {
    fn from(node: WireNode) -> Self {
        match node {
            WireNode::Value(name, value) => DataNode::Value { name, value },
            WireNode::List(name, items) => DataNode::List {
                name,
                items: items.into_iter().map(Into::into).collect(),
            },
            WireNode::Array(name, items) => DataNode::Array {
                name,
                items: items.into_iter().map(Into::into).collect(),
            },
        }
    }
}

/// Serialize a dataset tree into its embedded binary form.
pub fn encode(nodes: &[DataNode]) -> Result<Vec<u8>, BinaryError> {
    let wire: Vec<WireNode> = nodes.iter().map(Into::into).collect();
    let mut out = vec![FORMAT_VERSION];
    out.extend(bincode::serialize(&wire)?);
    Ok(out)
}

/// Inverse of [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Vec<DataNode>, BinaryError> {
    let (&version, body) = bytes.split_first().ok_or(BinaryError::Empty)?;
    if version != FORMAT_VERSION {
        return Err(BinaryError::UnsupportedVersion(version));
    }
    let wire: Vec<WireNode> = bincode::deserialize(body)?;
    Ok(wire.into_iter().map(Into::into).collect())
}
