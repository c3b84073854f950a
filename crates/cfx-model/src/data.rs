use serde::{Deserialize, Serialize};

/// Declared dataset tree.
///
/// Leaves carry text exactly as it appears in a bundle; typing happens against
/// the attribute-group schema when the tree is written to or compared with the
/// store. Element nodes inside an `Array` carry an empty name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum DataNode {
    Value { name: String, value: String },
    List { name: String, items: Vec<DataNode> },
    Array { name: String, items: Vec<DataNode> },
}

impl DataNode {
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        DataNode::Value {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn list(name: impl Into<String>, items: Vec<DataNode>) -> Self {
        DataNode::List {
            name: name.into(),
            items,
        }
    }

    pub fn array(name: impl Into<String>, items: Vec<DataNode>) -> Self {
        DataNode::Array {
            name: name.into(),
            items,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DataNode::Value { name, .. } | DataNode::List { name, .. } | DataNode::Array { name, .. } => {
                name
            }
        }
    }

    /// Short variant label for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            DataNode::Value { .. } => "value",
            DataNode::List { .. } => "list",
            DataNode::Array { .. } => "array",
        }
    }
}
