use serde::{Deserialize, Serialize};

use crate::ObjectId;

/// Typed dataset value as held by the store.
///
/// Integers are stored unscaled; presentation scaling is applied by whoever
/// renders the value against its attribute type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Data {
    Integer(i64),
    Double(f64),
    Text(String),
    /// Milliseconds; absolute (since epoch) or relative per attribute type.
    Time(i64),
    Reference(Option<ObjectId>),
    /// Named fields in attribute order.
    List(Vec<(String, Data)>),
    Array(Vec<Data>),
}

impl Data {
    pub fn field(&self, name: &str) -> Option<&Data> {
        match self {
            Data::List(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, d)| d),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Data::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Data::Reference(r) => *r,
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Data::Integer(_) => "integer",
            Data::Double(_) => "double",
            Data::Text(_) => "text",
            Data::Time(_) => "time",
            Data::Reference(_) => "reference",
            Data::List(_) => "list",
            Data::Array(_) => "array",
        }
    }
}
