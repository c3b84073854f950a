//! Typed conversion between declared dataset text and stored values.
//!
//! # Numeric tolerance
//! Stored integers are unscaled. With a non-unit scale `k`, a declared
//! decimal `d` matches a stored value `s` iff `|d - s*k| < k/2`, i.e. they
//! fall into the same quantization step. At unit scale only whole numbers
//! are accepted and they must match exactly.
//!
//! # Bounds
//! An encoded integer must fit the type's storage width and, unless it is a
//! state value, its declared range. Non-finite text is rejected.
//!
//! # Legacy packed integers
//! Older bundles wrote some integers as `"<location>/<distance>"`, meaning
//! `location * 65536 + distance` with `0 <= distance < 65536`. Such text is
//! still accepted on input and compared against the stored value; every use
//! is logged. It is never produced on output.

use cfx_model::{DataNode, Pid};
use cfx_store::{query, Data, ObjectStore};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use tracing::warn;

use crate::schema::{AttributeSpec, TypeSpec};
use crate::{ImportError, ResolveContext, Result};

const LEGACY_DISTANCE_RANGE: i64 = 65_536;

// ---------------------------------------------------------------------------
// Integers
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
enum IntegerText {
    State(i64),
    Legacy(i64),
    Decimal(f64),
}

fn parse_integer(text: &str, states: &[(String, i64)]) -> Option<IntegerText> {
    let text = text.trim();
    if let Some((_, v)) = states.iter().find(|(name, _)| name == text) {
        return Some(IntegerText::State(*v));
    }
    if let Some(packed) = parse_legacy(text) {
        return Some(IntegerText::Legacy(packed));
    }
    text.parse::<f64>().ok().map(IntegerText::Decimal)
}

/// `"<location>/<distance>"` -> `location * 65536 + distance`.
pub fn parse_legacy(text: &str) -> Option<i64> {
    let (location, distance) = text.split_once('/')?;
    let location: i64 = location.trim().parse().ok()?;
    let distance: i64 = distance.trim().parse().ok()?;
    if !(0..LEGACY_DISTANCE_RANGE).contains(&distance) {
        return None;
    }
    location
        .checked_mul(LEGACY_DISTANCE_RANGE)?
        .checked_add(distance)
}

/// `true` iff `declared` and `stored * scale` fall in the same quantization step.
pub fn within_half_step(declared: f64, stored: i64, scale: f64) -> bool {
    if scale == 1.0 {
        return declared == stored as f64;
    }
    (declared - stored as f64 * scale).abs() < scale / 2.0
}

/// Signed bounds of a `byte_count`-wide integer.
fn width_bounds(byte_count: u8) -> (i64, i64) {
    match byte_count {
        1 => (i8::MIN.into(), i8::MAX.into()),
        2 => (i16::MIN.into(), i16::MAX.into()),
        4 => (i32::MIN.into(), i32::MAX.into()),
        _ => (i64::MIN, i64::MAX),
    }
}

fn check_bounds(
    value: i64,
    byte_count: u8,
    range: Option<(i64, i64)>,
    states: &[(String, i64)],
) -> std::result::Result<i64, String> {
    let (low, high) = width_bounds(byte_count);
    if value < low || value > high {
        return Err(format!("{value} does not fit {byte_count}-byte storage"));
    }
    if let Some((minimum, maximum)) = range {
        if !(minimum..=maximum).contains(&value) && !states.iter().any(|(_, v)| *v == value) {
            return Err(format!("{value} outside range {minimum}..={maximum}"));
        }
    }
    Ok(value)
}

/// Unscaled storage value of a declared decimal.
fn unscale(declared: f64, scale: f64) -> std::result::Result<i64, String> {
    if !declared.is_finite() {
        return Err("not a finite number".to_string());
    }
    if scale == 1.0 && declared.fract() != 0.0 {
        return Err("fractional value for an unscaled integer".to_string());
    }
    let unscaled = (declared / scale).round();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if !unscaled.is_finite() || unscaled < i64::MIN as f64 || unscaled >= i64::MAX as f64 {
        return Err("out of integer range".to_string());
    }
    Ok(unscaled as i64)
}

fn decimals_of(scale: f64) -> usize {
    let mut s = scale;
    let mut decimals = 0;
    while (s - s.round()).abs() > 1e-9 && decimals < 12 {
        s *= 10.0;
        decimals += 1;
    }
    decimals
}

fn format_integer(value: i64, scale: f64, states: &[(String, i64)]) -> String {
    if let Some((name, _)) = states.iter().find(|(_, v)| *v == value) {
        return name.clone();
    }
    if scale == 1.0 {
        return value.to_string();
    }
    format!("{:.*}", decimals_of(scale), value as f64 * scale)
}

// ---------------------------------------------------------------------------
// Times
// ---------------------------------------------------------------------------

fn parse_time(text: &str, relative: bool) -> Option<i64> {
    let text = text.trim();
    if let Ok(ms) = text.parse::<i64>() {
        return Some(ms);
    }
    if relative {
        return None;
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc).timestamp_millis())
}

fn format_time(ms: i64, relative: bool) -> String {
    if relative {
        return ms.to_string();
    }
    match Utc.timestamp_millis_opt(ms).single() {
        Some(t) => t.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Leaves
// ---------------------------------------------------------------------------

/// Encode one declared leaf for storage.
pub fn encode_leaf(
    attribute: &str,
    spec: &TypeSpec,
    text: &str,
    ctx: &dyn ResolveContext,
) -> Result<Data> {
    match spec {
        TypeSpec::String => Ok(Data::Text(text.to_string())),
        TypeSpec::Integer {
            scale,
            states,
            byte_count,
            range,
        } => {
            let value = match parse_integer(text, states) {
                Some(IntegerText::State(v)) => return Ok(Data::Integer(v)),
                Some(IntegerText::Legacy(v)) => {
                    warn!(attribute, text, value = v, "legacy packed integer accepted");
                    Ok(v)
                }
                Some(IntegerText::Decimal(d)) => unscale(d, *scale),
                None => Err("not an integer".to_string()),
            };
            value
                .and_then(|v| check_bounds(v, *byte_count, *range, states))
                .map(Data::Integer)
                .map_err(|reason| ImportError::codec(attribute, text, reason))
        }
        TypeSpec::Double => text
            .trim()
            .parse::<f64>()
            .map(Data::Double)
            .map_err(|e| ImportError::codec(attribute, text, e.to_string())),
        TypeSpec::Time { relative } => parse_time(text, *relative)
            .map(Data::Time)
            .ok_or_else(|| ImportError::codec(attribute, text, "not a time value")),
        TypeSpec::Reference => {
            if text.trim().is_empty() {
                return Ok(Data::Reference(None));
            }
            let pid = Pid::new(text.trim());
            ctx.resolve(&pid)
                .map(|id| Data::Reference(Some(id)))
                .ok_or_else(|| ImportError::unresolved(&pid, format!("value of '{attribute}'")))
        }
        TypeSpec::List(_) => Err(ImportError::codec(attribute, text, "list expects nested items")),
    }
}

/// Compare one declared leaf with its stored value, tolerating legacy text.
pub fn leaf_matches(spec: &TypeSpec, text: &str, stored: &Data, ctx: &dyn ResolveContext) -> bool {
    match (spec, stored) {
        (TypeSpec::String, Data::Text(s)) => s == text,
        (TypeSpec::Integer { scale, states, .. }, Data::Integer(s)) => {
            match parse_integer(text, states) {
                Some(IntegerText::State(v)) => v == *s,
                Some(IntegerText::Legacy(v)) => {
                    let equal = v == *s;
                    if equal {
                        warn!(text, stored = *s, "value matched through legacy packed form");
                    }
                    equal
                }
                Some(IntegerText::Decimal(d)) => within_half_step(d, *s, *scale),
                None => false,
            }
        }
        (TypeSpec::Double, Data::Double(s)) => text.trim().parse::<f64>().map(|d| d == *s).unwrap_or(false),
        (TypeSpec::Time { relative }, Data::Time(s)) => parse_time(text, *relative) == Some(*s),
        (TypeSpec::Reference, Data::Reference(s)) => {
            let text = text.trim();
            if text.is_empty() {
                s.is_none()
            } else {
                s.is_some() && ctx.resolve(&Pid::new(text)) == *s
            }
        }
        _ => false,
    }
}

/// Canonical text of a stored leaf.
pub fn decode_leaf<S: ObjectStore + ?Sized>(spec: &TypeSpec, data: &Data, store: &S) -> String {
    match (spec, data) {
        (TypeSpec::Integer { scale, states, .. }, Data::Integer(v)) => format_integer(*v, *scale, states),
        (TypeSpec::Time { relative }, Data::Time(ms)) => format_time(*ms, *relative),
        (_, Data::Reference(Some(id))) => query::pid_of(store, *id).0,
        (_, Data::Reference(None)) => String::new(),
        (_, Data::Text(s)) => s.clone(),
        (_, Data::Integer(v)) => v.to_string(),
        (_, Data::Double(d)) => d.to_string(),
        (_, Data::Time(ms)) => ms.to_string(),
        (_, Data::List(_)) | (_, Data::Array(_)) => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// Encode a declared dataset tree against the attributes of its group.
///
/// Attributes absent from the declaration take their declared default;
/// names outside the schema are rejected.
pub fn encode_tree(
    attributes: &[AttributeSpec],
    nodes: &[DataNode],
    ctx: &dyn ResolveContext,
) -> Result<Data> {
    for node in nodes {
        if !attributes.iter().any(|a| a.name == node.name()) {
            return Err(ImportError::codec(node.name(), "", "no such attribute"));
        }
    }
    let mut fields = Vec::with_capacity(attributes.len());
    for attr in attributes {
        let value = match nodes.iter().find(|n| n.name() == attr.name) {
            Some(node) => encode_attribute(attr, node, ctx)?,
            None => match &attr.default {
                Some(text) if !attr.array => encode_leaf(&attr.name, &attr.spec, text, ctx)?,
                _ if attr.array => Data::Array(Vec::new()),
                _ => return Err(ImportError::codec(&attr.name, "", "missing value")),
            },
        };
        fields.push((attr.name.clone(), value));
    }
    Ok(Data::List(fields))
}

fn encode_attribute(attr: &AttributeSpec, node: &DataNode, ctx: &dyn ResolveContext) -> Result<Data> {
    if attr.array {
        let DataNode::Array { items, .. } = node else {
            return Err(ImportError::codec(&attr.name, node.shape(), "expected array"));
        };
        let element = AttributeSpec {
            array: false,
            ..attr.clone()
        };
        return items
            .iter()
            .map(|item| encode_attribute(&element, item, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Data::Array);
    }
    match (&attr.spec, node) {
        (TypeSpec::List(inner), DataNode::List { items, .. }) => encode_tree(inner, items, ctx),
        (TypeSpec::List(_), other) => Err(ImportError::codec(&attr.name, other.shape(), "expected list")),
        (spec, DataNode::Value { value, .. }) => encode_leaf(&attr.name, spec, value, ctx),
        (_, other) => Err(ImportError::codec(&attr.name, other.shape(), "expected value")),
    }
}

/// `true` if the declared tree denotes the stored value.
pub fn tree_matches(
    attributes: &[AttributeSpec],
    nodes: &[DataNode],
    stored: &Data,
    ctx: &dyn ResolveContext,
) -> bool {
    let Data::List(fields) = stored else {
        return false;
    };
    if nodes.iter().any(|n| !attributes.iter().any(|a| a.name == n.name())) {
        return false;
    }
    attributes.iter().all(|attr| {
        let Some((_, value)) = fields.iter().find(|(name, _)| *name == attr.name) else {
            return false;
        };
        match nodes.iter().find(|n| n.name() == attr.name) {
            Some(node) => attribute_matches(attr, node, value, ctx),
            None => match (&attr.default, value) {
                (Some(text), _) if !attr.array => leaf_matches(&attr.spec, text, value, ctx),
                (_, Data::Array(items)) if attr.array => items.is_empty(),
                _ => false,
            },
        }
    })
}

fn attribute_matches(attr: &AttributeSpec, node: &DataNode, stored: &Data, ctx: &dyn ResolveContext) -> bool {
    if attr.array {
        let (DataNode::Array { items, .. }, Data::Array(values)) = (node, stored) else {
            return false;
        };
        let element = AttributeSpec {
            array: false,
            ..attr.clone()
        };
        return items.len() == values.len()
            && items
                .iter()
                .zip(values)
                .all(|(item, value)| attribute_matches(&element, item, value, ctx));
    }
    match (&attr.spec, node) {
        (TypeSpec::List(inner), DataNode::List { items, .. }) => tree_matches(inner, items, stored, ctx),
        (spec, DataNode::Value { value, .. }) => leaf_matches(spec, value, stored, ctx),
        _ => false,
    }
}

/// Rebuild the declared tree of a stored value.
pub fn decode_tree<S: ObjectStore + ?Sized>(
    attributes: &[AttributeSpec],
    stored: &Data,
    store: &S,
) -> Vec<DataNode> {
    let Data::List(fields) = stored else {
        return Vec::new();
    };
    attributes
        .iter()
        .filter_map(|attr| {
            fields
                .iter()
                .find(|(name, _)| *name == attr.name)
                .map(|(_, value)| decode_attribute(attr, &attr.name, value, store))
        })
        .collect()
}

fn decode_attribute<S: ObjectStore + ?Sized>(
    attr: &AttributeSpec,
    name: &str,
    value: &Data,
    store: &S,
) -> DataNode {
    if attr.array {
        let element = AttributeSpec {
            array: false,
            ..attr.clone()
        };
        let items = match value {
            Data::Array(values) => values
                .iter()
                .map(|v| decode_attribute(&element, "", v, store))
                .collect(),
            _ => Vec::new(),
        };
        return DataNode::array(name, items);
    }
    match &attr.spec {
        TypeSpec::List(inner) => DataNode::list(name, decode_tree(inner, value, store)),
        spec => DataNode::value(name, decode_leaf(spec, value, store)),
    }
}
