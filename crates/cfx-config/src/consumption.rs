//! Consumed-key registry and unused-key guard.
//!
//! "Consumed pointers" are JSON Pointer prefixes. A leaf under any consumed
//! prefix counts as read; every other leaf is reported as unused, which
//! catches misspelt keys that would otherwise silently fall back to defaults.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Import,
    Export,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Import => "IMPORT",
            RunKind::Export => "EXPORT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub kind: String,
    /// Sorted, unique.
    pub consumed_prefixes: Vec<String>,
    /// Sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Pointers [`EngineConfig`](crate::EngineConfig) reads for each run kind.
pub fn consumed_pointers(kind: RunKind) -> &'static [&'static str] {
    match kind {
        RunKind::Import => &[
            "/bundle/directory",
            "/bundle/extension",
            "/bundle/backup_suffix",
            "/import/max_passes",
            "/import/default_aspect",
            "/import/relaxed_changes",
            "/import/hidden_attribute_groups",
            "/import/author",
            "/journal/path",
            "/journal/hash_chain",
        ],
        RunKind::Export => &[
            "/bundle/directory",
            "/bundle/extension",
            "/bundle/backup_suffix",
            "/import/hidden_attribute_groups",
        ],
    }
}

/// Unused-key report for `kind`. With [`UnusedKeyPolicy::Fail`] any unused
/// key is an error.
pub fn report_unused_keys(
    kind: RunKind,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers(kind)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        kind: kind.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (kind={}): {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.kind,
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }
    Ok(report)
}

/// Leading "/", no trailing "/" unless the pointer is just "/".
fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{:?}", take)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_respects_token_boundaries() {
        assert!(is_prefix_pointer("/import", "/import/author"));
        assert!(is_prefix_pointer("/import/author", "/import/author"));
        assert!(!is_prefix_pointer("/import/auth", "/import/author"));
        assert!(is_prefix_pointer("/", "/anything"));
    }

    #[test]
    fn array_elements_are_covered_by_their_key() {
        let cfg = serde_json::json!({
            "import": { "hidden_attribute_groups": ["atg.a", "atg.b"] }
        });
        let report = report_unused_keys(RunKind::Export, &cfg, UnusedKeyPolicy::Fail).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        let cfg = serde_json::json!({ "a/b": { "c~d": 1 } });
        let mut leaves = Vec::new();
        collect_leaf_pointers(&cfg, "", &mut leaves);
        assert_eq!(leaves, vec!["/a~1b/c~0d".to_string()]);
    }
}
