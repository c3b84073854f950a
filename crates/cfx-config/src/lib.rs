//! cfx-config
//!
//! Layered YAML configuration of the reconciliation engine.
//!
//! - [`load_layered_yaml`]: merge documents in order (later overrides
//!   earlier), canonicalize, hash with SHA-256.
//! - [`EngineConfig`]: typed settings read by JSON pointer with defaults,
//!   projected onto the option structs the engine crates consume.
//! - [`report_unused_keys`]: leaf keys no run kind reads.
//!
//! No engine crate depends on YAML; they only see the projections.

mod consumption;
mod engine;

pub use consumption::{consumed_pointers, report_unused_keys, RunKind, UnusedKeyPolicy, UnusedKeyReport};
pub use engine::{EngineConfig, JournalSettings};

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let p = p.as_ref();
        let raw = fs::read_to_string(p)
            .with_context(|| format!("failed to read yaml path: {}", p.display()))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null and contributes nothing.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Compact JSON with object keys sorted recursively, so the hash does not
/// depend on the key order of the YAML sources.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(&sort_keys(v)).context("canonical json serialize failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_documents_override_earlier_ones() {
        let base = "import:\n  max_passes: 8\n  author: base\n";
        let over = "import:\n  author: override\n";
        let loaded = load_layered_yaml_from_strings(&[base, over]).unwrap();
        assert_eq!(loaded.config_json["import"]["max_passes"], 8);
        assert_eq!(loaded.config_json["import"]["author"], "override");
    }

    #[test]
    fn empty_documents_are_ignored() {
        let loaded = load_layered_yaml_from_strings(&["", "bundle:\n  extension: yml\n"]).unwrap();
        assert_eq!(loaded.config_json["bundle"]["extension"], "yml");
    }

    #[test]
    fn load_from_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("engine.yaml");
        fs::write(&path, "journal:\n  hash_chain: false\n").unwrap();
        let loaded = load_layered_yaml(&[&path]).unwrap();
        assert_eq!(loaded.config_json["journal"]["hash_chain"], false);

        let missing = load_layered_yaml(&[tmp.path().join("missing.yaml")]);
        assert!(missing.is_err());
    }
}
