use anyhow::{anyhow, Context, Result};
use cfx_bundle::BundleSettings;
use cfx_model::Pid;
use cfx_reconcile::{default_hidden_groups, ExportOptions, ImportOptions};
use serde_json::Value;
use std::path::PathBuf;

/// Where the import journal goes, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalSettings {
    pub path: Option<PathBuf>,
    pub hash_chain: bool,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            path: None,
            hash_chain: true,
        }
    }
}

/// Typed view of an engine configuration. Missing keys take their defaults;
/// present keys of the wrong type are errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub bundle: BundleSettings,
    pub import: ImportOptions,
    pub journal: JournalSettings,
}

impl EngineConfig {
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let mut out = EngineConfig::default();

        if let Some(dir) = string_at(cfg, "/bundle/directory")? {
            out.bundle.directory = PathBuf::from(dir);
        }
        if let Some(ext) = string_at(cfg, "/bundle/extension")? {
            out.bundle.extension = ext.trim_start_matches('.').to_string();
        }
        if let Some(suffix) = string_at(cfg, "/bundle/backup_suffix")? {
            if suffix.is_empty() {
                return Err(anyhow!("bundle.backup_suffix must not be empty"));
            }
            out.bundle.backup_suffix = suffix.to_string();
        }

        if let Some(v) = cfg.pointer("/import/max_passes") {
            let passes = v
                .as_u64()
                .context("import.max_passes must be a positive integer")?;
            if passes == 0 {
                return Err(anyhow!("import.max_passes must be at least 1"));
            }
            out.import.max_passes = u32::try_from(passes)
                .with_context(|| format!("import.max_passes out of range: {passes}"))?;
        }
        if let Some(aspect) = string_at(cfg, "/import/default_aspect")? {
            let aspect = Pid::new(aspect);
            if aspect.is_empty() {
                return Err(anyhow!("import.default_aspect must not be empty"));
            }
            out.import.default_aspect = aspect;
        }
        if let Some(relaxed) = bool_at(cfg, "/import/relaxed_changes")? {
            out.import.relaxed_changes = relaxed;
        }
        if let Some(v) = cfg.pointer("/import/hidden_attribute_groups") {
            let items = v
                .as_array()
                .context("import.hidden_attribute_groups must be a list")?;
            out.import.hidden_attribute_groups = items
                .iter()
                .map(|i| {
                    i.as_str()
                        .map(Pid::new)
                        .context("import.hidden_attribute_groups entries must be strings")
                })
                .collect::<Result<_>>()?;
        }
        if let Some(author) = string_at(cfg, "/import/author")? {
            out.import.author = author.to_string();
        }

        if let Some(path) = string_at(cfg, "/journal/path")? {
            out.journal.path = Some(PathBuf::from(path));
        }
        if let Some(chain) = bool_at(cfg, "/journal/hash_chain")? {
            out.journal.hash_chain = chain;
        }
        Ok(out)
    }

    pub fn import_options(&self) -> ImportOptions {
        self.import.clone()
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            hidden_attribute_groups: self.import.hidden_attribute_groups.clone(),
        }
    }

    pub fn bundle_settings(&self) -> BundleSettings {
        self.bundle.clone()
    }

    /// `true` if the hidden groups differ from the built-in housekeeping groups.
    pub fn overrides_hidden_groups(&self) -> bool {
        self.import.hidden_attribute_groups != default_hidden_groups()
    }
}

fn string_at<'a>(cfg: &'a Value, pointer: &str) -> Result<Option<&'a str>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .with_context(|| format!("config key {pointer} must be a string")),
    }
}

fn bool_at(cfg: &Value, pointer: &str) -> Result<Option<bool>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .with_context(|| format!("config key {pointer} must be a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_yields_defaults() {
        let cfg = EngineConfig::from_config_json(&json!({})).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.import.max_passes, 64);
        assert_eq!(cfg.bundle.extension, "json");
        assert!(cfg.journal.hash_chain);
        assert!(!cfg.overrides_hidden_groups());
    }

    #[test]
    fn typed_keys_override_defaults() {
        let cfg = EngineConfig::from_config_json(&json!({
            "bundle": { "directory": "/tmp/b", "extension": ".yml", "backup_suffix": "old" },
            "import": {
                "max_passes": 3,
                "default_aspect": "asp.other",
                "relaxed_changes": false,
                "hidden_attribute_groups": ["atg.x"],
                "author": "ops"
            },
            "journal": { "path": "/tmp/j.jsonl", "hash_chain": false }
        }))
        .unwrap();

        assert_eq!(cfg.bundle.directory, PathBuf::from("/tmp/b"));
        assert_eq!(cfg.bundle.extension, "yml");
        assert_eq!(cfg.bundle.backup_suffix, "old");
        let import = cfg.import_options();
        assert_eq!(import.max_passes, 3);
        assert_eq!(import.default_aspect, Pid::new("asp.other"));
        assert!(!import.relaxed_changes);
        assert_eq!(import.author, "ops");
        assert_eq!(cfg.export_options().hidden_attribute_groups, vec![Pid::new("atg.x")]);
        assert!(cfg.overrides_hidden_groups());
        assert_eq!(cfg.journal.path, Some(PathBuf::from("/tmp/j.jsonl")));
        assert!(!cfg.journal.hash_chain);
    }

    #[test]
    fn wrong_types_and_bounds_are_rejected() {
        assert!(EngineConfig::from_config_json(&json!({ "import": { "max_passes": 0 } })).is_err());
        assert!(EngineConfig::from_config_json(&json!({ "import": { "max_passes": "ten" } })).is_err());
        assert!(EngineConfig::from_config_json(&json!({ "import": { "relaxed_changes": "yes" } })).is_err());
        assert!(EngineConfig::from_config_json(&json!({ "bundle": { "backup_suffix": "" } })).is_err());
        assert!(
            EngineConfig::from_config_json(&json!({ "import": { "hidden_attribute_groups": [1] } }))
                .is_err()
        );
    }
}
