//! Unused-key guard.
//!
//! GREEN when:
//! - Unused keys are reported in WARN mode without error.
//! - Unused keys fail in FAIL mode.
//! - Keys read by the run kind are never flagged.

use cfx_config::{
    load_layered_yaml_from_strings, report_unused_keys, EngineConfig, RunKind, UnusedKeyPolicy,
};

const YAML: &str = r#"
bundle:
  directory: "out"
import:
  max_passes: 4
  autor: "typo"
journal:
  hash_chain: false
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(RunKind::Import, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert_eq!(report.kind, "IMPORT");
    assert_eq!(report.unused_leaf_pointers, vec!["/import/autor".to_string()]);
    // The misspelt key fell back to its default.
    let cfg = EngineConfig::from_config_json(&loaded.config_json).unwrap();
    assert_eq!(cfg.import.author, "import");
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(RunKind::Import, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "unexpected error: {msg}");
    assert!(msg.contains("/import/autor"));
}

#[test]
fn export_does_not_read_import_tuning() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(RunKind::Export, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert!(report
        .unused_leaf_pointers
        .contains(&"/import/max_passes".to_string()));
    assert!(report
        .unused_leaf_pointers
        .contains(&"/journal/hash_chain".to_string()));
    assert!(!report
        .unused_leaf_pointers
        .contains(&"/bundle/directory".to_string()));
}
