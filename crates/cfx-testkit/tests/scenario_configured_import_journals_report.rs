//! Scenario: a config-driven import writes its report to the journal
//!
//! # Invariants under test
//!
//! 1. Options come from the layered YAML config; every key it sets is read.
//! 2. Each report entry becomes one journal line, closed by a run summary.
//! 3. A second run continues the numbering and hash chain of the first,
//!    which stays verifiable.
//! 4. Without a journal path nothing is written.

use cfx_config::{load_layered_yaml_from_strings, report_unused_keys, RunKind, UnusedKeyPolicy};
use cfx_journal::{verify_journal, JournalEntry, VerifyResult};
use cfx_store::MemoryStore;
use cfx_testkit::fixtures::station_area;
use cfx_testkit::import_with_config;

const PARTS: [&str; 2] = ["obj.part.a", "obj.part.b"];

#[test]
fn import_report_is_journaled_across_runs() -> anyhow::Result<()> {
    cfx_testkit::init_tracing();
    let tmp = tempfile::tempdir()?;
    let journal = tmp.path().join("journal").join("import.jsonl");

    let base = "import:\n  max_passes: 8\n  author: base\njournal:\n  hash_chain: true\n";
    let site = format!("import:\n  author: site-ops\njournal:\n  path: {:?}\n", journal.display().to_string());
    let loaded = load_layered_yaml_from_strings(&[base, &site])?;
    let unused = report_unused_keys(RunKind::Import, &loaded.config_json, UnusedKeyPolicy::Fail)?;
    assert!(unused.is_clean());

    let mut store = MemoryStore::new()?;
    let first = import_with_config(&mut store, &loaded, &[station_area(&PARTS)])?;
    assert_eq!(first.journaled, first.report.journal_events().len());
    assert_eq!(
        verify_journal(&journal)?,
        VerifyResult::Valid {
            entries: first.journaled
        }
    );

    let second = import_with_config(&mut store, &loaded, &[station_area(&PARTS)])?;
    assert!(second.report.is_unchanged());
    assert_ne!(second.run_id, first.run_id);
    assert_eq!(
        verify_journal(&journal)?,
        VerifyResult::Valid {
            entries: first.journaled + second.journaled
        }
    );

    let content = std::fs::read_to_string(&journal)?;
    let entries: Vec<JournalEntry> = content
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    let summaries: Vec<&JournalEntry> = entries.iter().filter(|e| e.event_type == "import_closed").collect();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].run_id, first.run_id);
    assert_eq!(summaries[1].payload["passes"], second.report.passes);
    assert!(entries.iter().any(|e| e.event_type == "object_created"));
    assert!(entries.iter().enumerate().all(|(i, e)| e.seq == i as u64));
    Ok(())
}

#[test]
fn no_journal_path_writes_nothing() -> anyhow::Result<()> {
    let loaded = load_layered_yaml_from_strings(&["import:\n  relaxed_changes: false\n"])?;
    let mut store = MemoryStore::new()?;
    let run = import_with_config(&mut store, &loaded, &[station_area(&PARTS)])?;
    assert_eq!(run.journaled, 0);
    assert!(run.report.passes >= 2);
    Ok(())
}
