//! Journal integrity under tampering.
//!
//! GREEN when:
//! - A chain of 5 entries verifies.
//! - Editing one payload breaks verification at that line (its id no longer derives).
//! - Editing a field outside the payload breaks the entry hash at that line.
//! - Dropping a line breaks numbering at the following line.
//! - Dropping a line and renumbering the rest still breaks the chain there.

use cfx_journal::{verify_journal, verify_journal_str, JournalWriter, VerifyResult};
use serde_json::{json, Value};
use uuid::Uuid;

fn write_five(path: &std::path::Path) -> Vec<String> {
    let run_id = Uuid::new_v4();
    let mut writer = JournalWriter::open(path, true).unwrap();
    for i in 0..5 {
        writer
            .append(
                run_id,
                &format!("object_created_{i}"),
                json!({ "pid": format!("typ.{i}"), "id": i }),
            )
            .unwrap();
    }
    std::fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
}

fn broken_at(content: &str) -> (usize, String) {
    match verify_journal_str(content).unwrap() {
        VerifyResult::Broken { line, reason } => (line, reason),
        other => panic!("tampering not detected: {other:?}"),
    }
}

#[test]
fn untampered_chain_verifies_valid() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("import.jsonl");
    write_five(&path);
    assert_eq!(verify_journal(&path).unwrap(), VerifyResult::Valid { entries: 5 });
}

#[test]
fn tampered_payload_detected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut lines = write_five(&tmp.path().join("import.jsonl"));
    lines[2] = lines[2].replace("typ.2", "typ.X");

    let (line, reason) = broken_at(&lines.join("\n"));
    assert_eq!(line, 3);
    assert!(reason.contains("does not match its payload"), "unexpected reason: {reason}");
}

#[test]
fn tampered_event_type_detected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut lines = write_five(&tmp.path().join("import.jsonl"));
    lines[1] = lines[1].replace("object_created_1", "object_deleted_1");

    let (line, reason) = broken_at(&lines.join("\n"));
    assert_eq!(line, 2);
    assert!(reason.contains("hash mismatch"), "unexpected reason: {reason}");
}

#[test]
fn removed_line_detected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut lines = write_five(&tmp.path().join("import.jsonl"));
    lines.remove(1);

    let (line, reason) = broken_at(&lines.join("\n"));
    assert_eq!(line, 2);
    assert!(reason.contains("seq gap: expected 1, found 2"), "unexpected reason: {reason}");
}

#[test]
fn renumbering_after_removal_detected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut lines = write_five(&tmp.path().join("import.jsonl"));
    lines.remove(1);
    for (i, line) in lines.iter_mut().enumerate() {
        let mut entry: Value = serde_json::from_str(line).unwrap();
        entry["seq"] = json!(i);
        *line = entry.to_string();
    }

    let (line, reason) = broken_at(&lines.join("\n"));
    assert_eq!(line, 2);
    assert!(reason.contains("prev_hash mismatch"), "unexpected reason: {reason}");
}
