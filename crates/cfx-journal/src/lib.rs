//! cfx-journal
//!
//! Append-only record of import runs, one JSON entry per line.
//!
//! Entries are numbered from zero. Each one carries its position (`seq`) and
//! an id derived from that position, the previous hash and its payload, so a
//! journal reopened after a restart continues exactly where it stopped. With
//! chaining enabled every entry also commits to the hash of its predecessor.
//!
//! [`verify_journal`] replays a journal and names the first line whose
//! numbering, id or hashes disagree with what precedes it. A journal that
//! does not replay cleanly is never extended.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Namespace of derived entry ids.
const ENTRY_NAMESPACE: Uuid = Uuid::from_u128(0x6a0c_2f61_9d3e_4b57_8e1a_c4f0_7d2b_91e5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub id: Uuid,
    pub run_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub event_type: String,
    pub payload: Value,
    pub prev_hash: Option<String>,
    /// `None` in unchained journals.
    pub hash: Option<String>,
}

/// Position the next entry is written at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalHead {
    pub next_seq: u64,
    pub last_hash: Option<String>,
}

impl JournalHead {
    /// Why `entry` cannot follow this head, if it cannot.
    fn mismatch(&self, entry: &JournalEntry) -> Result<Option<String>> {
        if entry.seq != self.next_seq {
            return Ok(Some(format!(
                "seq gap: expected {}, found {}",
                self.next_seq, entry.seq
            )));
        }
        if entry.prev_hash != self.last_hash {
            return Ok(Some(format!(
                "prev_hash mismatch: expected {:?}, found {:?}",
                self.last_hash, entry.prev_hash
            )));
        }
        let expected_id = derive_entry_id(entry.seq, self.last_hash.as_deref(), &entry.payload)?;
        if entry.id != expected_id {
            return Ok(Some(format!("entry id {} does not match its payload", entry.id)));
        }
        if let Some(claimed) = &entry.hash {
            let recomputed = entry_hash(entry)?;
            if *claimed != recomputed {
                return Ok(Some(format!("hash mismatch: claimed {claimed}, recomputed {recomputed}")));
            }
        }
        Ok(None)
    }

    fn advance(&mut self, entry: &JournalEntry) {
        self.next_seq = entry.seq + 1;
        self.last_hash = entry.hash.clone();
    }
}

pub struct JournalWriter {
    path: PathBuf,
    chained: bool,
    head: JournalHead,
}

impl JournalWriter {
    /// Opens `path` for appending after its last entry. A missing file is an
    /// empty journal; one that does not replay cleanly is an error.
    pub fn open(path: impl AsRef<Path>, chained: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create journal dir {}", parent.display()))?;
        }
        let head = if path.exists() {
            let content =
                fs::read_to_string(&path).with_context(|| format!("read journal {}", path.display()))?;
            match replay(&content)? {
                (head, VerifyResult::Valid { .. }) => head,
                (_, VerifyResult::Broken { line, reason }) => {
                    bail!("journal {} is broken at line {line}: {reason}", path.display())
                }
            }
        } else {
            JournalHead::default()
        };
        debug!(path = %path.display(), next_seq = head.next_seq, "journal opened");
        Ok(Self { path, chained, head })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn head(&self) -> &JournalHead {
        &self.head
    }

    pub fn append(&mut self, run_id: Uuid, event_type: &str, payload: Value) -> Result<JournalEntry> {
        let seq = self.head.next_seq;
        let mut entry = JournalEntry {
            seq,
            id: derive_entry_id(seq, self.head.last_hash.as_deref(), &payload)?,
            run_id,
            recorded_at: Utc::now(),
            event_type: event_type.to_string(),
            payload,
            prev_hash: self.head.last_hash.clone(),
            hash: None,
        };
        if self.chained {
            entry.hash = Some(entry_hash(&entry)?);
        }

        let mut line = canonical(&entry)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()))
            .with_context(|| format!("append to journal {}", self.path.display()))?;

        self.head.advance(&entry);
        Ok(entry)
    }
}

/// UUID v5 over position, predecessor hash and payload; no randomness.
fn derive_entry_id(seq: u64, prev_hash: Option<&str>, payload: &Value) -> Result<Uuid> {
    let payload = serde_json::to_string(payload).context("serialize journal payload")?;
    let name = format!("{seq}|{}|{payload}", prev_hash.unwrap_or(""));
    Ok(Uuid::new_v5(&ENTRY_NAMESPACE, name.as_bytes()))
}

/// Compact JSON through `serde_json::Value`, whose maps are ordered by key.
fn canonical(entry: &JournalEntry) -> Result<String> {
    let value = serde_json::to_value(entry).context("serialize journal entry")?;
    serde_json::to_string(&value).context("render journal entry")
}

/// SHA-256 of the canonical entry with `hash` cleared.
pub fn entry_hash(entry: &JournalEntry) -> Result<String> {
    let unsealed = JournalEntry {
        hash: None,
        ..entry.clone()
    };
    Ok(hex::encode(Sha256::digest(canonical(&unsealed)?.as_bytes())))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { entries: usize },
    Broken { line: usize, reason: String },
}

/// Head after the clean prefix of `content`, plus the verdict on the whole.
fn replay(content: &str) -> Result<(JournalHead, VerifyResult)> {
    let mut head = JournalHead::default();
    let mut entries = 0usize;
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: JournalEntry =
            serde_json::from_str(line).with_context(|| format!("parse journal entry at line {}", i + 1))?;
        if let Some(reason) = head.mismatch(&entry)? {
            return Ok((head, VerifyResult::Broken { line: i + 1, reason }));
        }
        head.advance(&entry);
        entries += 1;
    }
    Ok((head, VerifyResult::Valid { entries }))
}

pub fn verify_journal(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("read journal {}", path.display()))?;
    verify_journal_str(&content)
}

/// [`verify_journal`] over in-memory JSONL content.
pub fn verify_journal_str(content: &str) -> Result<VerifyResult> {
    Ok(replay(content)?.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_ids_depend_on_position_and_predecessor() {
        let payload = json!({ "b": 1, "a": 2 });
        let reordered = json!({ "a": 2, "b": 1 });
        let id = derive_entry_id(3, Some("h"), &payload).unwrap();
        assert_eq!(id, derive_entry_id(3, Some("h"), &reordered).unwrap());
        assert_ne!(id, derive_entry_id(4, Some("h"), &payload).unwrap());
        assert_ne!(id, derive_entry_id(3, None, &payload).unwrap());
    }

    #[test]
    fn unchained_entries_still_number_and_verify() {
        let tmp = tempfile::tempdir().unwrap();
        let mut w = JournalWriter::open(tmp.path().join("j.jsonl"), false).unwrap();
        let first = w.append(Uuid::new_v4(), "object_created", json!({ "pid": "x" })).unwrap();
        let second = w.append(Uuid::new_v4(), "object_created", json!({ "pid": "y" })).unwrap();
        assert_eq!((first.seq, second.seq), (0, 1));
        assert!(first.prev_hash.is_none() && first.hash.is_none());
        assert_eq!(verify_journal(w.path()).unwrap(), VerifyResult::Valid { entries: 2 });
    }

    #[test]
    fn reopening_continues_numbering_and_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("j.jsonl");
        let run = Uuid::new_v4();
        let last = {
            let mut w = JournalWriter::open(&path, true).unwrap();
            w.append(run, "a", json!({})).unwrap();
            w.append(run, "b", json!({})).unwrap()
        };
        let mut w = JournalWriter::open(&path, true).unwrap();
        assert_eq!(w.head().next_seq, 2);
        assert_eq!(w.head().last_hash, last.hash);
        let next = w.append(run, "c", json!({})).unwrap();
        assert_eq!(next.seq, 2);
        assert_eq!(next.prev_hash, last.hash);
        assert_eq!(verify_journal(&path).unwrap(), VerifyResult::Valid { entries: 3 });
    }

    #[test]
    fn broken_journal_is_not_extended() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("j.jsonl");
        {
            let mut w = JournalWriter::open(&path, true).unwrap();
            w.append(Uuid::new_v4(), "a", json!({ "n": 1 })).unwrap();
        }
        let content = fs::read_to_string(&path).unwrap().replace("\"n\":1", "\"n\":2");
        fs::write(&path, content).unwrap();

        let err = JournalWriter::open(&path, true).err().expect("broken journal opened");
        assert!(err.to_string().contains("broken at line 1"), "{err}");
    }
}
