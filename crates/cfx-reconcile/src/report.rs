use cfx_model::Pid;
use cfx_store::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::Difference;

/// What an import run did to one object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Bound to an existing candidate.
    Kept,
    /// Binding moved from one existing candidate to another.
    Rebound,
    Created,
    Patched,
    /// A refused candidate (or attribute) got a fresh identity.
    Replaced,
    Invalidated,
    Deleted,
    Revalidated,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Kept => "kept",
            ActionKind::Rebound => "rebound",
            ActionKind::Created => "created",
            ActionKind::Patched => "patched",
            ActionKind::Replaced => "replaced",
            ActionKind::Invalidated => "invalidated",
            ActionKind::Deleted => "deleted",
            ActionKind::Revalidated => "revalidated",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportAction {
    pub kind: ActionKind,
    pub pid: Pid,
    pub id: ObjectId,
    #[serde(default)]
    pub detail: String,
}

/// A candidate left untouched because it could not be patched in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefusedChange {
    pub pid: Pid,
    pub candidate: ObjectId,
    pub differences: Vec<String>,
}

/// Journal-ready record of one report entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportEvent {
    pub event_type: String,
    pub payload: Value,
}

/// Outcome of one import run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub passes: u32,
    pub actions: Vec<ImportAction>,
    pub refused: Vec<RefusedChange>,
}

impl ImportReport {
    pub(crate) fn record(&mut self, kind: ActionKind, pid: &Pid, id: ObjectId, detail: impl Into<String>) {
        self.actions.push(ImportAction {
            kind,
            pid: pid.clone(),
            id,
            detail: detail.into(),
        });
    }

    pub(crate) fn refuse(&mut self, pid: &Pid, candidate: ObjectId, differences: &[Difference]) {
        self.refused.push(RefusedChange {
            pid: pid.clone(),
            candidate,
            differences: differences.iter().map(|d| d.to_string()).collect(),
        });
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    pub fn actions_of(&self, kind: ActionKind) -> impl Iterator<Item = &ImportAction> {
        self.actions.iter().filter(move |a| a.kind == kind)
    }

    /// `true` if the run neither mutated nor refused anything.
    pub fn is_unchanged(&self) -> bool {
        self.refused.is_empty()
            && self
                .actions
                .iter()
                .all(|a| matches!(a.kind, ActionKind::Kept | ActionKind::Rebound))
    }

    /// One event per action and refusal, followed by a run summary.
    pub fn journal_events(&self) -> Vec<ReportEvent> {
        let mut events: Vec<ReportEvent> = self
            .actions
            .iter()
            .map(|a| ReportEvent {
                event_type: format!("object_{}", a.kind.as_str()),
                payload: json!({
                    "pid": a.pid,
                    "id": a.id,
                    "detail": a.detail,
                }),
            })
            .collect();
        events.extend(self.refused.iter().map(|r| ReportEvent {
            event_type: "change_refused".to_string(),
            payload: json!({
                "pid": r.pid,
                "candidate": r.candidate,
                "differences": r.differences,
            }),
        }));
        events.push(ReportEvent {
            event_type: "import_closed".to_string(),
            payload: json!({
                "passes": self.passes,
                "actions": self.actions.len(),
                "refused": self.refused.len(),
            }),
        });
        events
    }
}
