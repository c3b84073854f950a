use cfx_model::Pid;
use cfx_store::meta::{ATG_AREA_TRANSFER, ATG_PENDING_AUTHORITY, DEFAULT_ASPECT};

/// Tunables of one import run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportOptions {
    /// Upper bound on Resolving passes before the run aborts.
    pub max_passes: u32,
    /// Aspect used for attribute groups that declare none.
    pub default_aspect: Pid,
    /// Accept the narrow relaxed changes under immutable classification.
    pub relaxed_changes: bool,
    /// Housekeeping groups neither exported nor cleaned up.
    pub hidden_attribute_groups: Vec<Pid>,
    /// Recorded in report events.
    pub author: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_passes: 64,
            default_aspect: Pid::new(DEFAULT_ASPECT),
            relaxed_changes: true,
            hidden_attribute_groups: default_hidden_groups(),
            author: "import".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub hidden_attribute_groups: Vec<Pid>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            hidden_attribute_groups: default_hidden_groups(),
        }
    }
}

pub fn default_hidden_groups() -> Vec<Pid> {
    vec![Pid::new(ATG_PENDING_AUTHORITY), Pid::new(ATG_AREA_TRANSFER)]
}
