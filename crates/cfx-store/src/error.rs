use cfx_model::Pid;
use thiserror::Error;

use crate::ObjectId;

/// Failures of store operations.
///
/// The reconciliation engine treats every one of these as fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),
    #[error("object {0} is not a configuration area")]
    NotAnArea(ObjectId),
    #[error("object {0} is not an object set")]
    NotASet(ObjectId),
    #[error("a draft object with pid '{0}' already exists")]
    DuplicatePid(Pid),
    #[error("unknown meta object '{0}'")]
    UnknownMeta(String),
    #[error("object {id} cannot be {action}: {reason}")]
    IllegalTransition {
        id: ObjectId,
        action: &'static str,
        reason: String,
    },
    #[error("dynamic object '{pid}' is missing its required dataset for usage {usage}")]
    MissingRequiredDataset { pid: Pid, usage: ObjectId },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
