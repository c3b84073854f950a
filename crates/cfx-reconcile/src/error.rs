use cfx_model::Pid;
use cfx_store::StoreError;
use thiserror::Error;

/// Fatal conflicts in the declared structure itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralConflict {
    #[error("supertype cycle through '{0}'")]
    SupertypeCycle(Pid),

    #[error("type '{pid}' is incompatible with the persistence of supertype '{supertype}'")]
    PersistenceMode { pid: Pid, supertype: Pid },

    #[error("dynamic object '{pid}' lacks a required dataset for '{attribute_group}'")]
    MissingRequiredDataset { pid: Pid, attribute_group: Pid },

    #[error("resolving did not reach a fixed point within {0} passes")]
    NoConvergence(u32),

    #[error("invalid declaration '{pid}': {reason}")]
    InvalidDeclaration { pid: Pid, reason: String },

    #[error("attribute list '{0}' contains itself")]
    AttributeListCycle(Pid),
}

/// Errors that abort an import (or export) run.
///
/// A refused incompatible change is not an error; it is absorbed by
/// recreating the object and recorded in the report.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Any store mutation or read failure.
    #[error("configuration change failed: {0}")]
    ConfigurationChange(#[from] StoreError),

    #[error("unresolved reference '{pid}' ({context})")]
    UnresolvedReference { pid: Pid, context: String },

    #[error(transparent)]
    StructuralConflict(#[from] StructuralConflict),

    #[error("cannot encode '{text}' for attribute '{attribute}': {reason}")]
    Codec {
        attribute: String,
        text: String,
        reason: String,
    },

    /// Bundle file side effects of an export.
    #[error(transparent)]
    Bundle(#[from] anyhow::Error),
}

impl ImportError {
    pub fn unresolved(pid: &Pid, context: impl Into<String>) -> Self {
        ImportError::UnresolvedReference {
            pid: pid.clone(),
            context: context.into(),
        }
    }

    pub fn invalid(pid: &Pid, reason: impl Into<String>) -> Self {
        ImportError::StructuralConflict(StructuralConflict::InvalidDeclaration {
            pid: pid.clone(),
            reason: reason.into(),
        })
    }

    pub fn codec(attribute: &str, text: &str, reason: impl Into<String>) -> Self {
        ImportError::Codec {
            attribute: attribute.to_string(),
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
