//! Bootstrap error taxonomy
//!
//! The bootstrapper never recovers from these locally. It logs them together
//! with the [`Phase`] they surfaced in and hands the same value back.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::ChangeId;

/// Failure surfaced by a storage collaborator during a bootstrap run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    /// The store could not be reached while an operation required it
    #[error("store unreachable: {message}")]
    Connectivity { message: String },

    /// A specific pending change failed to apply
    #[error("change '{change_id}' failed to apply: {message}")]
    ChangeApplication { change_id: ChangeId, message: String },

    /// Any other collaborator failure
    #[error("bootstrap failed: {message}")]
    Unknown { message: String },
}

impl BootstrapError {
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }

    pub fn change_application(change_id: impl Into<ChangeId>, message: impl Into<String>) -> Self {
        Self::ChangeApplication {
            change_id: change_id.into(),
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// The change this error refers to, if any
    pub fn change_id(&self) -> Option<&ChangeId> {
        match self {
            Self::ChangeApplication { change_id, .. } => Some(change_id),
            _ => None,
        }
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connectivity { .. } => "connectivity",
            Self::ChangeApplication { .. } => "change_application",
            Self::Unknown { .. } => "unknown",
        }
    }
}

/// Step of the bootstrap sequence, used to annotate log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    OpenScope,
    Connect,
    ListApplied,
    ListPending,
    Classify,
    CreateFromModel,
    ApplyPending,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::OpenScope => "open-scope",
            Phase::Connect => "connect",
            Phase::ListApplied => "list-applied",
            Phase::ListPending => "list-pending",
            Phase::Classify => "classify",
            Phase::CreateFromModel => "create-from-model",
            Phase::ApplyPending => "apply-pending",
        };
        write!(f, "{}", name)
    }
}
