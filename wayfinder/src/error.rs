use thiserror::Error;

use crate::host::{VisualHandle, VisualKind};
use crate::session::SessionType;

/// Failures reported by the rendering/tracking collaborators.
///
/// None of these reach the caller of a public navigation or session
/// operation: they are logged at the boundary and surfaced as `false`/`None`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HostError {
    #[error("{0} sessions are not supported by this device")]
    Unsupported(SessionType),

    #[error("{session_type} session request rejected: {reason}")]
    Rejected {
        session_type: SessionType,
        reason: String,
    },

    #[error("host fault during '{operation}': {reason}")]
    Fault { operation: String, reason: String },

    #[error("failed to release {kind:?} visual {handle:?}: {reason}")]
    ReleaseFailed {
        handle: VisualHandle,
        kind: VisualKind,
        reason: String,
    },
}

impl HostError {
    pub fn fault(operation: &str, reason: impl Into<String>) -> Self {
        HostError::Fault {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

pub type HostResult<T> = Result<T, HostError>;
